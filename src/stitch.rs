//! Reassembles segment captures into one page-sized raster

use crate::{OutputFormat, PageMetrics, Segment};
use image::{imageops, Rgba, RgbaImage};
use tracing::debug;

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);
const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Canvas fill for `format`: transparent where alpha survives encoding,
/// opaque white otherwise.
pub fn background_for(format: OutputFormat) -> Rgba<u8> {
    if format.supports_alpha() {
        TRANSPARENT
    } else {
        WHITE
    }
}

/// Composites `segments` top to bottom onto a `viewport_width x total_height`
/// canvas.
///
/// Each segment lands at the sum of the heights of the segments before it.
/// Its drawn area is clipped to the canvas, so measurement drift between the
/// reported page height and the captured slices can neither grow the canvas
/// nor overwrite rows that belong to an earlier segment.
pub fn stitch(segments: &[Segment], metrics: &PageMetrics, format: OutputFormat) -> RgbaImage {
    let canvas_width = metrics.viewport_width;
    let canvas_height = metrics.total_height;
    let mut canvas = RgbaImage::from_pixel(canvas_width, canvas_height, background_for(format));

    let mut top: u32 = 0;
    for segment in segments {
        if top >= canvas_height {
            debug!(
                "Dropping segment at offset {} past page height {}",
                segment.offset, canvas_height
            );
            break;
        }

        let height = segment.height().min(canvas_height - top);
        let width = segment.width().min(canvas_width);

        if width > 0 && height > 0 {
            let visible = imageops::crop_imm(&segment.image, 0, 0, width, height);
            imageops::replace(&mut canvas, &*visible, 0, i64::from(top));
        }

        top = top.saturating_add(segment.height());
    }

    canvas
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_segment(offset: u32, width: u32, height: u32, color: [u8; 4]) -> Segment {
        Segment {
            offset,
            image: RgbaImage::from_pixel(width, height, Rgba(color)),
        }
    }

    fn metrics(total_height: u32, viewport_height: u32, viewport_width: u32) -> PageMetrics {
        PageMetrics {
            total_height,
            viewport_height,
            viewport_width,
        }
    }

    #[test]
    fn test_stitch_places_segments_contiguously() {
        let segments = vec![
            solid_segment(0, 4, 3, [255, 0, 0, 255]),
            solid_segment(3, 4, 3, [0, 255, 0, 255]),
            solid_segment(6, 4, 2, [0, 0, 255, 255]),
        ];
        let canvas = stitch(&segments, &metrics(8, 3, 4), OutputFormat::Png);

        assert_eq!(canvas.dimensions(), (4, 8));
        for y in 0..3 {
            assert_eq!(canvas.get_pixel(0, y), &Rgba([255, 0, 0, 255]));
        }
        for y in 3..6 {
            assert_eq!(canvas.get_pixel(3, y), &Rgba([0, 255, 0, 255]));
        }
        for y in 6..8 {
            assert_eq!(canvas.get_pixel(2, y), &Rgba([0, 0, 255, 255]));
        }
        // No gap rows: every pixel is opaque
        assert!(canvas.pixels().all(|p| p[3] == 255));
    }

    #[test]
    fn test_stitch_clamps_overhanging_segment() {
        // Last slice reports more rows than the page has left
        let segments = vec![
            solid_segment(0, 4, 3, [10, 10, 10, 255]),
            solid_segment(3, 6, 5, [20, 20, 20, 255]),
        ];
        let canvas = stitch(&segments, &metrics(5, 3, 4), OutputFormat::Png);

        assert_eq!(canvas.dimensions(), (4, 5));
        assert_eq!(canvas.get_pixel(0, 2), &Rgba([10, 10, 10, 255]));
        assert_eq!(canvas.get_pixel(3, 4), &Rgba([20, 20, 20, 255]));
    }

    #[test]
    fn test_stitch_background_depends_on_format() {
        // Short coverage leaves the bottom rows unpainted
        let segments = vec![solid_segment(0, 2, 2, [1, 2, 3, 255])];

        let png = stitch(&segments, &metrics(4, 2, 2), OutputFormat::Png);
        assert_eq!(png.get_pixel(0, 3), &TRANSPARENT);

        let jpeg = stitch(&segments, &metrics(4, 2, 2), OutputFormat::Jpeg);
        assert_eq!(jpeg.get_pixel(0, 3), &WHITE);
        assert_eq!(jpeg.get_pixel(1, 1), &Rgba([1, 2, 3, 255]));
    }

    #[test]
    fn test_stitch_narrow_segment_is_left_aligned() {
        let segments = vec![solid_segment(0, 2, 2, [9, 9, 9, 255])];
        let canvas = stitch(&segments, &metrics(2, 2, 4), OutputFormat::Jpeg);

        assert_eq!(canvas.get_pixel(1, 0), &Rgba([9, 9, 9, 255]));
        assert_eq!(canvas.get_pixel(2, 0), &WHITE);
    }

    #[test]
    fn test_stitch_is_deterministic() {
        let segments: Vec<Segment> = (0..4u8)
            .map(|i| {
                let image = RgbaImage::from_fn(5, 3, |x, y| {
                    Rgba([i * 40, x as u8 * 20, y as u8 * 30, 200 + i])
                });
                Segment {
                    offset: u32::from(i) * 3,
                    image,
                }
            })
            .collect();
        let m = metrics(12, 3, 5);

        let first = stitch(&segments, &m, OutputFormat::Png);
        let second = stitch(&segments, &m, OutputFormat::Png);
        assert_eq!(first.as_raw(), second.as_raw());
    }
}
