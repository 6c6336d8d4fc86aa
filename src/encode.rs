//! Serializes the final raster into the requested output format

use crate::{CaptureError, OutputFormat};
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage, ImageFormat, Rgb, RgbImage, RgbaImage};
use std::io::Cursor;

/// Composites every pixel over opaque white and drops the alpha channel.
///
/// Per channel: `out = src * a + 255 * (1 - a)` with `a = alpha / 255`,
/// rounded to the nearest integer.
pub fn flatten_alpha(image: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b, a] = image.get_pixel(x, y).0;
        let alpha = u32::from(a);
        let blend = |channel: u8| -> u8 {
            let value = u32::from(channel) * alpha + 255 * (255 - alpha);
            ((value + 127) / 255) as u8
        };
        Rgb([blend(r), blend(g), blend(b)])
    })
}

/// Encodes `image` as `format`.
///
/// PNG keeps the alpha channel. JPEG has none, so the image is flattened
/// against white first and written at `jpeg_quality`.
pub fn encode(
    image: &RgbaImage,
    format: OutputFormat,
    jpeg_quality: u8,
) -> Result<Vec<u8>, CaptureError> {
    let mut data = Vec::new();

    match format {
        OutputFormat::Png => {
            DynamicImage::ImageRgba8(image.clone())
                .write_to(&mut Cursor::new(&mut data), ImageFormat::Png)?;
        }
        OutputFormat::Jpeg => {
            let flattened = flatten_alpha(image);
            let mut encoder = JpegEncoder::new_with_quality(&mut data, jpeg_quality);
            encoder.encode(
                flattened.as_raw(),
                flattened.width(),
                flattened.height(),
                ColorType::Rgb8,
            )?;
        }
    }

    Ok(data)
}
