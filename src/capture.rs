//! Segmented page capture
//!
//! Pages up to [`Config::full_page_max_height`] are captured in one shot in
//! the requested format. Taller pages are scrolled viewport by viewport and
//! every slice is captured losslessly so that the stitcher can composite
//! exact pixels; the final encode happens once, on the stitched canvas.

use crate::{encode, stitch, CaptureError, CaptureRegion, Config, OutputFormat, PageSession};
use image::{ImageFormat, RgbaImage};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Reports the document height as the largest of the layout signals, since
/// any single one can under-report depending on the CSS layout mode.
pub const MEASURE_PAGE_SCRIPT: &str = r#"(() => {
    const body = document.body;
    const html = document.documentElement;
    const totalHeight = Math.max(
        body ? body.scrollHeight : 0,
        body ? body.offsetHeight : 0,
        body ? body.clientHeight : 0,
        html ? html.scrollHeight : 0,
        html ? html.offsetHeight : 0,
        html ? html.clientHeight : 0
    );
    return {
        totalHeight: totalHeight,
        viewportHeight: window.innerHeight,
        viewportWidth: window.innerWidth
    };
})()"#;

pub fn scroll_script(offset: u32) -> String {
    format!("window.scrollTo(0, {offset})")
}

/// Page geometry measured once after navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageMetrics {
    pub total_height: u32,
    pub viewport_height: u32,
    pub viewport_width: u32,
}

impl PageMetrics {
    /// Keeps `total_height >= viewport_height`.
    pub fn new(total_height: u32, viewport_height: u32, viewport_width: u32) -> Self {
        Self {
            total_height: total_height.max(viewport_height),
            viewport_height,
            viewport_width,
        }
    }

    fn from_json(value: serde_json::Value) -> Result<Self, CaptureError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Reported {
            total_height: f64,
            viewport_height: f64,
            viewport_width: f64,
        }

        let reported: Reported = serde_json::from_value(value)
            .map_err(|e| CaptureError::Evaluation(format!("unexpected page metrics: {e}")))?;

        let to_px = |v: f64| v.max(0.0).ceil().min(f64::from(u32::MAX)) as u32;
        let metrics = Self::new(
            to_px(reported.total_height),
            to_px(reported.viewport_height),
            to_px(reported.viewport_width),
        );

        if metrics.viewport_height == 0 || metrics.viewport_width == 0 {
            return Err(CaptureError::Capture(format!(
                "page reported an empty viewport ({}x{})",
                metrics.viewport_width, metrics.viewport_height
            )));
        }

        Ok(metrics)
    }
}

/// Vertical band `[offset, offset + height)` of the document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentSpan {
    pub offset: u32,
    pub height: u32,
}

/// Splits `[0, total_height)` into viewport-high bands; the last one is
/// clipped to whatever height remains.
pub fn plan_segments(total_height: u32, viewport_height: u32) -> Vec<SegmentSpan> {
    if viewport_height == 0 {
        return Vec::new();
    }

    let count = total_height / viewport_height + u32::from(total_height % viewport_height != 0);
    let mut spans = Vec::with_capacity(count as usize);
    let mut offset = 0;
    while offset < total_height {
        let height = viewport_height.min(total_height - offset);
        spans.push(SegmentSpan { offset, height });
        offset += height;
    }
    spans
}

/// One captured slice of the page
#[derive(Debug, Clone)]
pub struct Segment {
    pub offset: u32,
    pub image: RgbaImage,
}

impl Segment {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

#[derive(Debug, Clone)]
pub enum PageCapture {
    /// Single-shot capture, already encoded in the requested format
    FullPage(Vec<u8>),
    /// Lossless slices still to be stitched and encoded
    Segmented {
        metrics: PageMetrics,
        segments: Vec<Segment>,
    },
}

impl PageCapture {
    pub fn segment_count(&self) -> usize {
        match self {
            PageCapture::FullPage(_) => 1,
            PageCapture::Segmented { segments, .. } => segments.len(),
        }
    }

    /// Final image bytes. The fast path passes through untouched; segmented
    /// captures are stitched and encoded.
    pub fn into_image_bytes(
        self,
        format: OutputFormat,
        jpeg_quality: u8,
    ) -> Result<Vec<u8>, CaptureError> {
        match self {
            PageCapture::FullPage(data) => Ok(data),
            PageCapture::Segmented { metrics, segments } => {
                let canvas = stitch::stitch(&segments, &metrics, format);
                drop(segments);
                encode::encode(&canvas, format, jpeg_quality)
            }
        }
    }
}

/// Drives a navigated page through measurement and capture
#[derive(Debug, Clone)]
pub struct SegmentCapturer {
    settle_delay: Duration,
    full_page_max_height: u32,
    jpeg_quality: u8,
}

impl SegmentCapturer {
    pub fn new(config: &Config) -> Self {
        Self {
            settle_delay: config.settle_delay,
            full_page_max_height: config.full_page_max_height,
            jpeg_quality: config.jpeg_quality,
        }
    }

    pub async fn measure(&self, page: &dyn PageSession) -> Result<PageMetrics, CaptureError> {
        let value = page.evaluate(MEASURE_PAGE_SCRIPT).await?;
        PageMetrics::from_json(value)
    }

    /// Captures the whole document of an already navigated `page`.
    ///
    /// Errors propagate unchanged; the caller decides how a failed page is
    /// reported.
    pub async fn capture(
        &self,
        page: &dyn PageSession,
        format: OutputFormat,
    ) -> Result<PageCapture, CaptureError> {
        let metrics = self.measure(page).await?;
        debug!(
            "Page metrics: {}px tall, viewport {}x{}",
            metrics.total_height, metrics.viewport_width, metrics.viewport_height
        );

        if metrics.total_height <= self.full_page_max_height {
            let quality = match format {
                OutputFormat::Jpeg => Some(self.jpeg_quality),
                OutputFormat::Png => None,
            };
            let data = page.capture(CaptureRegion::FullPage, format, quality).await?;
            return Ok(PageCapture::FullPage(data));
        }

        let spans = plan_segments(metrics.total_height, metrics.viewport_height);
        let mut segments = Vec::with_capacity(spans.len());

        for (index, span) in spans.iter().enumerate() {
            page.evaluate(&scroll_script(span.offset)).await?;
            if !self.settle_delay.is_zero() {
                tokio::time::sleep(self.settle_delay).await;
            }

            let region = CaptureRegion::Clip {
                x: 0,
                y: span.offset,
                width: metrics.viewport_width,
                height: span.height,
            };
            let data = page.capture(region, OutputFormat::Png, None).await?;
            let image = image::load_from_memory_with_format(&data, ImageFormat::Png)?.to_rgba8();
            if image.dimensions() != (metrics.viewport_width, span.height) {
                return Err(CaptureError::Image(format!(
                    "segment at offset {} is {}x{} px, expected {}x{}",
                    span.offset,
                    image.width(),
                    image.height(),
                    metrics.viewport_width,
                    span.height
                )));
            }

            debug!(
                "Captured segment {}/{} at offset {} ({}x{})",
                index + 1,
                spans.len(),
                span.offset,
                image.width(),
                image.height()
            );
            segments.push(Segment {
                offset: span.offset,
                image,
            });
        }

        if let Err(e) = page.evaluate(&scroll_script(0)).await {
            warn!("Failed to restore scroll position: {}", e);
        }

        Ok(PageCapture::Segmented { metrics, segments })
    }
}
