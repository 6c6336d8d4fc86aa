//! Capture counters and histograms
//!
//! Recorded through the `metrics` facade; without an installed recorder
//! every call is a no-op.

use crate::PageCapture;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

pub const PAGES_SUCCEEDED: &str = "capture_pages_succeeded_total";
pub const PAGES_FAILED: &str = "capture_pages_failed_total";
pub const SEGMENTS_CAPTURED: &str = "capture_segments_total";
pub const FAST_PATH_CAPTURES: &str = "capture_fast_path_total";
pub const PAGE_DURATION: &str = "capture_page_duration_seconds";
pub const ARCHIVE_BYTES: &str = "capture_archive_bytes";

#[derive(Debug, Clone, Copy, Default)]
pub struct CaptureMetrics;

impl CaptureMetrics {
    pub fn new() -> Self {
        Self
    }

    pub fn record_page(&self, duration: Duration, success: bool) {
        if success {
            ::metrics::increment_counter!(PAGES_SUCCEEDED);
        } else {
            ::metrics::increment_counter!(PAGES_FAILED);
        }
        ::metrics::histogram!(PAGE_DURATION, duration.as_secs_f64());
    }

    pub fn record_capture(&self, capture: &PageCapture) {
        match capture {
            PageCapture::FullPage(_) => ::metrics::increment_counter!(FAST_PATH_CAPTURES),
            PageCapture::Segmented { segments, .. } => {
                ::metrics::counter!(SEGMENTS_CAPTURED, segments.len() as u64)
            }
        }
    }

    pub fn record_archive(&self, bytes: usize) {
        ::metrics::histogram!(ARCHIVE_BYTES, bytes as f64);
    }
}

/// Installs the Prometheus recorder for this process.
pub fn install_prometheus_recorder() -> Result<PrometheusHandle, crate::CaptureError> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| crate::CaptureError::Configuration(format!("metrics recorder: {e}")))
}
