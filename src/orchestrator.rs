//! Request-level capture pipeline
//!
//! One request opens one browser session, walks its URLs in order with a
//! fresh page each, and packages whatever came out into a zip archive. Only
//! request validation, browser launch and packaging can fail the request as
//! a whole; everything that goes wrong for a single URL becomes a failed
//! [`CaptureResult`] and the loop moves on.
//!
//! Pages and the session are held by drop guards, so they are released
//! even when the caller abandons the request future.

use crate::{
    build_filename, derive_folder_name, format_duration, validate_url, ArchiveBuilder,
    BrowserSession, CaptureError, CaptureMetrics, CaptureOutcome, CaptureRequest, CaptureResult,
    Config, OutputFormat, PageSession, SegmentCapturer, SessionLauncher,
};
use chrono::Utc;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

pub struct CaptureOrchestrator {
    config: Config,
    launcher: Arc<dyn SessionLauncher>,
    capturer: SegmentCapturer,
    metrics: CaptureMetrics,
}

impl CaptureOrchestrator {
    pub fn new(config: Config, launcher: Arc<dyn SessionLauncher>) -> Self {
        let capturer = SegmentCapturer::new(&config);
        Self {
            config,
            launcher,
            capturer,
            metrics: CaptureMetrics::new(),
        }
    }

    /// Captures every URL of `request` and returns the results with the
    /// packaged archive.
    ///
    /// Fails with [`CaptureError::MissingUrls`] before any browser work when
    /// the request has no non-blank URL.
    pub async fn capture(&self, request: CaptureRequest) -> Result<CaptureOutcome, CaptureError> {
        if !request.has_urls() {
            return Err(CaptureError::MissingUrls);
        }

        let started_at = Utc::now();
        let folder_name = derive_folder_name(
            request.label.as_deref(),
            self.config.label_max_length,
            started_at,
        );
        info!(
            "Capturing {} URLs into {} as {:?}",
            request.urls.len(),
            folder_name,
            request.format
        );

        let session: Arc<dyn BrowserSession> = Arc::from(self.launcher.launch().await?);
        let session_guard = ReleaseOnDrop::new(close_session(session.clone()));
        let results = self
            .capture_all(session.as_ref(), &request.urls, request.format)
            .await;
        session_guard.release().await;

        let archive = ArchiveBuilder::new(folder_name.as_str(), started_at)
            .with_name_max_length(self.config.label_max_length)
            .build(&results)
            .map_err(|e| {
                error!("Failed to package {}: {}", folder_name, e);
                e
            })?;
        self.metrics.record_archive(archive.len());

        let outcome = CaptureOutcome {
            results,
            archive,
            folder_name,
        };
        info!(
            "Request complete: {} captured, {} failed, archive {} bytes",
            outcome.success_count(),
            outcome.failure_count(),
            outcome.archive.len()
        );

        Ok(outcome)
    }

    async fn capture_all(
        &self,
        session: &dyn BrowserSession,
        urls: &[String],
        format: OutputFormat,
    ) -> Vec<CaptureResult> {
        let mut results = Vec::with_capacity(urls.len());

        for (index, url) in urls.iter().enumerate() {
            let url = url.trim();
            if url.is_empty() {
                continue;
            }

            let started = Instant::now();
            let result = self.capture_url(session, index + 1, url, format).await;
            let elapsed = started.elapsed();
            self.metrics.record_page(elapsed, result.is_success());

            match &result {
                CaptureResult::Captured { filename, data, .. } => info!(
                    "Captured {} as {} ({} bytes) in {}",
                    url,
                    filename,
                    data.len(),
                    format_duration(elapsed)
                ),
                CaptureResult::Failed { error, .. } => warn!("Failed to capture {}: {}", url, error),
            }
            results.push(result);
        }

        results
    }

    async fn capture_url(
        &self,
        session: &dyn BrowserSession,
        position: usize,
        url: &str,
        format: OutputFormat,
    ) -> CaptureResult {
        if let Err(e) = validate_url(url) {
            return CaptureResult::failed(url, &e);
        }

        let page: Arc<dyn PageSession> = match session.new_page().await {
            Ok(page) => Arc::from(page),
            Err(e) => return CaptureResult::failed(url, &e),
        };
        let page_guard = ReleaseOnDrop::new(close_page(page.clone(), url.to_string()));

        let captured = self.capture_on_page(page.as_ref(), position, url, format).await;
        page_guard.release().await;

        match captured {
            Ok((filename, data)) => CaptureResult::Captured {
                url: url.to_string(),
                filename,
                data,
            },
            Err(e) => CaptureResult::failed(url, &e),
        }
    }

    async fn capture_on_page(
        &self,
        page: &dyn PageSession,
        position: usize,
        url: &str,
        format: OutputFormat,
    ) -> Result<(String, Vec<u8>), CaptureError> {
        page.navigate(url, self.config.navigation_timeout).await?;

        let capture = self.capturer.capture(page, format).await?;
        self.metrics.record_capture(&capture);
        debug!("{} captured in {} piece(s)", url, capture.segment_count());

        // A missing title only costs the nicer filename
        let title = page.title().await.unwrap_or_else(|e| {
            debug!("No title for {}: {}", url, e);
            None
        });

        let data = capture.into_image_bytes(format, self.config.jpeg_quality)?;
        let filename = build_filename(
            position,
            title.as_deref(),
            url,
            format,
            self.config.label_max_length,
        );

        Ok((filename, data))
    }
}

async fn close_session(session: Arc<dyn BrowserSession>) {
    if let Err(e) = session.close().await {
        warn!("Failed to close browser session: {}", e);
    }
}

async fn close_page(page: Arc<dyn PageSession>, url: String) {
    if let Err(e) = page.close().await {
        warn!("Failed to close page for {}: {}", url, e);
    }
}

/// Runs a release future exactly once.
///
/// [`ReleaseOnDrop::release`] awaits it in place. If the guard is dropped
/// first, because the request future was cancelled or a capture panicked,
/// the release is spawned onto the current runtime instead.
struct ReleaseOnDrop {
    release: Option<BoxFuture<'static, ()>>,
}

impl ReleaseOnDrop {
    fn new(release: impl Future<Output = ()> + Send + 'static) -> Self {
        Self {
            release: Some(Box::pin(release)),
        }
    }

    async fn release(mut self) {
        if let Some(release) = self.release.take() {
            release.await;
        }
    }
}

impl Drop for ReleaseOnDrop {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    debug!("Releasing browser resource after interrupted capture");
                    handle.spawn(release);
                }
                Err(_) => warn!("No runtime left to release browser resource"),
            }
        }
    }
}
