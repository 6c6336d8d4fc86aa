//! Browser session capability and its Chromium backend
//!
//! The capture pipeline only talks to the three traits below. A backend
//! provides a launcher that opens one [`BrowserSession`] per request, and the
//! session hands out one [`PageSession`] per URL. [`ChromiumLauncher`] is the
//! chromiumoxide implementation used by the binary.

use crate::{create_browser_config, CaptureError, Config, OutputFormat, ProfileDirs, Viewport};
use async_trait::async_trait;
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, Viewport as ClipRect,
};
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Region of the page to rasterize, in document CSS pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CaptureRegion {
    /// The whole scrollable document
    FullPage,
    /// An explicit rectangle of the document
    Clip {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
}

/// Opens browser sessions. One session serves one request.
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, CaptureError>;
}

/// A running browser that can open pages
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn new_page(&self) -> Result<Box<dyn PageSession>, CaptureError>;

    /// Shuts the browser down. Calling it again is a no-op.
    async fn close(&self) -> Result<(), CaptureError>;
}

/// A single browser tab
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PageSession: Send + Sync {
    /// Loads `url` and returns once the page has settled, or fails after `timeout`.
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), CaptureError>;

    /// Runs a script in the page and returns its JSON result (`Null` for `undefined`).
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, CaptureError>;

    /// Rasterizes `region` in `format`; `quality` only applies to lossy formats.
    async fn capture(
        &self,
        region: CaptureRegion,
        format: OutputFormat,
        quality: Option<u8>,
    ) -> Result<Vec<u8>, CaptureError>;

    async fn title(&self) -> Result<Option<String>, CaptureError>;

    async fn close(&self) -> Result<(), CaptureError>;
}

pub struct ChromiumLauncher {
    config: Config,
}

impl ChromiumLauncher {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, CaptureError> {
        // Dropped, and so deleted, if the launch fails
        let profile = ProfileDirs::create()?;
        let browser_config = create_browser_config(&self.config, &profile)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| CaptureError::BrowserLaunchFailed(e.to_string()))?;

        // The handler implements Stream and must be polled for the CDP
        // connection to make progress
        let handler_task = tokio::spawn(async move {
            loop {
                match handler.next().await {
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        warn!("Browser handler error: {}", e);
                        return Err(e);
                    }
                    None => {
                        debug!("Browser handler stream ended");
                        break;
                    }
                }
            }
            Ok(())
        });

        info!("Chromium session launched (profile {})", profile.root().display());

        Ok(Box::new(ChromiumSession {
            browser: Mutex::new(browser),
            handler: handler_task,
            viewport: self.config.viewport.clone(),
            profile: std::sync::Mutex::new(Some(profile)),
            closed: AtomicBool::new(false),
        }))
    }
}

pub struct ChromiumSession {
    browser: Mutex<Browser>,
    handler: JoinHandle<Result<(), chromiumoxide::error::CdpError>>,
    viewport: Viewport,
    profile: std::sync::Mutex<Option<ProfileDirs>>,
    closed: AtomicBool,
}

impl ChromiumSession {
    fn take_profile(&self) -> Option<ProfileDirs> {
        match self.profile.lock() {
            Ok(mut profile) => profile.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn new_page(&self) -> Result<Box<dyn PageSession>, CaptureError> {
        let page = self
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .map_err(|e| CaptureError::Session(e.to_string()))?;

        let emulation_params = SetDeviceMetricsOverrideParams::builder()
            .width(self.viewport.width)
            .height(self.viewport.height)
            .device_scale_factor(self.viewport.device_scale_factor)
            .mobile(self.viewport.mobile)
            .build()
            .map_err(CaptureError::Session)?;

        if let Err(e) = page.execute(emulation_params).await {
            let _ = page.close().await;
            return Err(CaptureError::Session(e.to_string()));
        }

        Ok(Box::new(ChromiumPage { page }))
    }

    async fn close(&self) -> Result<(), CaptureError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let result = {
            let mut browser = self.browser.lock().await;
            let closed = browser
                .close()
                .await
                .map(|_| ())
                .map_err(|e| CaptureError::Session(e.to_string()));
            // The profile can only be removed once the process has exited
            if let Err(e) = browser.wait().await {
                warn!("Failed to wait for browser exit: {}", e);
            }
            closed
        };
        self.handler.abort();

        if let Some(profile) = self.take_profile() {
            let root = profile.root().to_path_buf();
            if let Err(e) = profile.remove() {
                warn!("Failed to remove browser profile {}: {}", root.display(), e);
            }
        }

        info!("Chromium session closed");
        result
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::SeqCst) {
            // Browser's own Drop kills the process; the profile goes with
            // the remaining fields
            warn!("Chromium session dropped without close");
            self.handler.abort();
        }
    }
}

pub struct ChromiumPage {
    page: Page,
}

#[async_trait]
impl PageSession for ChromiumPage {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), CaptureError> {
        let navigation = async {
            self.page
                .goto(url)
                .await
                .map_err(|e| CaptureError::Navigation(e.to_string()))?;
            self.page
                .wait_for_navigation()
                .await
                .map_err(|e| CaptureError::Navigation(e.to_string()))?;
            Ok(())
        };

        match tokio::time::timeout(timeout, navigation).await {
            Ok(result) => result,
            Err(_) => Err(CaptureError::Timeout(timeout)),
        }
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, CaptureError> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| CaptureError::Evaluation(e.to_string()))?;

        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn capture(
        &self,
        region: CaptureRegion,
        format: OutputFormat,
        quality: Option<u8>,
    ) -> Result<Vec<u8>, CaptureError> {
        let mut builder = ScreenshotParams::builder();

        builder = match format {
            OutputFormat::Png => builder.format(CaptureScreenshotFormat::Png),
            OutputFormat::Jpeg => {
                let builder = builder.format(CaptureScreenshotFormat::Jpeg);
                match quality {
                    Some(quality) => builder.quality(i64::from(quality)),
                    None => builder,
                }
            }
        };

        builder = match region {
            CaptureRegion::FullPage => builder.full_page(true),
            CaptureRegion::Clip {
                x,
                y,
                width,
                height,
            } => builder.capture_beyond_viewport(true).clip(ClipRect {
                x: f64::from(x),
                y: f64::from(y),
                width: f64::from(width),
                height: f64::from(height),
                scale: 1.0,
            }),
        };

        self.page
            .screenshot(builder.build())
            .await
            .map_err(|e| CaptureError::Capture(e.to_string()))
    }

    async fn title(&self) -> Result<Option<String>, CaptureError> {
        self.page
            .get_title()
            .await
            .map_err(|e| CaptureError::Evaluation(e.to_string()))
    }

    async fn close(&self) -> Result<(), CaptureError> {
        self.page
            .clone()
            .close()
            .await
            .map_err(|e| CaptureError::Session(e.to_string()))
    }
}
