//! Configuration management with serde serialization/deserialization
//!
//! This module holds the capture settings, the request/result types that flow
//! through the pipeline, and the Chromium launch configuration derived from them.

use crate::CaptureError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tempfile::TempDir;

/// Main configuration structure for the archiver
///
/// Controls the page viewport, navigation and settle timings, the fast-path
/// ceiling and the encoding parameters used for every page of a request.
///
/// # Examples
///
/// ```rust
/// use screenshot_archiver::Config;
/// use std::time::Duration;
///
/// let config = Config {
///     settle_delay: Duration::from_millis(500),
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Browser viewport used for every page (default: 1920x1080)
    ///
    /// The viewport height is the segment height when a page is captured
    /// in slices.
    pub viewport: Viewport,

    /// Upper bound for a single navigation (default: 60 seconds)
    ///
    /// Exceeding it fails that URL only.
    pub navigation_timeout: Duration,

    /// Wait after each scroll before a segment is captured (default: 200ms)
    ///
    /// Gives scroll-triggered lazy content time to settle.
    pub settle_delay: Duration,

    /// Tallest page captured in a single shot (default: 16384 px)
    ///
    /// Taller pages are captured viewport by viewport and stitched.
    pub full_page_max_height: u32,

    /// Quality used for lossy output (default: 85)
    pub jpeg_quality: u8,

    /// Maximum length of every sanitized name token (default: 60)
    ///
    /// One bound covers the archive folder derived from the label, the
    /// title or host part of image filenames, and the URL-derived names of
    /// failure entries.
    pub label_max_length: usize,

    /// Output image format when a request does not name one (default: PNG)
    pub output_format: OutputFormat,

    /// Path to Chrome/Chromium executable (default: auto-detect)
    pub chrome_path: Option<String>,

    /// Custom User-Agent string for page loads (default: Chrome default)
    pub user_agent: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            viewport: Viewport::default(),
            navigation_timeout: Duration::from_secs(60),
            settle_delay: Duration::from_millis(200),
            full_page_max_height: 16384,
            jpeg_quality: 85,
            label_max_length: 60,
            output_format: OutputFormat::Png,
            chrome_path: None,
            user_agent: None,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(CaptureError::Configuration(
                "Viewport dimensions must be greater than 0".to_string(),
            ));
        }

        // Segments are stitched on a CSS-pixel canvas
        if self.viewport.device_scale_factor != 1.0 {
            return Err(CaptureError::Configuration(format!(
                "Device scale factor must be 1.0, got {}",
                self.viewport.device_scale_factor
            )));
        }

        if self.navigation_timeout.is_zero() {
            return Err(CaptureError::Configuration(
                "Navigation timeout must be greater than 0".to_string(),
            ));
        }

        if self.full_page_max_height == 0 {
            return Err(CaptureError::Configuration(
                "Full page height ceiling must be greater than 0".to_string(),
            ));
        }

        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(CaptureError::Configuration(format!(
                "JPEG quality must be within 1..=100, got {}",
                self.jpeg_quality
            )));
        }

        if self.label_max_length == 0 {
            return Err(CaptureError::Configuration(
                "Label length bound must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Browser viewport configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Viewport {
    /// Viewport width in pixels (default: 1920)
    pub width: u32,

    /// Viewport height in pixels (default: 1080)
    pub height: u32,

    /// Device pixel ratio (default: 1.0, the only accepted value)
    pub device_scale_factor: f64,

    /// Whether to emulate a mobile device (default: false)
    pub mobile: bool,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            device_scale_factor: 1.0,
            mobile: false,
        }
    }
}

/// Supported output image formats
///
/// - PNG: lossless, keeps the alpha channel
/// - JPEG: lossy, alpha is flattened against white before encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// PNG format - lossless compression
    Png,
    /// JPEG format - lossy compression at the configured quality
    Jpeg,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
        }
    }

    pub fn supports_alpha(&self) -> bool {
        matches!(self, OutputFormat::Png)
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::Png
    }
}

impl FromStr for OutputFormat {
    type Err = CaptureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" | "lossless" => Ok(OutputFormat::Png),
            "jpeg" | "jpg" | "lossy" => Ok(OutputFormat::Jpeg),
            other => Err(CaptureError::Configuration(format!(
                "Unsupported output format: {other}"
            ))),
        }
    }
}

/// One capture request: an ordered URL list, the output format and an
/// optional label that only influences the archive folder name.
#[derive(Debug, Clone, Default)]
pub struct CaptureRequest {
    pub urls: Vec<String>,
    pub format: OutputFormat,
    pub label: Option<String>,
}

impl CaptureRequest {
    pub fn new(urls: Vec<String>, format: OutputFormat) -> Self {
        Self {
            urls,
            format,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn has_urls(&self) -> bool {
        self.urls.iter().any(|url| !url.trim().is_empty())
    }
}

/// Outcome of a single URL
#[derive(Debug, Clone)]
pub enum CaptureResult {
    Captured {
        url: String,
        filename: String,
        data: Vec<u8>,
    },
    Failed {
        url: String,
        error: String,
    },
}

impl CaptureResult {
    pub fn failed(url: impl Into<String>, error: &CaptureError) -> Self {
        CaptureResult::Failed {
            url: url.into(),
            error: error.to_string(),
        }
    }

    pub fn url(&self) -> &str {
        match self {
            CaptureResult::Captured { url, .. } | CaptureResult::Failed { url, .. } => url,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CaptureResult::Captured { .. })
    }

    pub fn filename(&self) -> Option<&str> {
        match self {
            CaptureResult::Captured { filename, .. } => Some(filename),
            CaptureResult::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            CaptureResult::Captured { .. } => None,
            CaptureResult::Failed { error, .. } => Some(error),
        }
    }
}

/// Everything a request produces
#[derive(Debug, Clone)]
pub struct CaptureOutcome {
    pub results: Vec<CaptureResult>,
    pub archive: Vec<u8>,
    pub folder_name: String,
}

impl CaptureOutcome {
    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.results.len() - self.success_count()
    }
}

/// Scratch directories owned by one browser launch
///
/// Chromium writes its profile under `profile/` and its temporary files
/// under `tmp/`. Everything is deleted when the value is dropped or
/// [`ProfileDirs::remove`] is called.
#[derive(Debug)]
pub struct ProfileDirs {
    root: TempDir,
}

impl ProfileDirs {
    pub fn create() -> Result<Self, CaptureError> {
        let root = tempfile::Builder::new()
            .prefix(&format!("chromium-archiver-{}-", std::process::id()))
            .tempdir()?;
        std::fs::create_dir(root.path().join("profile"))?;
        std::fs::create_dir(root.path().join("tmp"))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn user_data_dir(&self) -> PathBuf {
        self.root.path().join("profile")
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.root.path().join("tmp")
    }

    /// Deletes the directories now and reports what went wrong, if anything.
    pub fn remove(self) -> Result<(), CaptureError> {
        self.root.close()?;
        Ok(())
    }
}

/// Generate Chrome command-line arguments based on configuration
///
/// Every launch gets its own user data and temp directories so that
/// concurrent requests never share a Chromium profile.
pub fn get_chrome_args(config: &Config, profile: &ProfileDirs) -> Vec<String> {
    let mut args = vec![
        "--headless".to_string(),
        "--no-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--disable-gpu".to_string(),
        "--disable-extensions".to_string(),
        "--disable-default-apps".to_string(),
        "--disable-sync".to_string(),
        "--no-first-run".to_string(),
        "--hide-scrollbars".to_string(),
        format!(
            "--window-size={},{}",
            config.viewport.width, config.viewport.height
        ),
        format!("--user-data-dir={}", profile.user_data_dir().display()),
        format!("--temp-dir={}", profile.temp_dir().display()),
    ];

    if let Some(user_agent) = &config.user_agent {
        args.push(format!("--user-agent={user_agent}"));
    }

    args
}

pub fn create_browser_config(
    config: &Config,
    profile: &ProfileDirs,
) -> Result<chromiumoxide::browser::BrowserConfig, CaptureError> {
    use chromiumoxide::browser::BrowserConfig;

    let mut builder = BrowserConfig::builder()
        .window_size(config.viewport.width, config.viewport.height)
        .args(get_chrome_args(config, profile));

    if let Some(chrome_path) = &config.chrome_path {
        builder = builder.chrome_executable(chrome_path);
    }

    builder.build().map_err(CaptureError::BrowserLaunchFailed)
}
