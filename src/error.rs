use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    #[error("No URLs provided")]
    MissingUrls,

    #[error("Invalid URL")]
    InvalidUrl,

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Navigation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Screenshot capture failed: {0}")]
    Capture(String),

    #[error("Page evaluation failed: {0}")]
    Evaluation(String),

    #[error("Image processing failed: {0}")]
    Image(String),

    #[error("Browser launch failed: {0}")]
    BrowserLaunchFailed(String),

    #[error("Browser session error: {0}")]
    Session(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CaptureError {
    /// Errors that abort the whole request instead of becoming a failed
    /// entry in the result list.
    pub fn is_request_fatal(&self) -> bool {
        matches!(
            self,
            CaptureError::MissingUrls
                | CaptureError::BrowserLaunchFailed(_)
                | CaptureError::Archive(_)
                | CaptureError::Configuration(_)
        )
    }
}

impl From<std::io::Error> for CaptureError {
    fn from(err: std::io::Error) -> Self {
        CaptureError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for CaptureError {
    fn from(err: serde_json::Error) -> Self {
        CaptureError::Serialization(err.to_string())
    }
}

impl From<image::ImageError> for CaptureError {
    fn from(err: image::ImageError) -> Self {
        CaptureError::Image(err.to_string())
    }
}

impl From<zip::result::ZipError> for CaptureError {
    fn from(err: zip::result::ZipError) -> Self {
        CaptureError::Archive(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_url_message() {
        assert_eq!(CaptureError::InvalidUrl.to_string(), "Invalid URL");
    }

    #[test]
    fn test_request_fatal_classification() {
        assert!(CaptureError::MissingUrls.is_request_fatal());
        assert!(CaptureError::Archive("stream closed".to_string()).is_request_fatal());
        assert!(CaptureError::BrowserLaunchFailed("no chrome".to_string()).is_request_fatal());
        assert!(!CaptureError::InvalidUrl.is_request_fatal());
        assert!(!CaptureError::Timeout(Duration::from_secs(60)).is_request_fatal());
        assert!(!CaptureError::Capture("tab crashed".to_string()).is_request_fatal());
    }

    #[test]
    fn test_timeout_message() {
        let err = CaptureError::Timeout(Duration::from_secs(60));
        assert_eq!(err.to_string(), "Navigation timed out after 60s");
    }
}
