//! # Screenshot Archiver
//!
//! Turns an ordered list of URLs into full-page screenshots packaged in a
//! single zip archive, together with a JSON manifest describing every URL.
//!
//! Pages up to a configurable height are captured in one shot. Taller pages
//! are scrolled viewport by viewport, each slice is captured losslessly, and
//! the slices are stitched back into one raster before the requested output
//! format is applied. A failure on one URL never aborts the others: it is
//! recorded in the manifest and as a text entry in the archive.
//!
//! ## Pipeline
//!
//! | Stage | Module | Output |
//! |-------|--------|--------|
//! | Request validation | [`orchestrator`] | `MissingUrls` or a session |
//! | Measurement and capture | [`capture`] | one capture or N segments |
//! | Reassembly | [`stitch`] | one `viewport x page height` raster |
//! | Encoding | [`encode`] | PNG, or JPEG flattened onto white |
//! | Packaging | [`archive`] | zip bytes with `manifest.json` |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use screenshot_archiver::{
//!     CaptureOrchestrator, CaptureRequest, ChromiumLauncher, Config, OutputFormat,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let launcher = Arc::new(ChromiumLauncher::new(config.clone()));
//!     let orchestrator = CaptureOrchestrator::new(config, launcher);
//!
//!     let request = CaptureRequest::new(
//!         vec!["https://example.com".to_string()],
//!         OutputFormat::Png,
//!     )
//!     .with_label("example");
//!     let outcome = orchestrator.capture(request).await?;
//!     std::fs::write(format!("{}.zip", outcome.folder_name), &outcome.archive)?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! screenshot-archiver capture --url https://example.com --url https://example.org --label docs
//! screenshot-archiver capture --input urls.txt --format jpeg --output archives/
//! ```

/// Configuration, request and result types
pub mod config;

/// Error types and error handling utilities
pub mod error;

/// Browser session capability and the Chromium backend
pub mod session;

/// Page measurement and segmented capture
pub mod capture;

/// Segment reassembly
pub mod stitch;

/// Output image encoding
pub mod encode;

/// Request-level pipeline
pub mod orchestrator;

/// Zip packaging and manifest
pub mod archive;

/// Command-line interface implementation
pub mod cli;

/// Capture counters and histograms
pub mod metrics;

/// Naming and formatting helpers
pub mod utils;


pub use archive::*;
pub use capture::*;
pub use cli::*;
pub use config::*;
pub use encode::*;
pub use error::*;
pub use self::metrics::*;
pub use orchestrator::*;
pub use session::*;
pub use stitch::*;
pub use utils::*;
