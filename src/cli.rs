use crate::{
    install_prometheus_recorder, CaptureError, CaptureOrchestrator, CaptureOutcome,
    CaptureRequest, Config, OutputFormat, SessionLauncher,
};
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "screenshot-archiver")]
#[command(about = "Capture full-page screenshots of URLs into a zip archive")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, help = "Configuration file path")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Navigation timeout in seconds")]
    pub timeout: Option<u64>,

    #[arg(long, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, help = "Chrome executable path")]
    pub chrome_path: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Capture URLs and write the archive
    Capture {
        #[arg(short, long = "url", help = "URL to capture (repeatable, after any --input URLs)")]
        urls: Vec<String>,

        #[arg(short, long, help = "File with one URL per line")]
        input: Option<PathBuf>,

        #[arg(long, help = "Output format (png, jpeg)")]
        format: Option<String>,

        #[arg(long, help = "Label used for the archive folder name")]
        label: Option<String>,

        #[arg(short, long, default_value = ".", help = "Directory the archive is written to")]
        output: PathBuf,

        #[arg(long, help = "Write Prometheus metrics to this file when done")]
        metrics_out: Option<PathBuf>,
    },

    /// Validate configuration
    Validate {
        #[arg(short, long, help = "Configuration file to validate")]
        config: PathBuf,
    },
}

#[derive(Debug, Clone)]
pub struct CaptureOptions {
    pub urls: Vec<String>,
    pub input: Option<PathBuf>,
    pub format: Option<String>,
    pub label: Option<String>,
    pub output: PathBuf,
    pub metrics_out: Option<PathBuf>,
}

pub struct CliRunner {
    pub config: Config,
    pub orchestrator: CaptureOrchestrator,
}

impl CliRunner {
    pub fn new(config: Config, launcher: Arc<dyn SessionLauncher>) -> Self {
        let orchestrator = CaptureOrchestrator::new(config.clone(), launcher);
        Self {
            config,
            orchestrator,
        }
    }

    pub async fn run(&self, command: Commands) -> anyhow::Result<()> {
        match command {
            Commands::Capture {
                urls,
                input,
                format,
                label,
                output,
                metrics_out,
            } => {
                self.run_capture(CaptureOptions {
                    urls,
                    input,
                    format,
                    label,
                    output,
                    metrics_out,
                })
                .await
                .map(|_| ())
            }
            Commands::Validate { config } => self.validate_config(config).await,
        }
    }

    /// Runs one capture request and writes `<output>/<folder>.zip`.
    ///
    /// Returns the path of the written archive.
    pub async fn run_capture(&self, options: CaptureOptions) -> anyhow::Result<PathBuf> {
        let request = self.build_request(&options).await?;

        let prometheus = match &options.metrics_out {
            Some(_) => Some(install_prometheus_recorder()?),
            None => None,
        };

        let outcome = self.orchestrator.capture(request).await?;

        fs::create_dir_all(&options.output)
            .await
            .with_context(|| format!("creating {}", options.output.display()))?;
        let archive_path = options.output.join(format!("{}.zip", outcome.folder_name));
        fs::write(&archive_path, &outcome.archive)
            .await
            .with_context(|| format!("writing {}", archive_path.display()))?;
        info!("Archive saved to: {}", archive_path.display());

        print_summary(&outcome, &archive_path);

        if let (Some(path), Some(handle)) = (&options.metrics_out, prometheus) {
            fs::write(path, handle.render())
                .await
                .with_context(|| format!("writing metrics to {}", path.display()))?;
        }

        Ok(archive_path)
    }

    pub async fn build_request(&self, options: &CaptureOptions) -> anyhow::Result<CaptureRequest> {
        let mut urls = Vec::new();
        if let Some(input) = &options.input {
            urls = read_urls_from_file(input).await?;
            info!("Loaded {} URLs from {}", urls.len(), input.display());
        }
        urls.extend(options.urls.iter().cloned());

        let format = match &options.format {
            Some(format) => format.parse::<OutputFormat>()?,
            None => self.config.output_format,
        };

        let mut request = CaptureRequest::new(urls, format);
        if let Some(label) = &options.label {
            request = request.with_label(label.as_str());
        }

        if !request.has_urls() {
            return Err(CaptureError::MissingUrls.into());
        }

        Ok(request)
    }

    pub async fn validate_config(&self, config_path: PathBuf) -> anyhow::Result<()> {
        println!("Validating configuration: {}", config_path.display());

        let config_content = fs::read_to_string(&config_path).await?;
        let config: Config = serde_json::from_str(&config_content)?;
        config.validate()?;

        println!("Configuration is valid:");
        println!(
            "  Viewport: {}x{}",
            config.viewport.width, config.viewport.height
        );
        println!("  Navigation timeout: {:?}", config.navigation_timeout);
        println!("  Settle delay: {:?}", config.settle_delay);
        println!("  Single-shot height limit: {}px", config.full_page_max_height);
        println!("  Output format: {:?}", config.output_format);
        println!("  JPEG quality: {}", config.jpeg_quality);

        Ok(())
    }
}

fn print_summary(outcome: &CaptureOutcome, archive_path: &Path) {
    println!("Archive written: {}", archive_path.display());
    println!("  Folder: {}", outcome.folder_name);
    println!(
        "  Captured: {}, Failed: {}",
        outcome.success_count(),
        outcome.failure_count()
    );
    println!("  Size: {}", crate::format_bytes(outcome.archive.len()));

    for result in &outcome.results {
        match result.filename() {
            Some(filename) => println!("  ok   {} -> {}", result.url(), filename),
            None => {
                let reason = result.error().unwrap_or_default();
                warn!("{} failed: {}", result.url(), reason);
                println!("  fail {} ({})", result.url(), reason);
            }
        }
    }
}

pub async fn read_urls_from_file(path: &Path) -> anyhow::Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("reading URL list {}", path.display()))?;
    Ok(parse_url_list(&content))
}

/// One URL per line; blank lines and `#` comments are ignored.
pub fn parse_url_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| line.to_string())
        .collect()
}

pub fn setup_logging(verbose: bool) -> anyhow::Result<()> {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install logger: {e}"))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BrowserSession, ChromiumLauncher};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct NeverLaunch {
        launches: AtomicUsize,
    }

    #[async_trait]
    impl SessionLauncher for NeverLaunch {
        async fn launch(&self) -> Result<Box<dyn BrowserSession>, CaptureError> {
            self.launches.fetch_add(1, Ordering::SeqCst);
            Err(CaptureError::BrowserLaunchFailed("not available".to_string()))
        }
    }

    fn options(urls: &[&str]) -> CaptureOptions {
        CaptureOptions {
            urls: urls.iter().map(|u| u.to_string()).collect(),
            input: None,
            format: None,
            label: None,
            output: PathBuf::from("."),
            metrics_out: None,
        }
    }

    #[test]
    fn test_parse_capture_command() {
        let cli = Cli::try_parse_from([
            "screenshot-archiver",
            "--verbose",
            "capture",
            "--url",
            "https://example.com",
            "-u",
            "https://example.org",
            "--format",
            "jpeg",
            "--label",
            "Q1 report",
        ])
        .unwrap();

        assert!(cli.verbose);
        match cli.command {
            Commands::Capture {
                urls,
                format,
                label,
                output,
                ..
            } => {
                assert_eq!(urls, vec!["https://example.com", "https://example.org"]);
                assert_eq!(format.as_deref(), Some("jpeg"));
                assert_eq!(label.as_deref(), Some("Q1 report"));
                assert_eq!(output, PathBuf::from("."));
            }
            Commands::Validate { .. } => panic!("expected capture"),
        }
    }

    #[test]
    fn test_parse_url_list_skips_comments_and_blanks() {
        let urls = parse_url_list("# docs\nhttps://example.com\n\n  https://example.org  \n#x\n");
        assert_eq!(urls, vec!["https://example.com", "https://example.org"]);
    }

    #[tokio::test]
    async fn test_build_request_uses_config_format_by_default() {
        let config = Config {
            output_format: OutputFormat::Jpeg,
            ..Default::default()
        };
        let runner = CliRunner::new(config.clone(), Arc::new(ChromiumLauncher::new(config)));

        let request = runner
            .build_request(&options(&["https://example.com"]))
            .await
            .unwrap();
        assert_eq!(request.format, OutputFormat::Jpeg);
        assert!(request.label.is_none());
    }

    #[tokio::test]
    async fn test_build_request_rejects_unknown_format() {
        let launcher = Arc::new(NeverLaunch::default());
        let runner = CliRunner::new(Config::default(), launcher);

        let mut opts = options(&["https://example.com"]);
        opts.format = Some("webp".to_string());
        assert!(runner.build_request(&opts).await.is_err());
    }

    #[tokio::test]
    async fn test_capture_without_urls_fails_before_launch() {
        let launcher = Arc::new(NeverLaunch::default());
        let runner = CliRunner::new(Config::default(), launcher.clone());

        let err = runner.run_capture(options(&["", "  "])).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CaptureError>(),
            Some(CaptureError::MissingUrls)
        ));
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_launch_failure_is_fatal() {
        let launcher = Arc::new(NeverLaunch::default());
        let runner = CliRunner::new(Config::default(), launcher.clone());

        let err = runner
            .run_capture(options(&["https://example.com"]))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CaptureError>(),
            Some(CaptureError::BrowserLaunchFailed(_))
        ));
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 1);
    }
}
