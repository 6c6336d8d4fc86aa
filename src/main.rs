use clap::Parser;
use screenshot_archiver::{setup_logging, CaptureError, ChromiumLauncher, Cli, CliRunner, Config};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    setup_logging(args.verbose)?;

    info!("Starting screenshot-archiver v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_config(&args).await {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {:#}", e);
            std::process::exit(2);
        }
    };

    let launcher = Arc::new(ChromiumLauncher::new(config.clone()));
    let cli_runner = CliRunner::new(config, launcher);

    if let Err(e) = cli_runner.run(args.command).await {
        error!("Application error: {:#}", e);
        // Request-level rejections exit with 2
        let code = match e.downcast_ref::<CaptureError>() {
            Some(err) if err.is_request_fatal() => 2,
            _ => 1,
        };
        std::process::exit(code);
    }

    Ok(())
}

async fn load_config(args: &Cli) -> anyhow::Result<Config> {
    let mut config = if let Some(config_path) = &args.config {
        let config_content = tokio::fs::read_to_string(config_path).await?;
        serde_json::from_str(&config_content)?
    } else {
        Config::default()
    };

    if let Some(timeout) = args.timeout {
        config.navigation_timeout = Duration::from_secs(timeout);
    }

    if let Some(chrome_path) = &args.chrome_path {
        config.chrome_path = Some(chrome_path.clone());
    }

    config.validate()?;

    info!("Configuration loaded successfully");
    info!("Viewport: {}x{}", config.viewport.width, config.viewport.height);
    info!("Navigation timeout: {:?}", config.navigation_timeout);

    Ok(config)
}
