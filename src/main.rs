//! upload-relay server binary.
//!
//! Startup order:
//! 1. Parse command-line arguments.
//! 2. Initialise tracing (`RUST_LOG`, default `upload_relay=info,tower_http=info`).
//! 3. Resolve configuration from the YAML file, `./.env` and `APP_` environment variables.
//! 4. Serve until SIGINT/SIGTERM.

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "upload_relay=info,tower_http=info";

/// File upload service with background processing and status polling
#[derive(Parser, Debug)]
#[command(name = "upload-relay", version, about)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, value_name = "PATH", default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> upload_relay::Result<()> {
    let cli = Cli::parse();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "upload-relay starting");

    let config = upload_relay::Config::load(&cli.config).map_err(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        e
    })?;
    tracing::info!(
        upload_directory = %config.application.upload_directory.display(),
        processing_steps = config.application.processing_steps,
        mode = ?config.application.external_service_mode,
        "Configuration loaded"
    );

    upload_relay::serve(config).await
}
