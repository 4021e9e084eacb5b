//! Main application entry point for the Google Photos viewer.

mod config;

use std::path::PathBuf;

use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

use crate::config::{default_config_path, AppConfig, AppConfigOverrides};

const LOG_FILE_NAME: &str = "gphotos-viewer.log";

#[derive(Parser)]
#[command(
    name = "gphotos-viewer",
    author,
    version,
    about = "Browse the app-created media items and albums of a Google Photos library"
)]
struct Cli {
    /// Path to config file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override log level (e.g. info, debug)
    #[arg(long)]
    log_level: Option<String>,
    /// OAuth client secrets JSON from the Google Cloud console
    #[arg(long)]
    client_secrets: Option<PathBuf>,
    /// Port for the OAuth redirect listener (0 picks a free one)
    #[arg(long)]
    redirect_port: Option<u16>,
    /// Write the effective settings, flags included, to the config file and exit
    #[arg(long)]
    save_config: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let overrides = AppConfigOverrides {
        log_level: cli.log_level.clone(),
        client_secrets_path: cli.client_secrets.clone(),
        oauth_redirect_port: cli.redirect_port,
    };
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let cfg = AppConfig::load_from(Some(config_path.clone())).apply_overrides(&overrides);
    if cli.save_config {
        cfg.save_to(Some(config_path.clone()))?;
        println!("Saved settings to {}", config_path.display());
        return Ok(());
    }
    std::fs::create_dir_all(&cfg.data_dir)?;
    let _guard = init_tracing(&cfg);

    tracing::info!("Starting Google Photos viewer");
    tracing::debug!("Data directory: {}", cfg.data_dir.display());
    if cfg.client_secrets_path.is_none() {
        tracing::info!("No client secrets configured; they will be requested on authentication");
    }

    let flags = ui::ViewerFlags {
        client_secrets: cfg.client_secrets_path.clone(),
        token_path: cfg.token_path(),
        redirect_port: cfg.oauth_redirect_port,
        api: cfg.api_config(),
    };
    ui::run(flags)?;
    tracing::info!("Viewer closed");
    Ok(())
}

/// Log to stdout and to a daily rotated file in the data directory.
fn init_tracing(cfg: &AppConfig) -> WorkerGuard {
    let file_appender = rolling::daily(cfg.log_dir(), LOG_FILE_NAME);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let filter = EnvFilter::try_new(&cfg.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    #[cfg(feature = "tokio-console")]
    {
        use tracing_subscriber::prelude::*;
        tracing_subscriber::registry()
            .with(console_subscriber::spawn())
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stdout.and(file_writer))
                    .with_filter(filter),
            )
            .init();
    }

    #[cfg(not(feature = "tokio-console"))]
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stdout.and(file_writer))
        .init();

    guard
}
