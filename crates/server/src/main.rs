//! photobridge
//!
//! Session engine for multi-file photo uploads. Speaks newline-delimited
//! JSON envelopes on stdin/stdout; logs never touch stdout.

mod config;
mod dispatch;
mod engine;
mod logging;
mod orchestrator;
mod output;
mod paths;
mod session;
mod state;
#[cfg(test)]
mod testing;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::BufReader;
use tracing::{error, info};

use photobridge_connectors::{CommandUploader, ExifTool, MetadataTool};

use crate::engine::{Services, Settings};

#[derive(Debug, Parser)]
#[command(name = "photobridge", version, about = "Photo upload session engine over stdio")]
struct Cli {
    /// Data directory (config, logs). Defaults to ~/.photobridge
    #[arg(long, env = "PHOTOBRIDGE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Config file. Defaults to <data-dir>/config.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write logs to stderr instead of <data-dir>/logs/engine.log
    #[arg(long)]
    log_stderr: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let data_dir =
        paths::resolve_data_dir(cli.data_dir.as_deref()).context("resolve data directory")?;
    paths::ensure_dirs(&data_dir).with_context(|| format!("create {}", data_dir.display()))?;
    let _logging = logging::init_logging(&paths::log_dir(&data_dir), cli.log_stderr)?;

    let config_path = cli.config.unwrap_or_else(|| paths::config_path(&data_dir));
    let config = match config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            error!(
                component = "main",
                event = "config.load_failed",
                error = %e,
                "Failed to load config"
            );
            return Err(e.into());
        }
    };

    let exiftool = ExifTool::discover(config.exiftool.as_deref(), config.tool_timeout());
    info!(
        component = "main",
        event = "engine.starting",
        data_dir = %data_dir.display(),
        config = %config_path.display(),
        exiftool_available = exiftool.is_available(),
        backends = config.backends.len(),
        "Starting photobridge"
    );

    let services = Services {
        metadata: Arc::new(exiftool),
        uploader: Arc::new(CommandUploader::new(config.backends.clone())),
    };
    let settings = Settings {
        max_line_bytes: config.max_line_bytes,
        session_ttl: config.session_ttl(),
    };

    engine::run(BufReader::new(tokio::io::stdin()), tokio::io::stdout(), services, settings).await
}
