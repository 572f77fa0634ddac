//! # Endurance GCU
//!
//! Headless ground-control runner for the engine test stand.
//!
//! Opens the controller link, records telemetry until Ctrl+C or link loss,
//! then exports the data log. The GUI attaches to the same
//! [`endurance_gcu::session::ProtocolCore`] in-process; this binary is the
//! minimal host for it.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::time::{interval, Duration};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use endurance_gcu::config::Config;
use endurance_gcu::session::ProtocolCore;

/// Seconds between telemetry summary log lines
const STATUS_INTERVAL_SECS: u64 = 5;

/// Default configuration file, used when present and no path is given
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Main entry point for the ground-control runner
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration (first argument, else `config/default.toml`, else defaults)
///    - Set up logging with tracing subscriber
///    - Open the controller link; refuse to start without one
///
/// 2. **Main Loop**
///    - Link reader decodes telemetry in the background
///    - Log a telemetry summary every 5 seconds
///    - Stop on Ctrl+C, or as soon as the link is lost
///
/// 3. **Shutdown**
///    - Wait for the reader to release the link
///    - Export the data log to `export_dir`
///
/// # Errors
///
/// Returns error if:
/// - The configuration is invalid
/// - The serial port cannot be opened
/// - The link was lost mid-session (after exporting what was recorded)
#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;
    let _log_guard = init_logging(&config);

    info!("Endurance GCU v{} starting...", env!("CARGO_PKG_VERSION"));

    let core = ProtocolCore::connect(&config).context("cannot start without a controller link")?;
    core.start();
    info!("Recording telemetry; press Ctrl+C to stop");

    let mut status_interval = interval(Duration::from_secs(STATUS_INTERVAL_SECS));

    let outcome = loop {
        tokio::select! {
            _ = status_interval.tick() => {
                info!(
                    "{} | rows={} dropped={}",
                    core.current_snapshot(),
                    core.log_len(),
                    core.decode_failures()
                );
            }

            // Link lost on either the read or the write side
            _ = core.link_stopped() => {
                warn!("Link reader stopped: {:?}", core.link_status().lost);
                break core.wait().await;
            }

            // Handle Ctrl+C for graceful shutdown
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break core.shutdown().await;
            }
        }
    };

    if let Err(e) = export_session(&core, &config) {
        warn!("Failed to export data log: {:#}", e);
    }

    if let Err(e) = outcome {
        error!("Session ended abnormally: {}", e);
        return Err(e.into());
    }

    info!("Session complete: {} rows recorded", core.log_len());
    Ok(())
}

fn load_config() -> Result<Config> {
    match std::env::args().nth(1) {
        Some(path) => Config::load(&path).with_context(|| format!("loading {}", path)),
        None if std::path::Path::new(DEFAULT_CONFIG_PATH).exists() => {
            Config::load(DEFAULT_CONFIG_PATH).with_context(|| format!("loading {}", DEFAULT_CONFIG_PATH))
        }
        None => Ok(Config::default()),
    }
}

/// Console logging, plus a daily rolling file when configured
fn init_logging(config: &Config) -> Option<WorkerGuard> {
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let (file_layer, guard) = match &config.logging.file_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "endurance-gcu.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    guard
}

/// Export the log under a timestamped name in `export_dir`
fn export_session(core: &ProtocolCore, config: &Config) -> Result<PathBuf> {
    let dir = PathBuf::from(&config.log.export_dir);
    std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

    let stamp = chrono::Utc::now()
        .with_timezone(&config.utc_offset())
        .format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("engine_test_{}.{}", stamp, config.log.format.extension()));

    core.export_log(&path, config.log.format, &config.export_columns())?;
    Ok(path)
}
