//! Logging initialization and startup diagnostics
//!
//! The code base logs through the `log` facade; records are bridged into a
//! `tracing-subscriber` registry that writes to stderr and, optionally, to a file.

use anyhow::Result;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use crate::core::config::Settings;

/// Initialize logger for console and (optionally) file output
///
/// The filter comes from `RUST_LOG`, defaulting to `info`.
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - Log file could not be created or a logger is already installed
pub fn init_logger(log_file_path: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = match log_file_path {
        Some(path) => {
            let log_file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| anyhow::anyhow!("Failed to create log file {}: {}", path, e))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(log_file)).boxed())
        }
        None => None,
    };

    let subscriber = Registry::default()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer);

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;
    tracing_log::LogTracer::init().map_err(|e| anyhow::anyhow!("Failed to bridge log records: {}", e))?;

    Ok(())
}

/// Logs cookies configuration at application startup
///
/// Reports the global cookies file and the per-chat cookie directory, and
/// warns when age-restricted videos will not be downloadable.
pub fn log_cookies_configuration(settings: &Settings) {
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("🍪 Cookies Configuration Check");
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let global_ok = match settings.ytdl_cookies_file.as_deref() {
        Some(path) if path.exists() => {
            log::info!("✅ YTDL_COOKIES_FILE: {}", path.display());
            true
        }
        Some(path) => {
            log::error!("❌ YTDL_COOKIES_FILE: {} (FILE NOT FOUND!)", path.display());
            log::error!("   Current directory: {:?}", std::env::current_dir());
            false
        }
        None => {
            log::warn!("⚠️  YTDL_COOKIES_FILE: not set");
            false
        }
    };

    let default_in_dir = settings.cookies_dir.join("cookies.txt");
    log::info!("📁 Per-chat cookies directory: {}", settings.cookies_dir.display());
    if Path::new(&default_in_dir).exists() {
        log::info!("✅ Default cookies: {}", default_in_dir.display());
    }

    if global_ok || default_in_dir.exists() {
        log::info!("✅ Cookies configured - age-restricted downloads should work");
    } else {
        log::warn!("⚠️  No global cookies - age-restricted videos need /update_cookies per chat");
    }
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}
