//! Structured logging setup shared by the assistant and the image worker.
//!
//! stdout carries IPC events, so console output goes to stderr.

use std::fs;
use std::path::Path;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the structured logging system.
///
/// - File output: `{log_dir}/{prefix}.YYYY-MM-DD.log`, daily rotation,
///   latest 5 files kept.
/// - Console output (stderr): compact, human-readable.
/// - Environment filter: `RUST_LOG`, defaulting to info with noisy HTTP
///   internals turned down.
///
/// Falls back to console-only logging when the log directory is unusable.
pub fn try_init(log_dir: &Path, prefix: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,reqwest=warn,hyper=warn,mio=warn,cpal=warn"));

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact();

    let file_appender = fs::create_dir_all(log_dir)
        .map_err(anyhow::Error::from)
        .and_then(|_| {
            RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(prefix)
                .filename_suffix("log")
                .max_log_files(5)
                .build(log_dir)
                .map_err(anyhow::Error::from)
        });

    let (file_layer, file_error) = match file_appender {
        Ok(appender) => {
            let layer = fmt::layer()
                .with_writer(appender)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true);
            (Some(layer), None)
        }
        Err(e) => (None, Some(e)),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()?;

    match file_error {
        None => tracing::info!(log_dir = %log_dir.display(), "Logger initialized"),
        Some(e) => tracing::warn!("File logging disabled: {}", e),
    }

    Ok(())
}
