//! Tracing configuration and log routing.
//!
//! Every event goes to stdout through a compact formatter and is mirrored to a log file through
//! a non-blocking writer. The file is `DOCLENS_LOG_FILE` when set, `logs/doclens.log` otherwise.
//! `RUST_LOG` controls filtering; without it the server logs at `info` and the HTTP trace layer
//! at `debug` for request spans.
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const DEFAULT_FILTER: &str = "info,tower_http=debug";
const DEFAULT_LOG_FILE: &str = "logs/doclens.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the global subscriber. Safe to call once per process.
pub fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let stdout_layer = fmt::layer().with_target(false).compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer);

    let path = log_file_path(std::env::var("DOCLENS_LOG_FILE").ok());
    match file_writer(&path) {
        Ok(writer) => {
            let file_layer = fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(false)
                .compact();
            registry.with(file_layer).init();
        }
        Err(err) => {
            registry.init();
            tracing::warn!(path = %path.display(), error = %err, "File logging disabled");
        }
    }
}

/// Resolve the log file from an optional override; blank overrides are ignored.
fn log_file_path(configured: Option<String>) -> PathBuf {
    configured
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE))
}

/// Append-mode non-blocking writer for `path`, creating parent directories as needed.
fn file_writer(path: &Path) -> std::io::Result<NonBlocking> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file);
    let _ = LOG_GUARD.set(guard);
    Ok(non_blocking)
}
