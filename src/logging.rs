//! Tracing subscriber setup.
//!
//! The terminal belongs to the game, so all output goes to a log file.
//! `RUST_LOG` overrides the default `info` filter.

use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "info";

/// Build a subscriber writing plain text to `log_file`.
pub fn build_subscriber(log_file: File) -> impl tracing::Subscriber + Send + Sync {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let fmt_layer = fmt::layer()
        .with_ansi(false)
        .with_writer(Arc::new(log_file));

    tracing_subscriber::registry().with(fmt_layer).with(env_filter)
}

/// Install the global subscriber, appending to `log_file_path`.
///
/// Returns false if the file cannot be opened or a subscriber is already
/// installed; the game then runs without logs.
pub fn init_global(log_file_path: &Path) -> bool {
    if let Some(parent) = log_file_path.parent() {
        if fs::create_dir_all(parent).is_err() {
            return false;
        }
    }

    let Ok(log_file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)
    else {
        return false;
    };

    build_subscriber(log_file).try_init().is_ok()
}
