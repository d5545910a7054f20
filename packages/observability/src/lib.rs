//! # Observability
//!
//! Logging setup shared by every mailspool binary.
//!
//! Services call [`init_with_config`] once at startup and use the standard
//! `tracing` macros everywhere else. Two sinks are available:
//!
//! - a compact, human-oriented stderr layer (on by default)
//! - an append-only JSONL file, one object per event, when
//!   [`LogConfig::log_path`] is set
//!
//! The JSONL file can be tailed while a flush is running:
//!
//! ```text
//! tail -f ~/.mailspool/logs/mailspool.jsonl | jq
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! observability::init_with_config(observability::LogConfig {
//!     service_name: "mailspool".into(),
//!     default_level: "debug".into(),
//!     ..Default::default()
//! });
//! ```

mod file;
mod json_layer;

use std::io;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub use file::CentralLogWriter;
pub use json_layer::LogEntry;

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service (e.g., "mailspool").
    /// Included in every JSONL line for filtering.
    pub service_name: String,

    /// Default log level filter (e.g., "debug", "info", "warn").
    /// Can be overridden by `RUST_LOG` environment variable.
    pub default_level: String,

    /// Optional JSONL log file. No file is written when unset.
    pub log_path: Option<PathBuf>,

    /// Emit compact logs to stderr.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: true,
        }
    }
}

/// Initialize logging with a custom configuration.
///
/// Safe to call more than once; only the first call installs a subscriber.
pub fn init_with_config(config: LogConfig) {
    let env_filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.default_level))
    };

    // A log file that cannot be opened should not stop the service; fall
    // back to stderr only and say so once the subscriber is up.
    let mut file_error = None;
    let json_layer = config.log_path.as_ref().and_then(|path| {
        match CentralLogWriter::new(path) {
            Ok(writer) => {
                let make_writer = file::WriterFactory::new(writer);
                Some(
                    json_layer::JsonLayer::new(config.service_name.clone(), make_writer)
                        .with_filter(env_filter()),
                )
            }
            Err(e) => {
                file_error = Some((path.clone(), e));
                None
            }
        }
    });

    let stderr_layer = if config.also_stderr {
        Some(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_file(false)
                .with_line_number(false)
                .compact()
                .with_writer(io::stderr)
                .with_filter(env_filter()),
        )
    } else {
        None
    };

    let installed = tracing_subscriber::registry()
        .with(json_layer)
        .with(stderr_layer)
        .try_init()
        .is_ok();

    if !installed {
        return;
    }

    match (&config.log_path, file_error) {
        (_, Some((path, e))) => {
            tracing::warn!(log_path = %path.display(), error = %e, "JSONL log file unavailable");
        }
        (Some(path), None) => {
            tracing::debug!(log_path = %path.display(), "observability initialized");
        }
        (None, None) => {}
    }
}
