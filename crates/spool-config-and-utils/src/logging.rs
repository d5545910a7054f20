//! Logging initialization for mailspool.
//!
//! Thin wrapper over the observability crate. Human-readable lines go to
//! stderr; when a log path is given, structured JSONL is appended there too.

use std::path::PathBuf;

/// Initialize the logging system.
///
/// `RUST_LOG` overrides `level` when set.
///
/// ```ignore
/// init_logging("info", Some(paths.log_file()));
/// tracing::info!("flush started");
/// ```
pub fn init_logging(level: &str, log_path: Option<PathBuf>) {
    observability::init_with_config(observability::LogConfig {
        service_name: "mailspool".into(),
        default_level: level.into(),
        log_path,
        also_stderr: true,
    });
}

/// Parse a log level string into a tracing Level.
pub fn parse_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}
