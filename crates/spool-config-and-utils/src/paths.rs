//! File system paths.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

/// Name of the runtime directory under the user's home.
const BASE_DIR_NAME: &str = ".mailspool";

/// Manages file system paths for mailspool.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory for config, spool database and logs (~/.mailspool)
    base_dir: PathBuf,
}

impl Paths {
    /// Create a new Paths instance rooted at `~/.mailspool`.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("Could not determine home directory".to_string()))?;

        Ok(Self {
            base_dir: home.join(BASE_DIR_NAME),
        })
    }

    /// Create a new Paths instance with a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory (~/.mailspool).
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the config file path (~/.mailspool/config.json).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Get the default spool database path (~/.mailspool/spool.sqlite).
    pub fn spool_database_file(&self) -> PathBuf {
        self.base_dir.join("spool.sqlite")
    }

    /// Get the default maildrop directory (~/.mailspool/maildrop).
    pub fn maildrop_dir(&self) -> PathBuf {
        self.base_dir.join("maildrop")
    }

    /// Get the logs directory (~/.mailspool/logs).
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// Get the JSONL log file path (~/.mailspool/logs/mailspool.jsonl).
    pub fn log_file(&self) -> PathBuf {
        self.logs_dir().join("mailspool.jsonl")
    }

    /// Ensure all required directories exist.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}
