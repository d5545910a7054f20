//! Configuration management.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default age after which an in-flight message is considered stuck.
pub const DEFAULT_RECOVER_TIMEOUT_SECS: u64 = 900;

/// Default lifetime of the flush lease before another flusher may take it.
pub const DEFAULT_LEASE_TTL_SECS: u64 = 300;

/// Default number of delivery attempts before a message stops being retried.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default relay request timeout.
pub const DEFAULT_RELAY_TIMEOUT_SECS: u64 = 30;

/// Main configuration, stored as JSON in `config.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Whether mail goes through the spool or straight to the transport.
    #[serde(default)]
    pub mailer: MailerMode,
    /// Spool store settings.
    #[serde(default)]
    pub spool: SpoolSettings,
    /// The real transport used for delivery.
    #[serde(default)]
    pub transport: TransportSettings,
}

/// How the mailer hands off messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailerMode {
    /// Messages are queued in the spool and delivered by `mailspool send`.
    #[default]
    Spool,
    /// Messages are delivered immediately; there is nothing to flush.
    Direct,
}

/// Spool store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpoolSettings {
    /// SQLite file; defaults to `<base_dir>/spool.sqlite`.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    /// Recovery threshold used when `--recover-timeout` is not given.
    #[serde(default = "default_recover_timeout_secs")]
    pub default_recover_timeout_secs: u64,
    /// Flush lease lifetime.
    #[serde(default = "default_lease_ttl_secs")]
    pub lease_ttl_secs: u64,
    /// Attempts after which a failed message is no longer retried.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Keep delivered messages (status `sent`) instead of deleting them.
    #[serde(default)]
    pub keep_sent: bool,
}

impl Default for SpoolSettings {
    fn default() -> Self {
        Self {
            database_path: None,
            default_recover_timeout_secs: DEFAULT_RECOVER_TIMEOUT_SECS,
            lease_ttl_secs: DEFAULT_LEASE_TTL_SECS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            keep_sent: false,
        }
    }
}

/// Real transport selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TransportSettings {
    /// POST messages to an HTTP relay.
    Relay {
        relay_url: String,
        #[serde(default)]
        auth_token: Option<String>,
        #[serde(default = "default_relay_timeout_secs")]
        timeout_secs: u64,
    },
    /// Write one `.eml` file per message into a directory.
    Maildrop {
        #[serde(default)]
        directory: Option<PathBuf>,
    },
    /// Accept and discard.
    Null,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self::Maildrop { directory: None }
    }
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_recover_timeout_secs() -> u64 {
    DEFAULT_RECOVER_TIMEOUT_SECS
}

fn default_lease_ttl_secs() -> u64 {
    DEFAULT_LEASE_TTL_SECS
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_relay_timeout_secs() -> u64 {
    DEFAULT_RELAY_TIMEOUT_SECS
}

impl Config {
    /// Create a new Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self {
            log_level: default_log_level(),
            ..Default::default()
        };
        config.load_from_env();
        config
    }

    /// Load `config.json` from the base directory, falling back to defaults
    /// when the file does not exist. Environment overrides are applied last.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        Self::load_with_override(paths, None)
    }

    /// Like [`Config::load`], but an explicit `config_path` replaces
    /// `config.json` and must exist.
    pub fn load_with_override(paths: &Paths, config_path: Option<&Path>) -> CoreResult<Self> {
        let config_path = match config_path {
            Some(path) if !path.exists() => {
                return Err(CoreError::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            Some(path) => path.to_path_buf(),
            None => paths.config_file(),
        };

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self {
                log_level: default_log_level(),
                ..Default::default()
            }
        };

        config.load_from_env();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to `config.json`.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Override configuration from environment variables.
    fn load_from_env(&mut self) {
        if let Ok(log_level) = std::env::var("MAILSPOOL_LOG_LEVEL") {
            self.log_level = log_level;
        }
        if let Ok(token) = std::env::var("MAILSPOOL_RELAY_TOKEN") {
            if let TransportSettings::Relay { auth_token, .. } = &mut self.transport {
                *auth_token = Some(token);
            }
        }
    }

    /// Reject values the spool cannot work with.
    pub fn validate(&self) -> CoreResult<()> {
        if self.spool.lease_ttl_secs == 0 {
            return Err(CoreError::Config(
                "spool.lease_ttl_secs must be greater than zero".to_string(),
            ));
        }
        if self.spool.max_attempts == 0 {
            return Err(CoreError::Config(
                "spool.max_attempts must be at least 1".to_string(),
            ));
        }
        if let TransportSettings::Relay { relay_url, .. } = &self.transport {
            let url = Url::parse(relay_url)?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(CoreError::Config(format!(
                    "relay_url must be http(s), got {}",
                    url.scheme()
                )));
            }
        }
        Ok(())
    }

    /// Spool database location, resolved against the base directory.
    pub fn spool_database_path(&self, paths: &Paths) -> PathBuf {
        self.spool
            .database_path
            .clone()
            .unwrap_or_else(|| paths.spool_database_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::new();
        assert_eq!(config.mailer, MailerMode::Spool);
        assert_eq!(
            config.spool.default_recover_timeout_secs,
            DEFAULT_RECOVER_TIMEOUT_SECS
        );
        assert_eq!(config.spool.lease_ttl_secs, DEFAULT_LEASE_TTL_SECS);
        assert_eq!(config.spool.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert!(!config.spool.keep_sent);
        assert_eq!(config.transport, TransportSettings::Maildrop { directory: None });
    }

    #[test]
    fn test_config_load_from_file() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");

        let config_json = r#"{
            "log_level": "debug",
            "mailer": "direct",
            "spool": { "max_attempts": 3, "keep_sent": true },
            "transport": { "kind": "relay", "relay_url": "https://relay.example.com" }
        }"#;
        std::fs::write(&config_path, config_json).unwrap();

        let config = Config::load_from_file(&config_path).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.mailer, MailerMode::Direct);
        assert_eq!(config.spool.max_attempts, 3);
        assert!(config.spool.keep_sent);
        assert_eq!(config.spool.lease_ttl_secs, DEFAULT_LEASE_TTL_SECS);
        assert_eq!(
            config.transport,
            TransportSettings::Relay {
                relay_url: "https://relay.example.com".to_string(),
                auth_token: None,
                timeout_secs: DEFAULT_RELAY_TIMEOUT_SECS,
            }
        );
    }

    #[test]
    fn test_config_null_transport() {
        let config: Config = serde_json::from_str(r#"{"transport": {"kind": "null"}}"#).unwrap();
        assert_eq!(config.transport, TransportSettings::Null);
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
    }

    #[test]
    fn test_config_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let mut config = Config::new();
        config.log_level = "trace".to_string();
        config.spool.lease_ttl_secs = 42;
        config.save(&paths).unwrap();

        let loaded = Config::load(&paths).unwrap();
        assert_eq!(loaded.spool.lease_ttl_secs, 42);
    }

    #[test]
    fn test_config_load_nonexistent_uses_defaults() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let config = Config::load(&paths).unwrap();
        assert_eq!(config.mailer, MailerMode::Spool);
        assert_eq!(
            config.spool_database_path(&paths),
            dir.path().join("spool.sqlite")
        );
    }

    #[test]
    fn test_config_explicit_path() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().join("base"));
        let custom = dir.path().join("custom.json");
        std::fs::write(&custom, r#"{"transport": {"kind": "null"}}"#).unwrap();

        let config = Config::load_with_override(&paths, Some(&custom)).unwrap();
        assert_eq!(config.transport, TransportSettings::Null);

        let missing = dir.path().join("missing.json");
        assert!(matches!(
            Config::load_with_override(&paths, Some(&missing)),
            Err(CoreError::Config(_))
        ));
    }

    #[test]
    fn test_config_rejects_zero_lease_ttl() {
        let mut config = Config::new();
        config.spool.lease_ttl_secs = 0;
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));
    }

    #[test]
    fn test_config_rejects_zero_max_attempts() {
        let mut config = Config::new();
        config.spool.max_attempts = 0;
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));
    }

    #[test]
    fn test_config_rejects_invalid_relay_url() {
        let mut config = Config::new();
        config.transport = TransportSettings::Relay {
            relay_url: "not a valid url".to_string(),
            auth_token: None,
            timeout_secs: 5,
        };
        assert!(matches!(config.validate(), Err(CoreError::InvalidUrl(_))));

        config.transport = TransportSettings::Relay {
            relay_url: "ftp://relay.example.com".to_string(),
            auth_token: None,
            timeout_secs: 5,
        };
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));
    }

    #[test]
    fn test_explicit_database_path_wins() {
        let paths = Paths::with_base_dir(PathBuf::from("/base"));
        let mut config = Config::new();
        config.spool.database_path = Some(PathBuf::from("/var/spool/mail.sqlite"));
        assert_eq!(
            config.spool_database_path(&paths),
            PathBuf::from("/var/spool/mail.sqlite")
        );
    }
}
