//! Wiring from configuration to mailer.

use crate::transport::AnyTransport;
use anyhow::{Context, Result};
use spool_config_and_utils::{Config, MailerMode, Paths};
use spool_outbox::{Mailer, SqliteSpool, SqliteSpoolConfig};
use std::time::Duration;
use tracing::debug;

pub type AppMailer = Mailer<SqliteSpool, AnyTransport>;

/// Loaded configuration and resolved paths.
pub struct App {
    pub config: Config,
    pub paths: Paths,
}

impl App {
    pub fn new(config: Config, paths: Paths) -> Self {
        Self { config, paths }
    }

    pub fn spool_config(&self) -> SqliteSpoolConfig {
        let spool = &self.config.spool;
        SqliteSpoolConfig {
            default_recover_timeout: Duration::from_secs(spool.default_recover_timeout_secs),
            lease_ttl: Duration::from_secs(spool.lease_ttl_secs),
            max_attempts: spool.max_attempts,
            keep_sent: spool.keep_sent,
        }
    }

    /// Open the spool database regardless of mailer mode.
    pub async fn open_spool(&self) -> Result<SqliteSpool> {
        let path = self.config.spool_database_path(&self.paths);
        debug!(path = %path.display(), "Opening spool");
        SqliteSpool::open(&path, self.spool_config())
            .await
            .with_context(|| format!("failed to open spool at {}", path.display()))
    }

    /// Build the configured mailer. Direct mode never touches the spool.
    pub async fn mailer(&self) -> Result<AppMailer> {
        let transport = AnyTransport::from_settings(&self.config.transport, &self.paths)
            .context("failed to set up transport")?;

        Ok(match self.config.mailer {
            MailerMode::Spool => Mailer::spooled(self.open_spool().await?, transport),
            MailerMode::Direct => Mailer::direct(transport),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spool_config_and_utils::TransportSettings;

    fn app(dir: &std::path::Path, mode: MailerMode) -> App {
        let mut config = Config::new();
        config.mailer = mode;
        config.transport = TransportSettings::Null;
        App::new(config, Paths::with_base_dir(dir.to_path_buf()))
    }

    #[test]
    fn spool_config_from_settings() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path(), MailerMode::Spool);
        app.config.spool.lease_ttl_secs = 60;
        app.config.spool.keep_sent = true;

        let spool = app.spool_config();
        assert_eq!(spool.lease_ttl, Duration::from_secs(60));
        assert!(spool.keep_sent);
    }

    #[tokio::test]
    async fn spool_mode_opens_database() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path(), MailerMode::Spool);

        let mailer = app.mailer().await.unwrap();
        assert!(mailer.is_spooled());
        assert!(dir.path().join("spool.sqlite").exists());
    }

    #[tokio::test]
    async fn direct_mode_skips_database() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path(), MailerMode::Direct);

        let mailer = app.mailer().await.unwrap();
        assert!(!mailer.is_spooled());
        assert!(!dir.path().join("spool.sqlite").exists());
    }
}
