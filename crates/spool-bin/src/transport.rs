//! Transport selected by configuration.

use async_trait::async_trait;
use mail_transport::{
    MaildropTransport, NullTransport, OutgoingMessage, RelayConfig, RelayTransport, Transport,
    TransportResult,
};
use spool_config_and_utils::{Paths, TransportSettings};

/// One of the built-in transports, chosen at startup.
pub enum AnyTransport {
    Relay(RelayTransport),
    Maildrop(MaildropTransport),
    Null(NullTransport),
}

impl AnyTransport {
    pub fn from_settings(settings: &TransportSettings, paths: &Paths) -> TransportResult<Self> {
        Ok(match settings {
            TransportSettings::Relay {
                relay_url,
                auth_token,
                timeout_secs,
            } => Self::Relay(RelayTransport::new(RelayConfig {
                relay_url: relay_url.clone(),
                auth_token: auth_token.clone(),
                timeout_secs: *timeout_secs,
            })?),
            TransportSettings::Maildrop { directory } => Self::Maildrop(MaildropTransport::new(
                directory.clone().unwrap_or_else(|| paths.maildrop_dir()),
            )),
            TransportSettings::Null => Self::Null(NullTransport),
        })
    }
}

#[async_trait]
impl Transport for AnyTransport {
    fn name(&self) -> &str {
        match self {
            Self::Relay(t) => t.name(),
            Self::Maildrop(t) => t.name(),
            Self::Null(t) => t.name(),
        }
    }

    async fn deliver(&self, message: &OutgoingMessage) -> TransportResult<()> {
        match self {
            Self::Relay(t) => t.deliver(message).await,
            Self::Maildrop(t) => t.deliver(message).await,
            Self::Null(t) => t.deliver(message).await,
        }
    }
}
