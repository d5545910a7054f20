//! The mailer handed to mail-producing code.

use crate::{Spool, SpoolResult};
use mail_transport::{OutgoingMessage, Transport};
use tracing::debug;

/// Where a sent message ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendReceipt {
    /// Stored for a later flush.
    Spooled(String),
    /// Handed to the real transport immediately.
    Delivered(String),
}

impl SendReceipt {
    pub fn message_id(&self) -> &str {
        match self {
            Self::Spooled(id) | Self::Delivered(id) => id,
        }
    }
}

/// Mail front door.
///
/// In `Spooled` mode messages are queued and `transport` is the real
/// transport the flusher delivers through. In `Direct` mode there is no
/// spool and nothing to flush.
pub enum Mailer<S, T> {
    Spooled { spool: S, transport: T },
    Direct { transport: T },
}

impl<S: Spool, T: Transport> Mailer<S, T> {
    pub fn spooled(spool: S, transport: T) -> Self {
        Self::Spooled { spool, transport }
    }

    pub fn direct(transport: T) -> Self {
        Self::Direct { transport }
    }

    pub fn is_spooled(&self) -> bool {
        matches!(self, Self::Spooled { .. })
    }

    pub fn spool(&self) -> Option<&S> {
        match self {
            Self::Spooled { spool, .. } => Some(spool),
            Self::Direct { .. } => None,
        }
    }

    /// The real transport.
    pub fn transport(&self) -> &T {
        match self {
            Self::Spooled { transport, .. } | Self::Direct { transport } => transport,
        }
    }

    pub async fn send(&self, message: OutgoingMessage) -> SpoolResult<SendReceipt> {
        match self {
            Self::Spooled { spool, .. } => {
                let id = spool.enqueue(message).await?;
                Ok(SendReceipt::Spooled(id))
            }
            Self::Direct { transport } => {
                message.validate()?;
                transport.deliver(&message).await?;
                debug!(
                    message_id = %message.id,
                    transport = transport.name(),
                    "Message sent directly"
                );
                Ok(SendReceipt::Delivered(message.id))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemorySpool;
    use crate::SpoolError;
    use mail_transport::NullTransport;

    fn message() -> OutgoingMessage {
        OutgoingMessage::new(
            "noreply@example.com",
            vec!["alice@example.com".to_string()],
            b"hi".to_vec(),
        )
    }

    #[tokio::test]
    async fn spooled_send_enqueues() {
        let mailer = Mailer::spooled(MemorySpool::default(), NullTransport);
        let message = message();
        let id = message.id.clone();

        let receipt = mailer.send(message).await.unwrap();
        assert_eq!(receipt, SendReceipt::Spooled(id));
        assert!(mailer.is_spooled());
        assert_eq!(mailer.spool().unwrap().len().await, 1);
    }

    #[tokio::test]
    async fn direct_send_delivers() {
        let mailer: Mailer<MemorySpool, _> = Mailer::direct(NullTransport);
        let receipt = mailer.send(message()).await.unwrap();
        assert!(matches!(receipt, SendReceipt::Delivered(_)));
        assert!(!mailer.is_spooled());
        assert!(mailer.spool().is_none());
        assert_eq!(mailer.transport().name(), "null");
    }

    #[tokio::test]
    async fn direct_send_surfaces_transport_errors() {
        let mailer: Mailer<MemorySpool, _> = Mailer::direct(NullTransport);
        let err = mailer
            .send(OutgoingMessage::new("a@example.com", vec![], Vec::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, SpoolError::Transport(_)));
    }
}
