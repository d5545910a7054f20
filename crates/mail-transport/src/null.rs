//! Transport that accepts everything and delivers nothing.

use crate::{OutgoingMessage, Transport, TransportResult};
use async_trait::async_trait;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default)]
pub struct NullTransport;

#[async_trait]
impl Transport for NullTransport {
    fn name(&self) -> &str {
        "null"
    }

    async fn deliver(&self, message: &OutgoingMessage) -> TransportResult<()> {
        message.validate()?;
        debug!(message_id = %message.id, "Discarding message");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn accepts_valid_messages() {
        let message = OutgoingMessage::new(
            "a@example.com",
            vec!["b@example.com".to_string()],
            b"x".to_vec(),
        );
        assert!(NullTransport.deliver(&message).await.is_ok());

        let shared: Arc<dyn Transport> = Arc::new(NullTransport);
        assert_eq!(shared.name(), "null");
        assert!(shared.deliver(&message).await.is_ok());
    }

    #[tokio::test]
    async fn still_validates() {
        let message = OutgoingMessage::new("a@example.com", vec![], b"x".to_vec());
        let err = NullTransport.deliver(&message).await.unwrap_err();
        assert!(err.is_permanent());
    }
}
