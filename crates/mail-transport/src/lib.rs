//! Real mail transports.
//!
//! A [`Transport`] takes one [`OutgoingMessage`] and either delivers it or
//! reports a [`TransportError`]. The spool flusher decides what a failure
//! means for the message; transports never retry on their own.

mod error;
mod maildrop;
mod message;
mod null;
mod relay;

use async_trait::async_trait;
use std::sync::Arc;

pub use error::{TransportError, TransportResult};
pub use maildrop::MaildropTransport;
pub use message::OutgoingMessage;
pub use null::NullTransport;
pub use relay::{RelayConfig, RelayTransport};

/// Something that can deliver a message right now.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Deliver one message.
    async fn deliver(&self, message: &OutgoingMessage) -> TransportResult<()>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn deliver(&self, message: &OutgoingMessage) -> TransportResult<()> {
        (**self).deliver(message).await
    }
}
