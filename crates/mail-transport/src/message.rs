//! The unit handed to a transport.

use crate::{TransportError, TransportResult};
use serde::{Deserialize, Serialize};

/// An outbound message: an envelope plus an opaque RFC 5322 body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub id: String,
    pub sender: String,
    pub recipients: Vec<String>,
    /// Display-only; the body carries the real header.
    pub subject: Option<String>,
    #[serde(skip)]
    pub body: Vec<u8>,
}

impl OutgoingMessage {
    /// Create a message with a fresh ID.
    pub fn new(sender: impl Into<String>, recipients: Vec<String>, body: Vec<u8>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            sender: sender.into(),
            recipients,
            subject: None,
            body,
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Check the envelope before it reaches a transport.
    ///
    /// Envelope addresses end up in header lines, so control characters
    /// (CR/LF in particular) are refused.
    pub fn validate(&self) -> TransportResult<()> {
        if self.sender.trim().is_empty() {
            return Err(TransportError::InvalidMessage("empty sender".to_string()));
        }
        if has_control(&self.sender) {
            return Err(TransportError::InvalidMessage(format!(
                "control character in sender: {:?}",
                self.sender
            )));
        }
        if self.recipients.is_empty() {
            return Err(TransportError::InvalidMessage("no recipients".to_string()));
        }
        if let Some(bad) = self
            .recipients
            .iter()
            .find(|r| !r.contains('@') || has_control(r))
        {
            return Err(TransportError::InvalidMessage(format!(
                "invalid recipient address: {bad:?}"
            )));
        }
        if self.id.is_empty() || self.id.contains(['/', '\\']) || self.id.starts_with('.') {
            return Err(TransportError::InvalidMessage(format!(
                "invalid message id: {}",
                self.id
            )));
        }
        Ok(())
    }
}

fn has_control(address: &str) -> bool {
    address.chars().any(|c| c.is_control())
}
