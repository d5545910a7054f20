//! Database models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message persisted in the spool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpooledMessage {
    pub id: String,
    pub sender: String,
    pub recipients: Vec<String>,
    pub subject: Option<String>,
    #[serde(skip)]
    pub body: Vec<u8>,
    pub status: MessageStatus,
    pub attempts: u32,
    /// Set when the transport rejected the message outright.
    pub permanent: bool,
    pub last_error: Option<String>,
    pub enqueued_at: DateTime<Utc>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
}

impl SpooledMessage {
    /// Whether a later flush pass may try this message again.
    pub fn is_retryable(&self, max_attempts: u32) -> bool {
        match self.status {
            MessageStatus::Pending => true,
            MessageStatus::Failed => !self.permanent && self.attempts < max_attempts,
            MessageStatus::InFlight | MessageStatus::Sent => false,
        }
    }
}

/// Delivery state of a spooled message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    InFlight,
    Sent,
    Failed,
}

impl Default for MessageStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InFlight => "in_flight",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "in_flight" => Self::InFlight,
            "sent" => Self::Sent,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

/// New message for insertion.
#[derive(Debug, Clone)]
pub struct NewSpooledMessage {
    pub id: String,
    pub sender: String,
    pub recipients: Vec<String>,
    pub subject: Option<String>,
    pub body: Vec<u8>,
    pub enqueued_at: DateTime<Utc>,
}

/// Message counts per state.
///
/// `failed` counts messages a later pass will retry; `dead` counts failed
/// messages that were rejected or ran out of attempts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpoolCounts {
    pub pending: u64,
    pub in_flight: u64,
    pub sent: u64,
    pub failed: u64,
    pub dead: u64,
    pub oldest_pending_at: Option<DateTime<Utc>>,
}

impl SpoolCounts {
    pub fn total(&self) -> u64 {
        self.pending + self.in_flight + self.sent + self.failed + self.dead
    }
}

/// Which messages a purge removes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeFilter {
    /// Failed messages that will never be retried.
    pub dead: bool,
    /// Delivered messages retained because `keep_sent` is on.
    pub sent: bool,
    /// Only purge messages enqueued before this instant.
    pub enqueued_before: Option<DateTime<Utc>>,
}

/// Current holder of the flush lease.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushLease {
    pub holder: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Result of trying to take the flush lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaseStatus {
    Acquired,
    HeldBy(FlushLease),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(status: MessageStatus, attempts: u32, permanent: bool) -> SpooledMessage {
        SpooledMessage {
            id: "m1".to_string(),
            sender: "a@example.com".to_string(),
            recipients: vec!["b@example.com".to_string()],
            subject: None,
            body: Vec::new(),
            status,
            attempts,
            permanent,
            last_error: None,
            enqueued_at: Utc::now(),
            last_attempt_at: None,
            sent_at: None,
        }
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            MessageStatus::Pending,
            MessageStatus::InFlight,
            MessageStatus::Sent,
            MessageStatus::Failed,
        ] {
            assert_eq!(MessageStatus::from_str(status.as_str()), status);
        }
        assert_eq!(MessageStatus::from_str("garbage"), MessageStatus::Pending);
    }

    #[test]
    fn retryable_rules() {
        assert!(message(MessageStatus::Pending, 0, false).is_retryable(5));
        assert!(message(MessageStatus::Failed, 4, false).is_retryable(5));
        assert!(!message(MessageStatus::Failed, 5, false).is_retryable(5));
        assert!(!message(MessageStatus::Failed, 1, true).is_retryable(5));
        assert!(!message(MessageStatus::InFlight, 1, false).is_retryable(5));
        assert!(!message(MessageStatus::Sent, 1, false).is_retryable(5));
    }

    #[test]
    fn counts_total() {
        let counts = SpoolCounts {
            pending: 2,
            in_flight: 1,
            sent: 3,
            failed: 1,
            dead: 1,
            oldest_pending_at: None,
        };
        assert_eq!(counts.total(), 8);
    }
}
