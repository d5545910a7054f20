//! Operator limits for one flush pass.

use crate::StopReason;
use std::time::Duration;

/// Caps on a single flush pass. Both are "at most" bounds.
///
/// Zero means no limit, which is what the CLI passes when an option is
/// omitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Limits {
    max_messages: Option<u64>,
    max_duration: Option<Duration>,
}

impl Limits {
    pub fn new(max_messages: Option<u64>, max_duration: Option<Duration>) -> Self {
        Self {
            max_messages: max_messages.filter(|&n| n > 0),
            max_duration: max_duration.filter(|d| !d.is_zero()),
        }
    }

    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn with_max_messages(self, max_messages: u64) -> Self {
        Self::new(Some(max_messages), self.max_duration)
    }

    pub fn with_max_duration(self, max_duration: Duration) -> Self {
        Self::new(self.max_messages, Some(max_duration))
    }

    pub fn max_messages(&self) -> Option<u64> {
        self.max_messages
    }

    pub fn max_duration(&self) -> Option<Duration> {
        self.max_duration
    }

    pub fn is_unlimited(&self) -> bool {
        self.max_messages.is_none() && self.max_duration.is_none()
    }

    /// Whether the pass must stop before claiming another message.
    ///
    /// Checked between messages only; an in-progress delivery is never cut.
    pub fn check(&self, sent: u64, elapsed: Duration) -> Option<StopReason> {
        if self.max_messages.is_some_and(|max| sent >= max) {
            return Some(StopReason::MessageLimit);
        }
        if self.max_duration.is_some_and(|max| elapsed >= max) {
            return Some(StopReason::TimeLimit);
        }
        None
    }
}
