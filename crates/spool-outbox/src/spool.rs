//! The spool capability trait and the values a flush produces.

use crate::{Limits, SpoolResult};
use async_trait::async_trait;
use mail_transport::{OutgoingMessage, Transport};
use serde::Serialize;
use spool_database::{LeaseStatus, PurgeFilter, SpoolCounts};
use std::time::Duration;
use tokio::time::Instant;

/// Why a flush pass ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// No eligible message left.
    #[default]
    Drained,
    MessageLimit,
    TimeLimit,
    /// Another flusher took the lease over mid-pass.
    LeaseLost,
}

/// What one flush pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    /// Messages the real transport accepted in this pass.
    pub sent: u64,
    /// Delivery attempts that failed in this pass.
    pub failed: u64,
    /// In-flight messages returned to pending before delivery started.
    pub recovered: u64,
    pub stop_reason: StopReason,
}

/// A durable (or not) queue of outbound messages.
///
/// Backends advertise what they can do through `supports_*` instead of
/// callers checking the concrete type.
#[async_trait]
pub trait Spool: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Whether `flush_queue` honours [`Limits`].
    fn supports_limits(&self) -> bool;

    /// Whether stuck in-flight messages can be recovered.
    fn supports_recovery(&self) -> bool;

    /// Persist a message for later delivery; returns its ID.
    async fn enqueue(&self, message: OutgoingMessage) -> SpoolResult<String>;

    /// Return in-flight messages older than `timeout` to pending.
    ///
    /// `None` applies the backend's default timeout.
    async fn recover(&self, timeout: Option<Duration>) -> SpoolResult<usize>;

    /// Deliver eligible messages through `transport`, oldest first.
    ///
    /// `started` is when the whole flush began; the time limit counts from
    /// it, so lease and recovery time are part of the budget.
    async fn flush_queue<T>(
        &self,
        transport: &T,
        limits: &Limits,
        started: Instant,
    ) -> SpoolResult<FlushReport>
    where
        T: Transport + ?Sized;

    /// Message counts per state.
    async fn stats(&self) -> SpoolResult<SpoolCounts>;

    /// Remove dead and/or retained sent messages.
    async fn purge(&self, filter: PurgeFilter) -> SpoolResult<usize>;

    /// Take the exclusive right to flush this spool.
    ///
    /// Backends that cannot be shared across processes need no lease.
    async fn acquire_flush_lease(&self) -> SpoolResult<LeaseStatus> {
        Ok(LeaseStatus::Acquired)
    }

    /// Extend a held lease. Returns false if it was lost.
    async fn renew_flush_lease(&self) -> SpoolResult<bool> {
        Ok(true)
    }

    async fn release_flush_lease(&self) -> SpoolResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_report_is_empty_and_drained() {
        let report = FlushReport::default();
        assert_eq!(report.sent, 0);
        assert_eq!(report.stop_reason, StopReason::Drained);
    }

    #[test]
    fn report_serializes_snake_case() {
        let report = FlushReport {
            sent: 3,
            failed: 1,
            recovered: 0,
            stop_reason: StopReason::MessageLimit,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["sent"], 3);
        assert_eq!(json["stop_reason"], "message_limit");
    }
}
