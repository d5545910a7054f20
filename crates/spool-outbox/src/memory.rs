//! Process-local spool.
//!
//! Nothing survives the process, so there is nothing to recover and no
//! other process to exclude.

use crate::{FlushReport, Limits, Spool, SpoolError, SpoolResult, StopReason};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mail_transport::{OutgoingMessage, Transport};
use spool_database::{MessageStatus, PurgeFilter, SpoolCounts};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
struct Entry {
    message: OutgoingMessage,
    status: MessageStatus,
    attempts: u32,
    permanent: bool,
    last_error: Option<String>,
    enqueued_at: DateTime<Utc>,
    /// Pass number of the most recent attempt.
    last_pass: Option<u64>,
}

impl Entry {
    fn eligible(&self, pass: u64, max_attempts: u32) -> bool {
        match self.status {
            MessageStatus::Pending => true,
            MessageStatus::Failed => {
                !self.permanent && self.attempts < max_attempts && self.last_pass != Some(pass)
            }
            MessageStatus::InFlight | MessageStatus::Sent => false,
        }
    }

    fn is_dead(&self, max_attempts: u32) -> bool {
        self.status == MessageStatus::Failed && (self.permanent || self.attempts >= max_attempts)
    }
}

/// In-memory FIFO spool.
pub struct MemorySpool {
    entries: Mutex<VecDeque<Entry>>,
    max_attempts: u32,
    passes: AtomicU64,
}

impl Default for MemorySpool {
    fn default() -> Self {
        Self::new(5)
    }
}

impl MemorySpool {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            max_attempts,
            passes: AtomicU64::new(0),
        }
    }

    /// Number of messages still held, in any state.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Last recorded error for a message, if it failed.
    pub async fn last_error(&self, id: &str) -> Option<String> {
        let entries = self.entries.lock().await;
        entries
            .iter()
            .find(|e| e.message.id == id)
            .and_then(|e| e.last_error.clone())
    }

    async fn claim_next(&self, pass: u64) -> Option<OutgoingMessage> {
        let mut entries = self.entries.lock().await;
        let entry = entries
            .iter_mut()
            .find(|e| e.eligible(pass, self.max_attempts))?;
        entry.status = MessageStatus::InFlight;
        entry.attempts += 1;
        entry.last_pass = Some(pass);
        Some(entry.message.clone())
    }

    async fn finish(&self, id: &str, outcome: Result<(), (String, bool)>) {
        let mut entries = self.entries.lock().await;
        let Some(index) = entries.iter().position(|e| e.message.id == id) else {
            return;
        };
        match outcome {
            Ok(()) => {
                entries.remove(index);
            }
            Err((error, permanent)) => {
                let entry = &mut entries[index];
                entry.status = MessageStatus::Failed;
                entry.last_error = Some(error);
                entry.permanent = permanent;
            }
        }
    }
}

#[async_trait]
impl Spool for MemorySpool {
    fn name(&self) -> &str {
        "memory"
    }

    fn supports_limits(&self) -> bool {
        true
    }

    fn supports_recovery(&self) -> bool {
        false
    }

    async fn enqueue(&self, message: OutgoingMessage) -> SpoolResult<String> {
        message.validate()?;

        let mut entries = self.entries.lock().await;
        if entries.iter().any(|e| e.message.id == message.id) {
            return Err(SpoolError::Duplicate(message.id));
        }

        let id = message.id.clone();
        entries.push_back(Entry {
            message,
            status: MessageStatus::Pending,
            attempts: 0,
            permanent: false,
            last_error: None,
            enqueued_at: Utc::now(),
            last_pass: None,
        });
        debug!(message_id = %id, "Message enqueued in memory");
        Ok(id)
    }

    async fn recover(&self, _timeout: Option<Duration>) -> SpoolResult<usize> {
        Ok(0)
    }

    async fn flush_queue<T>(
        &self,
        transport: &T,
        limits: &Limits,
        started: Instant,
    ) -> SpoolResult<FlushReport>
    where
        T: Transport + ?Sized,
    {
        let pass = self.passes.fetch_add(1, Ordering::SeqCst) + 1;
        let mut report = FlushReport::default();

        loop {
            if let Some(reason) = limits.check(report.sent, started.elapsed()) {
                report.stop_reason = reason;
                break;
            }

            let Some(message) = self.claim_next(pass).await else {
                report.stop_reason = StopReason::Drained;
                break;
            };

            match transport.deliver(&message).await {
                Ok(()) => {
                    self.finish(&message.id, Ok(())).await;
                    report.sent += 1;
                    debug!(
                        message_id = %message.id,
                        transport = transport.name(),
                        "Message delivered"
                    );
                }
                Err(e) => {
                    warn!(
                        message_id = %message.id,
                        transport = transport.name(),
                        error = %e,
                        "Delivery failed"
                    );
                    self.finish(&message.id, Err((e.to_string(), e.is_permanent())))
                        .await;
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    async fn stats(&self) -> SpoolResult<SpoolCounts> {
        let entries = self.entries.lock().await;
        let mut counts = SpoolCounts::default();
        for entry in entries.iter() {
            match entry.status {
                MessageStatus::Pending => {
                    counts.pending += 1;
                    counts.oldest_pending_at = Some(
                        counts
                            .oldest_pending_at
                            .map_or(entry.enqueued_at, |t| t.min(entry.enqueued_at)),
                    );
                }
                MessageStatus::InFlight => counts.in_flight += 1,
                MessageStatus::Sent => counts.sent += 1,
                MessageStatus::Failed if entry.is_dead(self.max_attempts) => counts.dead += 1,
                MessageStatus::Failed => counts.failed += 1,
            }
        }
        Ok(counts)
    }

    async fn purge(&self, filter: PurgeFilter) -> SpoolResult<usize> {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|entry| {
            let old_enough = filter
                .enqueued_before
                .map_or(true, |cutoff| entry.enqueued_at < cutoff);
            let selected = (filter.dead && entry.is_dead(self.max_attempts))
                || (filter.sent && entry.status == MessageStatus::Sent);
            !(old_enough && selected)
        });
        Ok(before - entries.len())
    }
}
