//! Durable spool backed by SQLite.

use crate::{FlushReport, Limits, Spool, SpoolError, SpoolResult, StopReason};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use mail_transport::{OutgoingMessage, Transport};
use spool_database::{
    queries, AsyncDatabase, LeaseStatus, MessageStatus, NewSpooledMessage,
    PurgeFilter, SpoolCounts, SpooledMessage,
};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// SQLite spool settings.
#[derive(Debug, Clone)]
pub struct SqliteSpoolConfig {
    /// Used by `recover(None)`.
    pub default_recover_timeout: Duration,
    /// How long a flush lease lasts without renewal.
    pub lease_ttl: Duration,
    /// Attempts after which a failed message is left alone.
    pub max_attempts: u32,
    /// Keep delivered rows as `sent` instead of deleting them.
    pub keep_sent: bool,
}

impl Default for SqliteSpoolConfig {
    fn default() -> Self {
        Self {
            default_recover_timeout: Duration::from_secs(900),
            lease_ttl: Duration::from_secs(300),
            max_attempts: 5,
            keep_sent: false,
        }
    }
}

fn to_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}

fn saturating_sub(at: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    at.checked_sub_signed(to_delta(duration))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn saturating_add(at: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    at.checked_add_signed(to_delta(duration))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn to_outgoing(message: SpooledMessage) -> OutgoingMessage {
    OutgoingMessage {
        id: message.id,
        sender: message.sender,
        recipients: message.recipients,
        subject: message.subject,
        body: message.body,
    }
}

/// Spool stored in a SQLite database, shareable between processes.
///
/// Each instance has its own lease holder identity, so two flushers in the
/// same process contend for the lease like two processes would.
pub struct SqliteSpool {
    db: AsyncDatabase,
    config: SqliteSpoolConfig,
    holder: String,
    lease_held: AtomicBool,
}

impl SqliteSpool {
    pub fn new(db: AsyncDatabase, config: SqliteSpoolConfig) -> Self {
        let holder = format!("pid-{}-{}", std::process::id(), uuid::Uuid::new_v4());
        Self {
            db,
            config,
            holder,
            lease_held: AtomicBool::new(false),
        }
    }

    /// Open (or create) the spool database at `path`.
    pub async fn open(path: &Path, config: SqliteSpoolConfig) -> SpoolResult<Self> {
        let db = AsyncDatabase::open(path).await?;
        Ok(Self::new(db, config))
    }

    /// Override the lease holder identity.
    pub fn with_holder(mut self, holder: impl Into<String>) -> Self {
        self.holder = holder.into();
        self
    }

    pub fn holder(&self) -> &str {
        &self.holder
    }

    pub fn config(&self) -> &SqliteSpoolConfig {
        &self.config
    }

    pub fn database(&self) -> &AsyncDatabase {
        &self.db
    }

    pub async fn get_message(&self, id: &str) -> SpoolResult<Option<SpooledMessage>> {
        let id = id.to_string();
        Ok(self.db.call(move |conn| queries::get_message(conn, &id)).await?)
    }

    pub async fn list_messages(
        &self,
        status: Option<MessageStatus>,
        limit: usize,
    ) -> SpoolResult<Vec<SpooledMessage>> {
        Ok(self
            .db
            .call(move |conn| queries::list_messages(conn, status, limit))
            .await?)
    }

    async fn claim_next(&self, pass_start: DateTime<Utc>) -> SpoolResult<Option<SpooledMessage>> {
        let max_attempts = self.config.max_attempts;
        Ok(self
            .db
            .call(move |conn| {
                queries::claim_next_message(conn, Utc::now(), pass_start, max_attempts)
            })
            .await?)
    }

    async fn record_delivered(&self, id: String) -> SpoolResult<()> {
        if self.config.keep_sent {
            self.db
                .call(move |conn| queries::mark_sent(conn, &id, Utc::now()))
                .await?;
        } else {
            self.db
                .call(move |conn| queries::delete_message(conn, &id))
                .await?;
        }
        Ok(())
    }

    async fn record_failed(&self, id: String, error: String, permanent: bool) -> SpoolResult<()> {
        self.db
            .call(move |conn| queries::mark_failed(conn, &id, &error, permanent))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Spool for SqliteSpool {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn supports_limits(&self) -> bool {
        true
    }

    fn supports_recovery(&self) -> bool {
        true
    }

    async fn enqueue(&self, message: OutgoingMessage) -> SpoolResult<String> {
        message.validate()?;

        let id = message.id.clone();
        let record = NewSpooledMessage {
            id: message.id,
            sender: message.sender,
            recipients: message.recipients,
            subject: message.subject,
            body: message.body,
            enqueued_at: Utc::now(),
        };

        let result = self
            .db
            .call(move |conn| queries::insert_message(conn, &record))
            .await;

        match result {
            Ok(()) => {
                debug!(message_id = %id, "Message enqueued");
                Ok(id)
            }
            Err(e) if e.is_constraint_violation() => Err(SpoolError::Duplicate(id)),
            Err(e) => Err(e.into()),
        }
    }

    async fn recover(&self, timeout: Option<Duration>) -> SpoolResult<usize> {
        let timeout = timeout.unwrap_or(self.config.default_recover_timeout);
        let cutoff = saturating_sub(Utc::now(), timeout);

        let recovered = self
            .db
            .call(move |conn| queries::recover_in_flight(conn, cutoff))
            .await?;

        if recovered > 0 {
            info!(
                recovered,
                timeout_secs = timeout.as_secs(),
                "Recovered in-flight messages"
            );
        }
        Ok(recovered)
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
        let pass_start = Utc::now();
        let mut report = FlushReport::default();

        loop {
            if let Some(reason) = limits.check(report.sent, started.elapsed()) {
                report.stop_reason = reason;
                break;
            }

            let Some(message) = self.claim_next(pass_start).await? else {
                report.stop_reason = StopReason::Drained;
                break;
            };

            let attempts = message.attempts;
            let outgoing = to_outgoing(message);

            match transport.deliver(&outgoing).await {
                Ok(()) => {
                    self.record_delivered(outgoing.id.clone()).await?;
                    report.sent += 1;
                    debug!(
                        message_id = %outgoing.id,
                        transport = transport.name(),
                        attempts,
                        "Message delivered"
                    );
                }
                Err(e) => {
                    let permanent = e.is_permanent();
                    warn!(
                        message_id = %outgoing.id,
                        transport = transport.name(),
                        attempts,
                        permanent,
                        error = %e,
                        "Delivery failed"
                    );
                    self.record_failed(outgoing.id.clone(), e.to_string(), permanent)
                        .await?;
                    report.failed += 1;
                }
            }

            if !self.renew_flush_lease().await? {
                warn!(holder = %self.holder, "Flush lease lost, stopping pass");
                report.stop_reason = StopReason::LeaseLost;
                break;
            }
        }

        Ok(report)
    }

    async fn stats(&self) -> SpoolResult<SpoolCounts> {
        let max_attempts = self.config.max_attempts;
        Ok(self
            .db
            .call(move |conn| queries::count_by_status(conn, max_attempts))
            .await?)
    }

    async fn purge(&self, filter: PurgeFilter) -> SpoolResult<usize> {
        let max_attempts = self.config.max_attempts;
        let purged = self
            .db
            .call(move |conn| queries::purge_messages(conn, &filter, max_attempts))
            .await?;
        info!(purged, "Purged spool");
        Ok(purged)
    }

    async fn acquire_flush_lease(&self) -> SpoolResult<LeaseStatus> {
        let holder = self.holder.clone();
        let now = Utc::now();
        let expires_at = saturating_add(now, self.config.lease_ttl);

        let status = self
            .db
            .call(move |conn| queries::try_acquire_lease(conn, &holder, now, expires_at))
            .await?;

        if status == LeaseStatus::Acquired {
            self.lease_held.store(true, Ordering::SeqCst);
            debug!(holder = %self.holder, "Flush lease acquired");
        }
        Ok(status)
    }

    async fn renew_flush_lease(&self) -> SpoolResult<bool> {
        if !self.lease_held.load(Ordering::SeqCst) {
            return Ok(true);
        }

        let holder = self.holder.clone();
        let expires_at = saturating_add(Utc::now(), self.config.lease_ttl);
        let renewed = self
            .db
            .call(move |conn| queries::renew_lease(conn, &holder, expires_at))
            .await?;

        if !renewed {
            self.lease_held.store(false, Ordering::SeqCst);
        }
        Ok(renewed)
    }

    async fn release_flush_lease(&self) -> SpoolResult<()> {
        if !self.lease_held.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        let holder = self.holder.clone();
        self.db
            .call(move |conn| queries::release_lease(conn, &holder))
            .await?;
        debug!(holder = %self.holder, "Flush lease released");
        Ok(())
    }
}
