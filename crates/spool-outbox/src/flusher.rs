//! One bounded flush pass over the mailer's spool.

use crate::{FlushReport, Limits, Mailer, Spool, SpoolResult};
use chrono::{DateTime, Utc};
use mail_transport::Transport;
use spool_database::LeaseStatus;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Result of asking for a flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    Flushed(FlushReport),
    /// The mailer is not spool-backed; nothing was delivered.
    NotSpooled,
    /// Another flusher holds the lease.
    Busy {
        holder: String,
        expires_at: DateTime<Utc>,
    },
}

impl FlushOutcome {
    /// Messages sent in this pass; zero unless flushed.
    pub fn sent(&self) -> u64 {
        match self {
            Self::Flushed(report) => report.sent,
            Self::NotSpooled | Self::Busy { .. } => 0,
        }
    }
}

/// Drives recovery and delivery for an injected [`Mailer`].
pub struct SpoolFlusher<S, T> {
    mailer: Mailer<S, T>,
}

impl<S: Spool, T: Transport> SpoolFlusher<S, T> {
    pub fn new(mailer: Mailer<S, T>) -> Self {
        Self { mailer }
    }

    pub fn mailer(&self) -> &Mailer<S, T> {
        &self.mailer
    }

    /// Run one pass: recover stuck messages, then deliver up to `limits`.
    ///
    /// The time limit covers the whole call, lease and recovery included.
    ///
    /// `recover_timeout` of `None` uses the spool's default. Store failures
    /// end the pass with an error; per-message delivery failures do not.
    pub async fn flush(
        &self,
        limits: Limits,
        recover_timeout: Option<Duration>,
    ) -> SpoolResult<FlushOutcome> {
        let started = Instant::now();
        let Mailer::Spooled { spool, transport } = &self.mailer else {
            warn!("Mailer is not spool-backed, nothing to flush");
            return Ok(FlushOutcome::NotSpooled);
        };

        if let LeaseStatus::HeldBy(lease) = spool.acquire_flush_lease().await? {
            warn!(
                holder = %lease.holder,
                expires_at = %lease.expires_at,
                "Another flusher is running"
            );
            return Ok(FlushOutcome::Busy {
                holder: lease.holder,
                expires_at: lease.expires_at,
            });
        }

        let result = run_pass(spool, transport, limits, recover_timeout, started).await;

        if let Err(e) = spool.release_flush_lease().await {
            warn!(error = %e, "Failed to release flush lease");
        }

        result.map(FlushOutcome::Flushed)
    }
}

async fn run_pass<S: Spool, T: Transport>(
    spool: &S,
    transport: &T,
    limits: Limits,
    recover_timeout: Option<Duration>,
    started: Instant,
) -> SpoolResult<FlushReport> {
    let recovered = if spool.supports_recovery() {
        spool.recover(recover_timeout).await?
    } else {
        if recover_timeout.is_some() {
            debug!(spool = spool.name(), "Spool cannot recover, ignoring recover timeout");
        }
        0
    };

    let limits = if spool.supports_limits() {
        limits
    } else {
        if !limits.is_unlimited() {
            warn!(spool = spool.name(), "Spool ignores limits, flushing everything");
        }
        Limits::unlimited()
    };

    info!(
        spool = spool.name(),
        transport = transport.name(),
        max_messages = limits.max_messages(),
        max_duration_secs = limits.max_duration().map(|d| d.as_secs()),
        "Flushing spool"
    );

    let mut report = spool.flush_queue(transport, &limits, started).await?;
    report.recovered = recovered as u64;

    info!(
        sent = report.sent,
        failed = report.failed,
        recovered = report.recovered,
        stop_reason = ?report.stop_reason,
        "Flush finished"
    );
    Ok(report)
}
