//! `mailspool send`: flush the spool through the real transport.

use crate::app::App;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use serde_json::json;
use spool_outbox::{FlushOutcome, Limits, SpoolFlusher};
use std::time::Duration;

/// Flags of the send command. Zero means "no limit".
#[derive(Debug, Clone, Copy, Default)]
pub struct SendArgs {
    pub message_limit: u64,
    pub time_limit_secs: u64,
    pub recover_timeout_secs: Option<u64>,
}

impl SendArgs {
    pub fn limits(&self) -> Limits {
        Limits::new(
            Some(self.message_limit),
            Some(Duration::from_secs(self.time_limit_secs)),
        )
    }

    pub fn recover_timeout(&self) -> Option<Duration> {
        self.recover_timeout_secs.map(Duration::from_secs)
    }
}

/// Text line for a finished flush.
pub fn sent_line(sent: u64) -> String {
    format!("{} emails sent", sent)
}

pub async fn send(app: &App, args: SendArgs, format: &OutputFormat) -> Result<()> {
    let flusher = SpoolFlusher::new(app.mailer().await?);
    let outcome = flusher.flush(args.limits(), args.recover_timeout()).await?;

    match outcome {
        FlushOutcome::Flushed(report) => match format {
            OutputFormat::Text => println!("{}", sent_line(report.sent)),
            OutputFormat::Json => output::print_json(&json!({
                "status": "flushed",
                "sent": report.sent,
                "failed": report.failed,
                "recovered": report.recovered,
                "stop_reason": report.stop_reason,
            }))?,
        },
        FlushOutcome::NotSpooled => output::print_warning(
            "The configured mailer does not use a spool; nothing to send",
            format,
        ),
        FlushOutcome::Busy { holder, expires_at } => output::print_warning(
            &format!(
                "Another flush is running (holder {}, lease until {}); skipping",
                holder,
                expires_at.to_rfc3339()
            ),
            format,
        ),
    }

    Ok(())
}
