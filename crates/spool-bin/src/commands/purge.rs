//! `mailspool purge`: drop dead and retained sent messages.

use crate::app::App;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use chrono::{TimeDelta, Utc};
use serde_json::json;
use spool_outbox::{PurgeFilter, Spool};

/// Build the filter; with neither `failed` nor `sent`, both are purged.
pub fn purge_filter(failed: bool, sent: bool, older_than_secs: Option<u64>) -> PurgeFilter {
    let (dead, sent) = if !failed && !sent {
        (true, true)
    } else {
        (failed, sent)
    };
    PurgeFilter {
        dead,
        sent,
        enqueued_before: older_than_secs.map(|secs| {
            let age = TimeDelta::try_seconds(secs.min(i64::MAX as u64) as i64)
                .unwrap_or(TimeDelta::MAX);
            Utc::now()
                .checked_sub_signed(age)
                .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC)
        }),
    }
}

pub async fn purge(
    app: &App,
    failed: bool,
    sent: bool,
    older_than_secs: Option<u64>,
    format: &OutputFormat,
) -> Result<()> {
    let spool = app.open_spool().await?;
    let purged = spool
        .purge(purge_filter(failed, sent, older_than_secs))
        .await?;

    match format {
        OutputFormat::Text => output::print_success(&format!("{} messages purged", purged), format),
        OutputFormat::Json => output::print_json(&json!({ "status": "purged", "purged": purged }))?,
    }
    Ok(())
}
