//! `mailspool status`: message counts per state.

use crate::app::App;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use serde_json::json;
use spool_config_and_utils::MailerMode;
use spool_outbox::{MessageStatus, Spool};

/// Failed messages shown with `--failed`.
const FAILED_LIST_LIMIT: usize = 50;

pub async fn status(app: &App, show_failed: bool, format: &OutputFormat) -> Result<()> {
    let spool = app.open_spool().await?;
    let counts = spool.stats().await?;
    let failed = if show_failed {
        spool
            .list_messages(Some(MessageStatus::Failed), FAILED_LIST_LIMIT)
            .await?
    } else {
        Vec::new()
    };

    let mode = match app.config.mailer {
        MailerMode::Spool => "spool",
        MailerMode::Direct => "direct",
    };

    match format {
        OutputFormat::Text => {
            output::print_heading("Spool status");
            output::print_row("Mailer", mode);
            output::print_row("Database", spool.database().path());
            output::print_row("Pending", &counts.pending.to_string());
            output::print_row("In flight", &counts.in_flight.to_string());
            output::print_row("Failed", &counts.failed.to_string());
            output::print_row("Dead", &counts.dead.to_string());
            output::print_row("Sent (kept)", &counts.sent.to_string());
            if let Some(oldest) = counts.oldest_pending_at {
                output::print_row("Oldest pending", &oldest.to_rfc3339());
            }

            if show_failed {
                println!();
                if failed.is_empty() {
                    println!("No failed messages");
                } else {
                    println!("{:<36} {:>8} {:<5} {}", "ID", "Attempts", "Dead", "Last error");
                    println!("{}", "-".repeat(100));
                    for message in &failed {
                        let dead = message.permanent
                            || message.attempts >= app.config.spool.max_attempts;
                        println!(
                            "{:<36} {:>8} {:<5} {}",
                            message.id,
                            message.attempts,
                            if dead { "yes" } else { "no" },
                            message.last_error.as_deref().unwrap_or("-")
                        );
                    }
                }
            }
        }
        OutputFormat::Json => {
            let mut value = json!({
                "mailer": mode,
                "database": spool.database().path(),
                "counts": counts,
            });
            if show_failed {
                value["failed_messages"] = serde_json::to_value(&failed)?;
            }
            output::print_json(&value)?;
        }
    }

    Ok(())
}
