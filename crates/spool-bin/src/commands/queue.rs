//! `mailspool queue`: hand one message to the configured mailer.

use crate::app::App;
use crate::output::{self, OutputFormat};
use anyhow::{Context, Result};
use mail_transport::OutgoingMessage;
use serde_json::json;
use spool_outbox::SendReceipt;
use std::path::Path;
use tokio::io::AsyncReadExt;

/// Read the raw message from `file`, or stdin when absent or `-`.
async fn read_body(file: Option<&Path>) -> Result<Vec<u8>> {
    match file {
        Some(path) if path != Path::new("-") => tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display())),
        _ => {
            let mut body = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut body)
                .await
                .context("failed to read message from stdin")?;
            Ok(body)
        }
    }
}

pub async fn queue(
    app: &App,
    from: String,
    to: Vec<String>,
    subject: Option<String>,
    file: Option<&Path>,
    format: &OutputFormat,
) -> Result<()> {
    let body = read_body(file).await?;
    if body.is_empty() {
        anyhow::bail!("message body is empty");
    }

    let mut message = OutgoingMessage::new(from, to, body);
    if let Some(subject) = subject {
        message = message.with_subject(subject);
    }

    let mailer = app.mailer().await?;
    let receipt = mailer.send(message).await?;

    let (verb, status) = match &receipt {
        SendReceipt::Spooled(_) => ("Queued", "spooled"),
        SendReceipt::Delivered(_) => ("Delivered", "delivered"),
    };
    match format {
        OutputFormat::Text => output::print_success(
            &format!("{} message {}", verb, receipt.message_id()),
            format,
        ),
        OutputFormat::Json => output::print_json(&json!({
            "status": status,
            "message_id": receipt.message_id(),
        }))?,
    }

    Ok(())
}
