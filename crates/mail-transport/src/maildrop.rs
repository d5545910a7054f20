//! Maildrop transport: one `.eml` file per message.
//!
//! A local MTA or pickup service watches the directory. Files appear
//! atomically (temp file, fsync, rename) so a watcher never sees a partial
//! message. Redelivering the same ID overwrites the earlier file.

use crate::{OutgoingMessage, Transport, TransportError, TransportResult};
use async_trait::async_trait;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::debug;

/// Writes messages into a directory.
#[derive(Debug, Clone)]
pub struct MaildropTransport {
    directory: PathBuf,
}

impl MaildropTransport {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Final path of a message's `.eml` file.
    pub fn path_for(&self, message_id: &str) -> PathBuf {
        self.directory.join(format!("{message_id}.eml"))
    }
}

/// Envelope headers followed by the raw message.
fn render(message: &OutgoingMessage) -> Vec<u8> {
    let mut out = Vec::with_capacity(message.body.len() + 128);
    out.extend_from_slice(format!("X-Envelope-From: {}\r\n", message.sender).as_bytes());
    out.extend_from_slice(
        format!("X-Envelope-To: {}\r\n", message.recipients.join(", ")).as_bytes(),
    );
    out.extend_from_slice(&message.body);
    out
}

fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid file name"))?;

    fs::create_dir_all(dir)?;

    let tmp_path = dir.join(format!(
        ".{}.tmp.{}",
        file_name,
        std::time::SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    ));

    let write_result = (|| -> io::Result<()> {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)?;
        file.write_all(content)?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)
    })();

    if write_result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    write_result
}

#[async_trait]
impl Transport for MaildropTransport {
    fn name(&self) -> &str {
        "maildrop"
    }

    async fn deliver(&self, message: &OutgoingMessage) -> TransportResult<()> {
        message.validate()?;

        let path = self.path_for(&message.id);
        let content = render(message);
        let target = path.clone();

        tokio::task::spawn_blocking(move || atomic_write(&target, &content))
            .await
            .map_err(|e| TransportError::Io(io::Error::other(e)))??;

        debug!(message_id = %message.id, path = %path.display(), "Message dropped");
        Ok(())
    }
}
