#![allow(dead_code)]

use async_trait::async_trait;
use mail_transport::{OutgoingMessage, Transport, TransportError, TransportResult};
use spool_database::AsyncDatabase;
use spool_outbox::{SqliteSpool, SqliteSpoolConfig};
use std::sync::Mutex;
use std::time::Duration;

/// What the recording transport does with each message.
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    Accept,
    Transient,
    Reject,
}

/// Transport that remembers every delivery attempt.
pub struct RecordingTransport {
    behavior: Behavior,
    delay: Option<Duration>,
    attempts: Mutex<Vec<String>>,
}

impl RecordingTransport {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            delay: None,
            attempts: Mutex::new(Vec::new()),
        }
    }

    pub fn accepting() -> Self {
        Self::new(Behavior::Accept)
    }

    /// Each delivery takes `delay` of (tokio) time.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// IDs of every message handed to `deliver`, in order.
    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    fn name(&self) -> &str {
        "recording"
    }

    async fn deliver(&self, message: &OutgoingMessage) -> TransportResult<()> {
        self.attempts.lock().unwrap().push(message.id.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.behavior {
            Behavior::Accept => Ok(()),
            Behavior::Transient => Err(TransportError::Transient("connection reset".into())),
            Behavior::Reject => Err(TransportError::Rejected("550 no such user".into())),
        }
    }
}

pub fn message(n: usize) -> OutgoingMessage {
    OutgoingMessage::new(
        "noreply@example.com",
        vec![format!("user{n}@example.com")],
        format!("Subject: message {n}\r\n\r\nbody {n}\r\n").into_bytes(),
    )
    .with_subject(format!("message {n}"))
}

pub async fn sqlite_spool(config: SqliteSpoolConfig) -> SqliteSpool {
    let db = AsyncDatabase::open_in_memory().await.unwrap();
    SqliteSpool::new(db, config)
}

/// Let the wall clock move past the millisecond a pass started in.
pub async fn next_pass() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}
