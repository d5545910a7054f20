//! Mail spool backends, the mailer, and the spool flusher.
//!
//! This crate provides:
//! - [`Spool`]: capability trait implemented by [`SqliteSpool`] and [`MemorySpool`]
//! - [`Mailer`]: spooled or direct front door for mail-producing code
//! - [`SpoolFlusher`]: one bounded pass of recovery plus delivery
//!
//! ```ignore
//! let spool = SqliteSpool::open(&path, SqliteSpoolConfig::default()).await?;
//! let flusher = SpoolFlusher::new(Mailer::spooled(spool, transport));
//! let outcome = flusher.flush(Limits::new(Some(100), None), None).await?;
//! ```

mod error;
mod flusher;
mod limits;
mod mailer;
mod memory;
mod spool;
mod sqlite;

pub use error::{SpoolError, SpoolResult};
pub use flusher::{FlushOutcome, SpoolFlusher};
pub use limits::Limits;
pub use mailer::{Mailer, SendReceipt};
pub use memory::MemorySpool;
pub use spool::{FlushReport, Spool, StopReason};
pub use sqlite::{SqliteSpool, SqliteSpoolConfig};

pub use spool_database::{
    FlushLease, LeaseStatus, MessageStatus, PurgeFilter, SpoolCounts, SpooledMessage,
};
