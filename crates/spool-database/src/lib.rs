//! SQLite storage for the mailspool spool.
//!
//! This crate provides:
//! - An async executor that runs every query on one dedicated thread
//! - Schema migrations for the message table and the flush lease
//! - Model types and plain query functions over `&Connection`
//!
//! ```ignore
//! let db = AsyncDatabase::open(path).await?;
//! let counts = db.call(move |conn| queries::count_by_status(conn, 5)).await?;
//! ```
//!
//! Only SQL runs inside `db.call()`. Transport I/O happens outside.

mod error;
mod executor;
mod migrations;
mod models;
pub mod queries;

pub use error::{DatabaseError, DatabaseResult};
pub use executor::AsyncDatabase;
pub use migrations::{run_migrations, CURRENT_VERSION};
pub use models::*;
