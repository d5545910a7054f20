//! Configuration, file-system paths and logging setup for mailspool.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    Config, MailerMode, SpoolSettings, TransportSettings, DEFAULT_LEASE_TTL_SECS,
    DEFAULT_LOG_LEVEL, DEFAULT_MAX_ATTEMPTS, DEFAULT_RECOVER_TIMEOUT_SECS,
    DEFAULT_RELAY_TIMEOUT_SECS,
};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, parse_level};
pub use paths::Paths;
