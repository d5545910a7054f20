//! CLI command implementations.

mod purge;
mod queue;
mod send;
mod status;

pub use purge::purge;
pub use queue::queue;
pub use send::{send, SendArgs};
pub use status::status;
