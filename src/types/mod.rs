mod connection;
mod event;
mod options;
mod serde_helpers;
mod topic;

// Re-export all types
pub use connection::*;
pub use event::*;
pub use options::*;
pub use topic::*;

// Keep serde_helpers internal but accessible within crate
pub(crate) use serde_helpers::{bool_from_any, is_false};
