//! WebSocket client for the node's push-event protocol.
//!
//! [`NanoWsClient`] is the entry point. It hands commands to a background
//! connection task that owns the socket, the subscription registry and the
//! event queue, and it exposes the events of each connection cycle as an
//! [`EventStream`].
//!
//! # Connection Management
//!
//! The client never reconnects on its own. When the socket drops, the event
//! stream yields an error and the state moves to `Reconnecting`; call
//! `connect()` again (or [`connect_with_backoff`]) and every active
//! subscription is replayed on the new socket before new events arrive.

mod client;
mod manager;
mod retry;
mod stream;
mod transport;

pub use client::NanoWsClient;
pub use retry::{connect_with_backoff, ReconnectConfig};
pub use stream::EventStream;
pub use transport::{Connector, Transport, WsConnector, WsTransport};

// Re-export commonly used types for convenience
pub use crate::types::{ConnectionState, Event, EventTopic, SubscriptionOptions, Topic};
