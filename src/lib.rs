//! # nano-ws
//!
//! A Rust client for the Nano node WebSocket push-event interface.
//!
//! The node pushes confirmations, votes, telemetry, election and work
//! notifications to subscribed clients. This crate manages the connection
//! lifecycle around that protocol:
//! - A subscription registry that remembers what the application asked for,
//!   in every connection state
//! - Replay of every active subscription whenever a connection (re)opens
//! - A typed request codec with accounts filters and delta updates
//! - A filterable stream of decoded events
//!
//! ## Features
//!
//! - **Explicit lifecycle**: `Disconnected`, `Connecting`, `Connected`,
//!   `Reconnecting` and `Closed`, observable through a watch channel
//! - **No lost intent**: subscribe and unsubscribe calls are accepted while
//!   offline and take effect on the next connect
//! - **Pluggable transport**: the socket sits behind the [`Transport`] trait
//! - **Proper Error Handling**: No panics, one error type for the whole crate
//!
//! ## Example
//!
//! ```no_run
//! use futures_util::StreamExt;
//! use nano_ws::{NanoWsClient, SubscriptionOptions, Topic};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = NanoWsClient::new("ws://localhost:7078")?;
//!     client.subscribe_confirmation(SubscriptionOptions::new()).await?;
//!     let mut confirmations = client.events_for(Topic::Confirmation).await?;
//!     client.connect().await?;
//!
//!     while let Some(event) = confirmations.next().await {
//!         println!("{}", event?.payload);
//!     }
//!     Ok(())
//! }
//! ```

// Public modules
pub mod codec;
pub mod config;
pub mod error;
pub mod registry;
pub mod types;
pub mod websocket;

// Re-export commonly used types
pub use codec::{Request, UpdateOptions};
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use registry::{FilterDelta, Subscription, SubscriptionRegistry};
pub use types::{
    Ack, ConnectionState, Event, EventTopic, Inbound, SubscriptionOptions, Topic,
};

// Re-export the client
pub use websocket::{
    connect_with_backoff, Connector, EventStream, NanoWsClient, ReconnectConfig, Transport,
    WsConnector,
};
