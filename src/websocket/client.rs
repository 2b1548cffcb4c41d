use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};

use super::manager::{Command, ConnectionManager, RegistryCommand};
use super::stream::EventStream;
use super::transport::{Connector, WsConnector};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::registry::Subscription;
use crate::types::{ConnectionState, SubscriptionOptions, Topic};

/// Client for the Nano node WebSocket event protocol
///
/// Cheap to clone: every clone talks to the same background connection task,
/// which owns the socket and the subscription registry. The task stops when
/// the last clone is dropped.
///
/// Subscribe, update and unsubscribe calls are legal in every state. They
/// always update the registry and are sent right away only while connected;
/// otherwise they take effect when the next `connect()` replays the registry.
///
/// # Reconnection
///
/// When the socket fails, the manager moves to
/// [`ConnectionState::Reconnecting`] and the event stream yields one error
/// (`Transport` or `ConnectionClosed`). Calling [`connect`](Self::connect)
/// again opens a fresh socket and resubscribes every active topic before any
/// further event is delivered. The client never retries on its own; use
/// [`connect_with_backoff`](crate::websocket::connect_with_backoff) for an
/// exponential backoff policy.
///
/// # Example
///
/// ```no_run
/// use futures_util::StreamExt;
/// use nano_ws::{NanoWsClient, SubscriptionOptions};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = NanoWsClient::new("ws://localhost:7078")?;
///     client
///         .subscribe_confirmation(SubscriptionOptions::new().accounts(["nano_1a..."]))
///         .await?;
///     let mut events = client.events().await?;
///     client.connect().await?;
///
///     while let Some(event) = events.next().await {
///         println!("Event: {:?}", event?);
///     }
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct NanoWsClient {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
}

impl NanoWsClient {
    /// Create a client for `url` with default settings.
    ///
    /// Spawns the connection task, so it must be called within a Tokio
    /// runtime. No connection is made until [`connect`](Self::connect).
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::with_config(ClientConfig::new(url))
    }

    /// Create a client from a full configuration
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        Self::with_connector(config, Arc::new(WsConnector))
    }

    /// Create a client that opens its sockets through `connector`
    pub fn with_connector(config: ClientConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        config.validate()?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

        let manager = ConnectionManager::new(config, connector, command_rx, state_tx);
        tokio::spawn(manager.run());

        Ok(Self {
            commands: command_tx,
            state: state_rx,
        })
    }

    async fn call<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(command(reply_tx))
            .map_err(|_| Error::ManagerGone)?;
        reply_rx.await.map_err(|_| Error::ManagerGone)
    }

    async fn call_registry<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> RegistryCommand,
    ) -> Result<T> {
        self.call(|reply| Command::Registry(command(reply))).await
    }

    /// Open a socket and replay every active subscription.
    ///
    /// Returns once the replay has been sent. From `Disconnected` or `Closed`
    /// a failed open leaves the manager `Disconnected`; from `Reconnecting` it
    /// stays `Reconnecting`. Does nothing when already connected.
    pub async fn connect(&self) -> Result<()> {
        self.call(|reply| Command::Connect { reply }).await?
    }

    /// Close the socket and end the current event stream.
    ///
    /// The registry is kept, so a later [`connect`](Self::connect) restores
    /// the same subscriptions.
    pub async fn disconnect(&self) -> Result<()> {
        self.call(|reply| Command::Disconnect { reply }).await
    }

    /// Give up on a lost connection: `Reconnecting` -> `Disconnected`
    pub async fn cancel_reconnect(&self) -> Result<()> {
        self.call(|reply| Command::CancelReconnect { reply }).await
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Receiver notified on every state transition
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Stream of every event from now on.
    ///
    /// Only one stream is live at a time; a second call fails with
    /// [`Error::StreamUnavailable`] until the first is dropped or
    /// `disconnect()` ends it. Events that arrive while no stream is live
    /// are discarded, so take the stream before calling `connect()` to see
    /// everything.
    pub async fn events(&self) -> Result<EventStream> {
        let rx = self
            .call_registry(|reply| RegistryCommand::TakeEvents { reply })
            .await??;
        Ok(EventStream::new(rx, None))
    }

    /// Like [`events`](Self::events), restricted to one topic.
    ///
    /// Errors still come through unfiltered.
    pub async fn events_for(&self, topic: Topic) -> Result<EventStream> {
        let rx = self
            .call_registry(|reply| RegistryCommand::TakeEvents { reply })
            .await??;
        Ok(EventStream::new(rx, Some(topic)))
    }

    /// Active subscriptions, in registration order
    pub async fn subscriptions(&self) -> Result<Vec<Subscription>> {
        self.call_registry(|reply| RegistryCommand::Snapshot { reply })
            .await
    }

    /// Subscribe to `topic`, replacing any previous options for it.
    ///
    /// Fails with [`Error::Subscription`] if `options` does not fit the topic.
    pub async fn subscribe(&self, topic: Topic, options: SubscriptionOptions) -> Result<()> {
        self.call_registry(|reply| RegistryCommand::Subscribe {
            topic,
            options,
            id: None,
            reply,
        })
        .await?
    }

    /// Subscribe with a request id the node echoes in its acknowledgement
    pub async fn subscribe_with_id(
        &self,
        topic: Topic,
        options: SubscriptionOptions,
        id: impl Into<String>,
    ) -> Result<()> {
        let id = Some(id.into());
        self.call_registry(|reply| RegistryCommand::Subscribe {
            topic,
            options,
            id,
            reply,
        })
        .await?
    }

    /// Subscribe to block confirmations, optionally filtered by account
    pub async fn subscribe_confirmation(&self, options: SubscriptionOptions) -> Result<()> {
        self.subscribe(Topic::Confirmation, options).await
    }

    /// Subscribe to votes, optionally filtered by representative
    pub async fn subscribe_vote(&self, options: SubscriptionOptions) -> Result<()> {
        self.subscribe(Topic::Vote, options).await
    }

    /// Subscribe to peer telemetry
    pub async fn subscribe_telemetry(&self) -> Result<()> {
        self.subscribe(Topic::Telemetry, SubscriptionOptions::new())
            .await
    }

    /// Subscribe to election start notifications
    pub async fn subscribe_started_election(&self) -> Result<()> {
        self.subscribe(Topic::StartedElection, SubscriptionOptions::new())
            .await
    }

    /// Subscribe to election stop notifications
    pub async fn subscribe_stopped_election(&self) -> Result<()> {
        self.subscribe(Topic::StoppedElection, SubscriptionOptions::new())
            .await
    }

    /// Subscribe to blocks as they arrive, before confirmation
    pub async fn subscribe_new_unconfirmed_block(&self) -> Result<()> {
        self.subscribe(Topic::NewUnconfirmedBlock, SubscriptionOptions::new())
            .await
    }

    /// Subscribe to bootstrap start/exit notifications
    pub async fn subscribe_bootstrap(&self) -> Result<()> {
        self.subscribe(Topic::Bootstrap, SubscriptionOptions::new())
            .await
    }

    /// Subscribe to network difficulty changes
    pub async fn subscribe_active_difficulty(&self) -> Result<()> {
        self.subscribe(Topic::ActiveDifficulty, SubscriptionOptions::new())
            .await
    }

    /// Subscribe to work generation results
    pub async fn subscribe_work(&self) -> Result<()> {
        self.subscribe(Topic::Work, SubscriptionOptions::new()).await
    }

    /// Add and remove accounts (or representatives, for `vote`) on an
    /// active subscription.
    ///
    /// The registry becomes `(current ∪ add) − del`; an account in both lists
    /// is removed. Fails with [`Error::Subscription`] for topics without an
    /// account filter or that are not subscribed.
    pub async fn update_subscription<A, D>(
        &self,
        topic: Topic,
        accounts_add: A,
        accounts_del: D,
    ) -> Result<()>
    where
        A: IntoIterator,
        A::Item: Into<String>,
        D: IntoIterator,
        D::Item: Into<String>,
    {
        let accounts_add: Vec<String> = accounts_add.into_iter().map(Into::into).collect();
        let accounts_del: Vec<String> = accounts_del.into_iter().map(Into::into).collect();
        self.call_registry(|reply| RegistryCommand::Update {
            topic,
            accounts_add,
            accounts_del,
            id: None,
            reply,
        })
        .await?
    }

    /// Unsubscribe from `topic`. Unsubscribing an inactive topic is a no-op.
    pub async fn unsubscribe(&self, topic: Topic) -> Result<()> {
        self.call_registry(|reply| RegistryCommand::Unsubscribe {
            topic,
            id: None,
            reply,
        })
        .await?
    }

    /// Stop receiving confirmations
    pub async fn unsubscribe_confirmation(&self) -> Result<()> {
        self.unsubscribe(Topic::Confirmation).await
    }

    /// Stop receiving votes
    pub async fn unsubscribe_vote(&self) -> Result<()> {
        self.unsubscribe(Topic::Vote).await
    }

    /// Stop receiving telemetry
    pub async fn unsubscribe_telemetry(&self) -> Result<()> {
        self.unsubscribe(Topic::Telemetry).await
    }

    /// Stop receiving election start notifications
    pub async fn unsubscribe_started_election(&self) -> Result<()> {
        self.unsubscribe(Topic::StartedElection).await
    }

    /// Stop receiving election stop notifications
    pub async fn unsubscribe_stopped_election(&self) -> Result<()> {
        self.unsubscribe(Topic::StoppedElection).await
    }

    /// Stop receiving unconfirmed blocks
    pub async fn unsubscribe_new_unconfirmed_block(&self) -> Result<()> {
        self.unsubscribe(Topic::NewUnconfirmedBlock).await
    }

    /// Stop receiving bootstrap notifications
    pub async fn unsubscribe_bootstrap(&self) -> Result<()> {
        self.unsubscribe(Topic::Bootstrap).await
    }

    /// Stop receiving difficulty changes
    pub async fn unsubscribe_active_difficulty(&self) -> Result<()> {
        self.unsubscribe(Topic::ActiveDifficulty).await
    }

    /// Stop receiving work results
    pub async fn unsubscribe_work(&self) -> Result<()> {
        self.unsubscribe(Topic::Work).await
    }

    /// Drop every subscription (unsubscribing on the wire when connected)
    pub async fn clear_subscriptions(&self) -> Result<()> {
        self.call_registry(|reply| RegistryCommand::ClearSubscriptions { reply })
            .await?
    }

    /// Send one keepalive ping now.
    ///
    /// Fails with [`Error::NotConnected`] unless connected. If the send
    /// fails the manager moves to `Reconnecting` and the transport error is
    /// returned.
    pub async fn ping(&self) -> Result<()> {
        self.call(|reply| Command::Ping { reply }).await?
    }
}
