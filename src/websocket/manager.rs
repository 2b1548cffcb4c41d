//! The connection task.
//!
//! One task owns the transport, the subscription registry and the event
//! queue. Public calls reach it as [`Command`]s over a channel, so registry
//! mutation, replay and the receive loop are serialized without locks. The
//! only suspension point in steady state is the `select!` over the next
//! command, the next inbound frame and the keepalive tick.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use super::stream::{EventReceiver, EventSender};
use super::transport::{Connector, Transport};
use crate::codec::{self, Request};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::registry::{Subscription, SubscriptionRegistry};
use crate::types::{ConnectionState, Event, Inbound, SubscriptionOptions, Topic};

type Reply<T> = oneshot::Sender<T>;

/// Requests from client handles to the connection task
pub(crate) enum Command {
    Connect {
        reply: Reply<Result<()>>,
    },
    Disconnect {
        reply: Reply<()>,
    },
    CancelReconnect {
        reply: Reply<()>,
    },
    Ping {
        reply: Reply<Result<()>>,
    },
    Registry(RegistryCommand),
}

/// Commands served in every state, including during a handshake
pub(crate) enum RegistryCommand {
    Subscribe {
        topic: Topic,
        options: SubscriptionOptions,
        id: Option<String>,
        reply: Reply<Result<()>>,
    },
    Unsubscribe {
        topic: Topic,
        id: Option<String>,
        reply: Reply<Result<()>>,
    },
    Update {
        topic: Topic,
        accounts_add: Vec<String>,
        accounts_del: Vec<String>,
        id: Option<String>,
        reply: Reply<Result<()>>,
    },
    ClearSubscriptions {
        reply: Reply<Result<()>>,
    },
    Snapshot {
        reply: Reply<Vec<Subscription>>,
    },
    TakeEvents {
        reply: Reply<Result<EventReceiver>>,
    },
}

/// What woke the main loop
enum Wakeup {
    Command(Option<Command>),
    Frame(Result<Option<String>>),
    Keepalive,
}

/// Outcome of waiting for a transport to open
enum Opened {
    Ready(Box<dyn Transport>),
    Failed(Error),
    /// disconnect() arrived before the socket opened
    Disconnected(Reply<()>),
    /// cancel_reconnect() arrived before the socket opened
    Cancelled(Reply<()>),
}

pub(crate) struct ConnectionManager {
    config: ClientConfig,
    connector: Arc<dyn Connector>,
    registry: SubscriptionRegistry,
    transport: Option<Box<dyn Transport>>,
    keepalive: Option<Interval>,
    state: watch::Sender<ConnectionState>,
    commands: mpsc::UnboundedReceiver<Command>,
    /// Sender of the stream handed out by `events()`, if one is live
    events: Option<EventSender>,
}

impl ConnectionManager {
    pub(crate) fn new(
        config: ClientConfig,
        connector: Arc<dyn Connector>,
        commands: mpsc::UnboundedReceiver<Command>,
        state: watch::Sender<ConnectionState>,
    ) -> Self {
        Self {
            config,
            connector,
            registry: SubscriptionRegistry::new(),
            transport: None,
            keepalive: None,
            state,
            commands,
            events: None,
        }
    }

    /// Run until every client handle is dropped.
    pub(crate) async fn run(mut self) {
        loop {
            let wakeup = match self.transport.as_mut() {
                Some(transport) => tokio::select! {
                    cmd = self.commands.recv() => Wakeup::Command(cmd),
                    frame = transport.receive() => Wakeup::Frame(frame),
                    _ = tick(&mut self.keepalive) => Wakeup::Keepalive,
                },
                None => Wakeup::Command(self.commands.recv().await),
            };

            match wakeup {
                Wakeup::Command(Some(cmd)) => self.handle_command(cmd).await,
                Wakeup::Command(None) => break,
                Wakeup::Frame(Ok(Some(frame))) => self.dispatch(&frame),
                Wakeup::Frame(Ok(None)) => self.connection_lost(Error::ConnectionClosed).await,
                Wakeup::Frame(Err(e)) => self.connection_lost(e).await,
                Wakeup::Keepalive => {
                    trace!("Sending keepalive");
                    let _ = self.send(Request::ping(false)).await;
                }
            }
        }

        debug!("All client handles dropped, stopping connection task");
        self.close().await;
    }

    fn current_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            info!(from = %previous, to = %next, "Connection state changed");
        }
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Connect { reply } => {
                let result = self.connect().await;
                let _ = reply.send(result);
            }
            Command::Disconnect { reply } => {
                self.close().await;
                let _ = reply.send(());
            }
            Command::CancelReconnect { reply } => {
                if self.current_state() == ConnectionState::Reconnecting {
                    self.set_state(ConnectionState::Disconnected);
                }
                let _ = reply.send(());
            }
            Command::Ping { reply } => {
                let result = if self.transport.is_some() {
                    self.send(Request::ping(false)).await
                } else {
                    Err(Error::NotConnected)
                };
                let _ = reply.send(result);
            }
            Command::Registry(cmd) => self.handle_registry_command(cmd).await,
        }
    }

    /// Registry commands always update the registry and go on the wire only
    /// while connected. Their reply reports the registry outcome: a failed
    /// send has already moved the manager to Reconnecting, and the request
    /// is replayed with the rest of the registry on the next connect.
    async fn handle_registry_command(&mut self, cmd: RegistryCommand) {
        let ack = self.config.ack;
        match cmd {
            RegistryCommand::Subscribe {
                topic,
                options,
                id,
                reply,
            } => {
                let result = self.registry.set_active(topic, options.clone());
                if result.is_ok() {
                    debug!(%topic, active = self.registry.active_count(), "Subscription declared");
                    let _ = self
                        .send(Request::subscribe(topic, options, ack).with_id(id))
                        .await;
                }
                let _ = reply.send(result);
            }
            RegistryCommand::Unsubscribe { topic, id, reply } => {
                if self.registry.clear(topic) {
                    debug!(%topic, active = self.registry.active_count(), "Subscription removed");
                    let _ = self
                        .send(Request::unsubscribe(topic, ack).with_id(id))
                        .await;
                }
                let _ = reply.send(Ok(()));
            }
            RegistryCommand::Update {
                topic,
                accounts_add,
                accounts_del,
                id,
                reply,
            } => {
                let result = self
                    .registry
                    .merge_update(topic, &accounts_add, &accounts_del);
                let result = match result {
                    Ok(delta) => {
                        let filter_size = self
                            .registry
                            .options(topic)
                            .and_then(|options| options.filter(topic))
                            .map_or(0, |filter| filter.len());
                        debug!(
                            %topic,
                            added = delta.accounts_add.len(),
                            removed = delta.accounts_del.len(),
                            filter_size,
                            "Subscription filter updated"
                        );
                        let _ = self
                            .send(Request::update(topic, delta.into(), ack).with_id(id))
                            .await;
                        Ok(())
                    }
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            }
            RegistryCommand::ClearSubscriptions { reply } => {
                for topic in self.registry.clear_all() {
                    let _ = self.send(Request::unsubscribe(topic, ack)).await;
                }
                let _ = reply.send(Ok(()));
            }
            RegistryCommand::Snapshot { reply } => {
                let _ = reply.send(self.registry.snapshot());
            }
            RegistryCommand::TakeEvents { reply } => {
                let _ = reply.send(self.take_events());
            }
        }
    }

    /// Hand out the event queue. Only one stream is live at a time; once it
    /// is dropped (or the manager closes) a new one can be taken.
    fn take_events(&mut self) -> Result<EventReceiver> {
        if self.events.as_ref().is_some_and(|tx| !tx.is_closed()) {
            return Err(Error::StreamUnavailable);
        }
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        self.events = Some(events_tx);
        Ok(events_rx)
    }

    /// Deliver to the live stream. Items are dropped while nobody listens.
    fn emit(&mut self, item: Result<Event>) {
        let Some(tx) = self.events.as_ref() else {
            trace!("No event stream taken, dropping item");
            return;
        };
        if tx.send(item).is_err() {
            debug!("Event stream dropped by consumer");
            self.events = None;
        }
    }

    /// Drive Disconnected/Closed/Reconnecting to Connected.
    async fn connect(&mut self) -> Result<()> {
        let state = self.current_state();
        if state.is_connected() {
            return Ok(());
        }
        let resuming = match state {
            ConnectionState::Reconnecting => true,
            ConnectionState::Disconnected | ConnectionState::Closed => {
                self.set_state(ConnectionState::Connecting);
                false
            }
            // Commands are handled one at a time, so a second connect cannot
            // observe Connecting
            ConnectionState::Connecting | ConnectionState::Connected => false,
        };

        let mut transport = match self.open().await {
            Opened::Ready(transport) => transport,
            Opened::Failed(e) => {
                warn!(url = %self.config.url, error = %e, "Connect failed");
                if !resuming {
                    self.set_state(ConnectionState::Disconnected);
                }
                return Err(e);
            }
            Opened::Disconnected(reply) => {
                self.close().await;
                let _ = reply.send(());
                return Err(Error::Cancelled);
            }
            Opened::Cancelled(reply) => {
                self.set_state(ConnectionState::Disconnected);
                let _ = reply.send(());
                return Err(Error::Cancelled);
            }
        };

        let snapshot = self.registry.snapshot();
        if let Err(e) = replay(transport.as_mut(), &snapshot, self.config.ack).await {
            warn!(error = %e, "Subscription replay failed");
            let _ = transport.close().await;
            self.set_state(ConnectionState::Reconnecting);
            return Err(e);
        }

        self.transport = Some(transport);
        self.keepalive = self.config.keepalive_interval.map(|period| {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        self.set_state(ConnectionState::Connected);
        Ok(())
    }

    /// Open a transport while still serving registry commands, so subscribe
    /// calls made during the handshake land in the replay.
    async fn open(&mut self) -> Opened {
        let connector = Arc::clone(&self.connector);
        let url = self.config.url.clone();
        let open = connector.open(&url);
        tokio::pin!(open);

        loop {
            tokio::select! {
                result = &mut open => {
                    return match result {
                        Ok(transport) => Opened::Ready(transport),
                        Err(e) => Opened::Failed(e),
                    };
                }
                cmd = self.commands.recv() => match cmd {
                    Some(Command::Disconnect { reply }) => return Opened::Disconnected(reply),
                    Some(Command::CancelReconnect { reply }) => return Opened::Cancelled(reply),
                    Some(Command::Ping { reply }) => {
                        let _ = reply.send(Err(Error::NotConnected));
                    }
                    Some(Command::Connect { reply }) => {
                        let _ = reply.send(Err(Error::Connect(
                            "connect already in progress".to_string(),
                        )));
                    }
                    Some(Command::Registry(cmd)) => self.handle_registry_command(cmd).await,
                    None => return Opened::Failed(Error::ManagerGone),
                },
            }
        }
    }

    /// Send on the current transport, if any. A failed send moves the
    /// manager to Reconnecting and is returned to the caller; the registry
    /// already holds the intent, so the request is replayed on the next
    /// connection.
    async fn send(&mut self, request: Request) -> Result<()> {
        let Some(transport) = self.transport.as_mut() else {
            trace!(topic = ?request.topic(), "Not connected, request deferred to replay");
            return Ok(());
        };

        let frame = codec::encode(&request)?;
        if let Err(e) = transport.send(frame).await {
            let reported = match &e {
                Error::ConnectionClosed => Error::ConnectionClosed,
                Error::Transport(reason) => Error::Transport(reason.clone()),
                other => Error::Transport(other.to_string()),
            };
            self.connection_lost(e).await;
            return Err(reported);
        }
        Ok(())
    }

    fn dispatch(&mut self, frame: &str) {
        match codec::decode_frame(frame) {
            Ok(Inbound::Event(event)) => {
                if let Some(topic) = event.topic.known() {
                    if !self.registry.is_active(topic) {
                        debug!(%topic, "Dropping event for inactive topic");
                        return;
                    }
                }
                self.emit(Ok(event));
            }
            Ok(Inbound::Ack(ack)) => {
                debug!(action = %ack.action, id = ?ack.id, "Request acknowledged");
            }
            Err(e) => {
                warn!(error = %e, "Failed to decode frame");
                self.emit(Err(e));
            }
        }
    }

    /// Connected -> Reconnecting. Subscription intent is kept.
    async fn connection_lost(&mut self, error: Error) {
        warn!(error = %error, "Connection lost");
        if let Some(mut transport) = self.transport.take() {
            let _ = transport.close().await;
        }
        self.keepalive = None;
        self.set_state(ConnectionState::Reconnecting);
        self.emit(Err(error));
    }

    /// Any state -> Closed. Ends the current event stream. The registry is
    /// kept.
    async fn close(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.close().await {
                debug!(error = %e, "Error closing transport");
            }
        }
        self.keepalive = None;
        self.events = None;
        self.set_state(ConnectionState::Closed);
    }
}

/// Send one subscribe per active topic on a fresh transport. Stops at the
/// first failed send.
async fn replay(transport: &mut dyn Transport, snapshot: &[Subscription], ack: bool) -> Result<()> {
    for subscription in snapshot {
        let request = Request::subscribe(subscription.topic, subscription.options.clone(), ack);
        transport.send(codec::encode(&request)?).await?;
        debug!(topic = %subscription.topic, "Replayed subscription");
    }
    if !snapshot.is_empty() {
        info!(count = snapshot.len(), "Subscriptions restored");
    }
    Ok(())
}

async fn tick(keepalive: &mut Option<Interval>) {
    match keepalive {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
