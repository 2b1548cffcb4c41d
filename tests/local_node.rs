//! End-to-end tests against an in-process WebSocket server standing in for
//! a node.

use futures_util::{SinkExt, StreamExt};
use nano_ws::{
    connect_with_backoff, ClientConfig, ConnectionState, Error, NanoWsClient, ReconnectConfig,
    SubscriptionOptions, Topic,
};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_test::{assert_err, assert_ok};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

const WAIT: Duration = Duration::from_secs(5);

/// Server side of one accepted client socket
struct NodeConnection {
    requests: mpsc::UnboundedReceiver<Value>,
    /// `Some(message)` pushes a message, `None` closes the socket
    push: mpsc::UnboundedSender<Option<Message>>,
}

impl NodeConnection {
    async fn next_request(&mut self) -> Value {
        timeout(WAIT, self.requests.recv())
            .await
            .expect("timed out waiting for a request")
            .expect("client went away")
    }

    fn send(&self, frame: Value) {
        self.send_raw(Message::Text(frame.to_string()));
    }

    fn send_raw(&self, message: Message) {
        self.push.send(Some(message)).unwrap();
    }

    fn close(&self) {
        self.push.send(None).unwrap();
    }
}

struct FakeNode {
    url: String,
    connections: mpsc::UnboundedReceiver<NodeConnection>,
}

impl FakeNode {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let (conn_tx, conn_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((tcp, _)) = listener.accept().await {
                let Ok(ws) = accept_async(tcp).await else {
                    continue;
                };
                let (req_tx, req_rx) = mpsc::unbounded_channel();
                let (push_tx, mut push_rx) = mpsc::unbounded_channel::<Option<Message>>();
                let connection = NodeConnection {
                    requests: req_rx,
                    push: push_tx,
                };
                if conn_tx.send(connection).is_err() {
                    break;
                }

                tokio::spawn(async move {
                    let (mut sink, mut source) = ws.split();
                    loop {
                        tokio::select! {
                            msg = source.next() => match msg {
                                Some(Ok(Message::Text(text))) => {
                                    let value: Value = serde_json::from_str(&text).unwrap();
                                    let _ = req_tx.send(value);
                                }
                                Some(Ok(_)) => {}
                                _ => break,
                            },
                            out = push_rx.recv() => match out {
                                Some(Some(message)) => {
                                    if sink.send(message).await.is_err() {
                                        break;
                                    }
                                }
                                _ => {
                                    let _ = sink.close().await;
                                    break;
                                }
                            },
                        }
                    }
                });
            }
        });

        Self {
            url,
            connections: conn_rx,
        }
    }

    async fn accept(&mut self) -> NodeConnection {
        timeout(WAIT, self.connections.recv())
            .await
            .expect("timed out waiting for a connection")
            .expect("listener stopped")
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn client_for(node: &FakeNode) -> NanoWsClient {
    let config = ClientConfig::new(node.url.clone()).with_keepalive(None);
    NanoWsClient::with_config(config).unwrap()
}

#[tokio::test]
async fn test_subscriptions_replayed_and_events_delivered() {
    init_tracing();
    let mut node = FakeNode::start().await;
    let client = client_for(&node);

    assert_ok!(
        client
            .subscribe_confirmation(
                SubscriptionOptions::new()
                    .accounts(["nano_1ipx847tk8o46pwxt5qjdbncjqcbwcc1rrmqnkztrfjy5k7z4imsrata9est"])
                    .include_election_info(true)
            )
            .await
    );
    assert_ok!(client.subscribe_telemetry().await);
    assert_ok!(client.connect().await);
    assert_eq!(client.state(), ConnectionState::Connected);

    let mut conn = node.accept().await;
    assert_eq!(
        conn.next_request().await,
        json!({
            "action": "subscribe",
            "topic": "confirmation",
            "options": {
                "accounts": ["nano_1ipx847tk8o46pwxt5qjdbncjqcbwcc1rrmqnkztrfjy5k7z4imsrata9est"],
                "include_election_info": true,
            },
        })
    );
    assert_eq!(
        conn.next_request().await,
        json!({"action": "subscribe", "topic": "telemetry", "options": {}})
    );

    let mut events = client.events_for(Topic::Confirmation).await.unwrap();
    conn.send(json!({"topic": "telemetry", "time": "1700000000000", "message": {}}));
    conn.send(json!({
        "topic": "confirmation",
        "time": "1700000000123",
        "message": {"hash": "ABC", "confirmation_type": "active_quorum"},
    }));

    let event = timeout(WAIT, events.next()).await.unwrap().unwrap().unwrap();
    assert!(event.is(Topic::Confirmation));
    assert_eq!(event.payload["hash"], "ABC");
    assert_eq!(event.time.unwrap().timestamp_millis(), 1_700_000_000_123);
}

#[tokio::test]
async fn test_remote_close_then_reconnect_with_backoff() {
    init_tracing();
    let mut node = FakeNode::start().await;
    let client = client_for(&node);
    assert_ok!(client.subscribe_vote(SubscriptionOptions::new()).await);
    assert_ok!(client.connect().await);

    let mut first = node.accept().await;
    assert_eq!(first.next_request().await["topic"], "vote");
    let mut events = client.events().await.unwrap();

    first.close();
    let marker = timeout(WAIT, events.next()).await.unwrap().unwrap();
    assert!(matches!(
        marker,
        Err(Error::ConnectionClosed) | Err(Error::Transport(_))
    ));
    assert_eq!(client.state(), ConnectionState::Reconnecting);

    let retry = ReconnectConfig {
        initial_delay: Duration::from_millis(10),
        max_attempts: Some(5),
        ..Default::default()
    };
    assert_ok!(connect_with_backoff(&client, &retry).await);

    let mut second = node.accept().await;
    assert_eq!(
        second.next_request().await,
        json!({"action": "subscribe", "topic": "vote", "options": {}})
    );

    second.send(json!({"topic": "vote", "message": {"account": "nano_rep"}}));
    let event = timeout(WAIT, events.next()).await.unwrap().unwrap().unwrap();
    assert!(event.is(Topic::Vote));
    assert!(event.time.is_none());
}

#[tokio::test]
async fn test_disconnect_closes_socket_and_ends_stream() {
    init_tracing();
    let mut node = FakeNode::start().await;
    let client = client_for(&node);
    assert_ok!(client.connect().await);
    let mut conn = node.accept().await;
    let mut events = client.events().await.unwrap();

    assert_ok!(client.disconnect().await);
    assert_eq!(client.state(), ConnectionState::Closed);
    assert!(timeout(WAIT, events.next()).await.unwrap().is_none());
    assert!(timeout(WAIT, conn.requests.recv()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_acks_are_not_delivered_as_events() {
    init_tracing();
    let mut node = FakeNode::start().await;
    let config = ClientConfig::new(node.url.clone())
        .with_keepalive(None)
        .with_ack(true);
    let client = NanoWsClient::with_config(config).unwrap();
    assert_ok!(client.connect().await);
    let mut conn = node.accept().await;
    let mut events = client.events().await.unwrap();

    assert_ok!(
        client
            .subscribe_with_id(Topic::Work, SubscriptionOptions::new(), "work-1")
            .await
    );
    let request = conn.next_request().await;
    assert_eq!(request["ack"], true);
    assert_eq!(request["id"], "work-1");

    conn.send(json!({"ack": "subscribe", "time": "1700000000000", "id": "work-1"}));
    conn.send(json!({"topic": "work", "message": {"success": "true"}}));

    let event = timeout(WAIT, events.next()).await.unwrap().unwrap().unwrap();
    assert!(event.is(Topic::Work));
}

#[tokio::test]
async fn test_invalid_binary_frame_does_not_drop_connection() {
    init_tracing();
    let mut node = FakeNode::start().await;
    let client = client_for(&node);
    assert_ok!(client.subscribe_telemetry().await);
    let mut events = client.events().await.unwrap();
    assert_ok!(client.connect().await);
    let mut conn = node.accept().await;
    conn.next_request().await;

    conn.send_raw(Message::Binary(vec![0xff, 0xfe]));
    conn.send_raw(Message::Binary(
        br#"{"topic":"telemetry","message":"binary"}"#.to_vec(),
    ));
    conn.send(json!({"topic": "telemetry", "message": "text"}));

    let first = timeout(WAIT, events.next()).await.unwrap().unwrap();
    assert!(matches!(first, Err(Error::Decode { .. })));
    let second = timeout(WAIT, events.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(second.payload, "binary");
    let third = timeout(WAIT, events.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(third.payload, "text");
    assert_eq!(client.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn test_refused_connection_leaves_disconnected() {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    drop(listener);

    let client = NanoWsClient::new(url).unwrap();
    assert_ok!(client.subscribe_telemetry().await);
    let err = assert_err!(client.connect().await);
    assert!(matches!(err, Error::Connect(_)));
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(client.subscriptions().await.unwrap().len(), 1);
}
