//! Frame-level socket I/O.
//!
//! The [`Transport`] trait abstracts one open socket so the connection task
//! can run over WebSockets (production) or channels (tests). A [`Connector`]
//! opens a fresh transport for every connect attempt.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

use crate::error::{Error, Result};

/// Upper bound on the closing handshake so `close()` never hangs
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// One open, message-oriented socket.
#[async_trait]
pub trait Transport: Send {
    /// Send one text frame. Fails with [`Error::Transport`] if the socket is
    /// not open.
    async fn send(&mut self, frame: String) -> Result<()>;

    /// Next text frame, or `None` once the remote end has closed.
    ///
    /// Must be cancel safe: the connection task drops a pending receive when
    /// a command arrives.
    async fn receive(&mut self) -> Result<Option<String>>;

    /// Release the socket. Calling it again is a no-op.
    async fn close(&mut self) -> Result<()>;
}

/// Opens transports.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Fails with [`Error::Connect`] when the endpoint refuses or is unreachable.
    async fn open(&self, url: &str) -> Result<Box<dyn Transport>>;
}

/// Connector for real WebSocket endpoints
#[derive(Debug, Clone, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn open(&self, url: &str) -> Result<Box<dyn Transport>> {
        debug!(url = %url, "Opening WebSocket");
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| Error::Connect(e.to_string()))?;
        Ok(Box::new(WsTransport {
            inner: Some(ws_stream),
        }))
    }
}

/// WebSocket transport backed by tokio-tungstenite
pub struct WsTransport {
    inner: Option<WebSocketStream<MaybeTlsStream<TcpStream>>>,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, frame: String) -> Result<()> {
        let ws = self
            .inner
            .as_mut()
            .ok_or_else(|| Error::Transport("not connected".to_string()))?;
        trace!(tx = %frame, "Sending frame");
        ws.send(Message::Text(frame)).await?;
        Ok(())
    }

    async fn receive(&mut self) -> Result<Option<String>> {
        let Some(ws) = self.inner.as_mut() else {
            return Ok(None);
        };

        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    trace!(rx = %text, "Received frame");
                    return Ok(Some(text));
                }
                Some(Ok(Message::Binary(bytes))) => {
                    // Some proxies re-frame text as binary. Invalid UTF-8 is
                    // left for the decoder to reject as one bad frame.
                    let text = String::from_utf8_lossy(&bytes).into_owned();
                    trace!(rx = %text, "Received binary frame");
                    return Ok(Some(text));
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "Remote closed WebSocket");
                    self.inner = None;
                    return Ok(None);
                }
                // Ping/pong are answered by tungstenite itself
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
                Some(Err(tungstenite::Error::ConnectionClosed))
                | Some(Err(tungstenite::Error::AlreadyClosed))
                | None => {
                    self.inner = None;
                    return Ok(None);
                }
                Some(Err(e)) => return Err(Error::Transport(e.to_string())),
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut ws) = self.inner.take() {
            match tokio::time::timeout(CLOSE_TIMEOUT, ws.close(None)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!(error = %e, "Error during WebSocket close"),
                Err(_) => debug!("Timed out waiting for WebSocket close"),
            }
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::mock::*;
    use super::*;

    #[tokio::test]
    async fn test_mock_close_is_idempotent() {
        let (mut transport, handle) = MockTransport::pair();
        transport.close().await.unwrap();
        transport.close().await.unwrap();
        assert!(handle.is_closed());

        let err = transport.send("{}".to_string()).await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(transport.receive().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_mock_connector_opens_fresh_transports() {
        let connector = MockConnector::new();
        let _first = connector.push_transport();
        connector.push_failure("refused");

        assert!(connector.open("ws://test").await.is_ok());
        let err = connector.open("ws://test").await.err().unwrap();
        assert!(matches!(err, Error::Connect(_)));
        assert!(connector.open("ws://test").await.is_err());
        assert_eq!(connector.open_count(), 3);
    }

    #[tokio::test]
    async fn test_ws_connector_refused() {
        // Port 1 on localhost is essentially never listening
        let err = WsConnector.open("ws://127.0.0.1:1").await.err().unwrap();
        assert!(matches!(err, Error::Connect(_)));
    }
}
