use thiserror::Error;

/// Result type for nano-ws operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for nano-ws
#[derive(Debug, Error)]
pub enum Error {
    /// The socket could not be established (refused, unreachable, bad handshake)
    #[error("Connect error: {0}")]
    Connect(String),

    /// Mid-stream I/O failure, or a send attempted without an open socket
    #[error("Transport error: {0}")]
    Transport(String),

    /// The node closed the connection
    #[error("WebSocket connection closed by remote")]
    ConnectionClosed,

    /// A single inbound frame could not be decoded
    #[error("Decode error: {reason}")]
    Decode { reason: String, frame: String },

    /// Invalid subscribe/update request from the caller
    #[error("Subscription error: {0}")]
    Subscription(String),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation requires an open connection
    #[error("Not connected")]
    NotConnected,

    /// A connect attempt was abandoned by disconnect() or cancel_reconnect()
    #[error("Connect attempt cancelled")]
    Cancelled,

    /// The event stream for the current connection cycle was already handed out
    #[error("Event stream already taken for this connection cycle")]
    StreamUnavailable,

    /// The connection task is no longer running
    #[error("Connection manager has shut down")]
    ManagerGone,

    /// Reconnection failed after multiple attempts
    #[error("Reconnection failed after {attempts} attempts: {last_error}")]
    ReconnectFailed { attempts: u32, last_error: String },
}

impl Error {
    /// Whether this error moved (or would move) the connection into
    /// `Reconnecting`, i.e. whether an external retry policy should act on it.
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::ConnectionClosed)
    }

    /// Whether re-invoking `connect()` may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Connect(_) | Error::Transport(_) | Error::ConnectionClosed
        )
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_failure_classification() {
        assert!(Error::Transport("reset".into()).is_connection_failure());
        assert!(Error::ConnectionClosed.is_connection_failure());
        assert!(!Error::Connect("refused".into()).is_connection_failure());
        assert!(!Error::Subscription("bad".into()).is_connection_failure());
    }

    #[test]
    fn test_retryable() {
        assert!(Error::Connect("refused".into()).is_retryable());
        assert!(!Error::Cancelled.is_retryable());
        assert!(!Error::ManagerGone.is_retryable());
    }

    #[test]
    fn test_display() {
        let err = Error::ReconnectFailed {
            attempts: 3,
            last_error: "refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Reconnection failed after 3 attempts: refused"
        );
    }
}
