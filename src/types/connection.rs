use std::fmt;

/// Lifecycle state of the connection manager.
///
/// ```text
/// Disconnected --connect--> Connecting --open+replay ok--> Connected
///      ^                        |                             |
///      +------open failed-------+          send/receive failure or remote close
///      |                                                      v
///      +------------cancel_reconnect------------------- Reconnecting --connect ok--> Connected
///
/// any state --disconnect--> Closed --connect--> Connecting
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Closed,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}
