use std::time::Duration;

use crate::error::{Error, Result};

/// Connection manager configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Node WebSocket endpoint (`ws://` or `wss://`)
    pub url: String,
    /// Interval between keepalive pings while connected (None = no pings)
    pub keepalive_interval: Option<Duration>,
    /// Ask the node to acknowledge subscribe/update/unsubscribe requests
    pub ack: bool,
}

impl ClientConfig {
    /// Default endpoint of a local node
    pub const DEFAULT_URL: &'static str = "ws://localhost:7078";

    /// Default keepalive interval
    pub const DEFAULT_KEEPALIVE: Duration = Duration::from_secs(120);

    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_keepalive(mut self, interval: Option<Duration>) -> Self {
        self.keepalive_interval = interval;
        self
    }

    pub fn with_ack(mut self, ack: bool) -> Self {
        self.ack = ack;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.url.starts_with("ws://") || self.url.starts_with("wss://")) {
            return Err(Error::Config(format!(
                "url must start with ws:// or wss://, got {:?}",
                self.url
            )));
        }
        if self.keepalive_interval == Some(Duration::ZERO) {
            return Err(Error::Config(
                "keepalive interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: Self::DEFAULT_URL.to_string(),
            keepalive_interval: Some(Self::DEFAULT_KEEPALIVE),
            ack: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.url, "ws://localhost:7078");
        assert_eq!(config.keepalive_interval, Some(Duration::from_secs(120)));
        assert!(!config.ack);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_custom_url() {
        let config = ClientConfig::new("wss://node.example.com/ws").with_ack(true);
        assert_eq!(config.url, "wss://node.example.com/ws");
        assert!(config.ack);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        assert!(ClientConfig::new("http://localhost:7078").validate().is_err());
        assert!(ClientConfig::default()
            .with_keepalive(Some(Duration::ZERO))
            .validate()
            .is_err());
    }
}
