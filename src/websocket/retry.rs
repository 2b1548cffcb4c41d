use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use super::client::NanoWsClient;
use crate::error::{Error, Result};

/// Configuration for reconnection behavior
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Initial delay before the second connection attempt
    pub initial_delay: Duration,
    /// Maximum delay between attempts
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
    /// Maximum number of attempts (None = infinite)
    pub max_attempts: Option<u32>,
    /// Random spread applied to each delay, as a fraction of it (0 = none)
    pub jitter: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            max_attempts: None,
            jitter: 0.0,
        }
    }
}

/// Exponential backoff calculator
#[derive(Debug, Clone)]
struct ExponentialBackoff {
    current_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
}

impl ExponentialBackoff {
    fn new(initial_delay: Duration, max_delay: Duration, multiplier: f64) -> Self {
        Self {
            current_delay: initial_delay,
            max_delay,
            multiplier,
        }
    }

    fn from_config(config: &ReconnectConfig) -> Self {
        Self::new(config.initial_delay, config.max_delay, config.multiplier)
    }

    /// Get the next delay duration
    fn next_delay(&mut self) -> Duration {
        let delay = self.current_delay;
        self.current_delay = std::cmp::min(
            Duration::from_secs_f64(delay.as_secs_f64() * self.multiplier),
            self.max_delay,
        );
        delay
    }
}

/// Spread `delay` uniformly over `delay * (1 ± jitter)`
fn jittered(delay: Duration, jitter: f64) -> Duration {
    if jitter <= 0.0 {
        return delay;
    }
    let jitter = jitter.min(1.0);
    let factor = rand::thread_rng().gen_range(1.0 - jitter..=1.0 + jitter);
    Duration::from_secs_f64(delay.as_secs_f64() * factor)
}

/// Call [`NanoWsClient::connect`] until it succeeds, sleeping with
/// exponential backoff between attempts.
///
/// Works from any state: after a connection loss the manager sits in
/// `Reconnecting`, and every successful attempt replays the registry.
/// Errors that retrying cannot fix (a cancelled connect, a gone manager)
/// are returned at once. If the state is changed by someone else while
/// waiting (`disconnect()` or `cancel_reconnect()`), gives up with
/// [`Error::Cancelled`].
///
/// # Example
///
/// ```no_run
/// use nano_ws::{connect_with_backoff, NanoWsClient, ReconnectConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let client = NanoWsClient::new("ws://localhost:7078")?;
/// let config = ReconnectConfig {
///     max_attempts: Some(10),
///     ..Default::default()
/// };
/// connect_with_backoff(&client, &config).await?;
/// # Ok(())
/// # }
/// ```
pub async fn connect_with_backoff(client: &NanoWsClient, config: &ReconnectConfig) -> Result<()> {
    let mut backoff = ExponentialBackoff::from_config(config);
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let error = match client.connect().await {
            Ok(()) => {
                if attempts > 1 {
                    info!(attempts, "Connected after retrying");
                }
                return Ok(());
            }
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => e,
        };

        if let Some(max) = config.max_attempts {
            if attempts >= max {
                warn!(attempts, error = %error, "Giving up on connecting");
                return Err(Error::ReconnectFailed {
                    attempts,
                    last_error: error.to_string(),
                });
            }
        }

        let delay = jittered(backoff.next_delay(), config.jitter);
        warn!(
            attempt = attempts,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Connect failed, retrying"
        );

        let waiting_in = client.state();
        sleep(delay).await;
        match client.state() {
            state if state.is_connected() => return Ok(()),
            state if state != waiting_in => return Err(Error::Cancelled),
            _ => {}
        }
    }
}
