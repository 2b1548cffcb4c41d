use futures_util::stream::{FusedStream, Stream};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

use crate::error::Result;
use crate::types::{Event, Topic};

/// Items handed from the connection task to the consumer
pub(crate) type EventSender = mpsc::UnboundedSender<Result<Event>>;
pub(crate) type EventReceiver = mpsc::UnboundedReceiver<Result<Event>>;

/// Stream of decoded events for one connection cycle.
///
/// Yields `Ok(event)` for every event (or only those of the filter topic),
/// and `Err(..)` for per-frame decode failures and for connection failures
/// (`Transport`/`ConnectionClosed`). Errors are never filtered out.
///
/// The stream survives reconnects. It ends (`None`) once the manager is
/// closed with `disconnect()`, and stays ended; call `events()` again for a
/// new one.
///
/// # Example
///
/// ```no_run
/// use futures_util::StreamExt;
/// use nano_ws::{NanoWsClient, SubscriptionOptions, Topic};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let client = NanoWsClient::new("ws://localhost:7078")?;
/// client.subscribe_confirmation(SubscriptionOptions::new()).await?;
/// let mut confirmations = client.events_for(Topic::Confirmation).await?;
/// client.connect().await?;
///
/// while let Some(event) = confirmations.next().await {
///     println!("{:?}", event?);
/// }
/// # Ok(())
/// # }
/// ```
pub struct EventStream {
    rx: EventReceiver,
    filter: Option<Topic>,
    terminated: bool,
}

impl EventStream {
    pub(crate) fn new(rx: EventReceiver, filter: Option<Topic>) -> Self {
        Self {
            rx,
            filter,
            terminated: false,
        }
    }

    /// Topic this stream is restricted to, if any
    pub fn topic_filter(&self) -> Option<Topic> {
        self.filter
    }

    fn accepts(&self, event: &Event) -> bool {
        match self.filter {
            Some(topic) => event.is(topic),
            None => true,
        }
    }
}

impl Stream for EventStream {
    type Item = Result<Event>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.terminated {
            return Poll::Ready(None);
        }

        loop {
            match self.rx.poll_recv(cx) {
                Poll::Ready(Some(Ok(event))) => {
                    if self.accepts(&event) {
                        return Poll::Ready(Some(Ok(event)));
                    }
                }
                Poll::Ready(Some(Err(e))) => return Poll::Ready(Some(Err(e))),
                Poll::Ready(None) => {
                    self.terminated = true;
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl FusedStream for EventStream {
    fn is_terminated(&self) -> bool {
        self.terminated
    }
}
