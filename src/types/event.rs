use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use super::topic::Topic;

/// Topic tag of a decoded inbound frame
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum EventTopic {
    /// One of the topics this client can subscribe to
    Known(Topic),
    /// A `topic` value this client does not know, or no `topic` at all
    Unknown(Option<String>),
}

impl EventTopic {
    pub fn known(&self) -> Option<Topic> {
        match self {
            EventTopic::Known(topic) => Some(*topic),
            EventTopic::Unknown(_) => None,
        }
    }
}

impl fmt::Display for EventTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventTopic::Known(topic) => topic.fmt(f),
            EventTopic::Unknown(Some(raw)) => write!(f, "unknown({})", raw),
            EventTopic::Unknown(None) => f.write_str("unknown"),
        }
    }
}

/// A decoded event pushed by the node.
///
/// For known topics `payload` is the frame's `message` object. Frames with an
/// unrecognized topic keep the whole frame as payload so nothing is lost.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub topic: EventTopic,
    /// Node-side timestamp (`time`, milliseconds since the Unix epoch)
    pub time: Option<DateTime<Utc>>,
    pub payload: serde_json::Value,
}

impl Event {
    /// Whether this event belongs to `topic`
    pub fn is(&self, topic: Topic) -> bool {
        self.topic == EventTopic::Known(topic)
    }
}

/// Acknowledgement of a request sent with `ack` set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    /// The acknowledged action (`subscribe`, `update`, `unsubscribe`, `ping`)
    pub action: String,
    pub id: Option<String>,
    pub time: Option<DateTime<Utc>>,
}

/// A decoded inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Event(Event),
    Ack(Ack),
}
