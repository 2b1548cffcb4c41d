//! Wire encoding of outbound requests and decoding of inbound frames.
//!
//! Outbound frames look like
//! `{"action": "subscribe", "topic": "confirmation", "options": {...}, "ack": true}`.
//! Inbound event frames look like `{"topic": "confirmation", "time": "...", "message": {...}}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::registry::FilterDelta;
use crate::types::{
    bool_from_any, is_false, Ack, Event, EventTopic, Inbound, SubscriptionOptions, Topic,
};

/// Options carried by an `update` request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOptions {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accounts_add: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accounts_del: Vec<String>,
}

impl From<FilterDelta> for UpdateOptions {
    fn from(delta: FilterDelta) -> Self {
        Self {
            accounts_add: delta.accounts_add,
            accounts_del: delta.accounts_del,
        }
    }
}

/// An outbound protocol request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Request {
    Subscribe {
        topic: Topic,
        #[serde(default)]
        options: SubscriptionOptions,
        #[serde(default, skip_serializing_if = "is_false", deserialize_with = "bool_from_any")]
        ack: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
    Update {
        topic: Topic,
        #[serde(default)]
        options: UpdateOptions,
        #[serde(default, skip_serializing_if = "is_false", deserialize_with = "bool_from_any")]
        ack: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
    Unsubscribe {
        topic: Topic,
        #[serde(default, skip_serializing_if = "is_false", deserialize_with = "bool_from_any")]
        ack: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
    Ping {
        #[serde(default, skip_serializing_if = "is_false", deserialize_with = "bool_from_any")]
        ack: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
}

impl Request {
    pub fn subscribe(topic: Topic, options: SubscriptionOptions, ack: bool) -> Self {
        Request::Subscribe {
            topic,
            options,
            ack,
            id: None,
        }
    }

    pub fn update(topic: Topic, options: UpdateOptions, ack: bool) -> Self {
        Request::Update {
            topic,
            options,
            ack,
            id: None,
        }
    }

    pub fn unsubscribe(topic: Topic, ack: bool) -> Self {
        Request::Unsubscribe {
            topic,
            ack,
            id: None,
        }
    }

    pub fn ping(ack: bool) -> Self {
        Request::Ping { ack, id: None }
    }

    /// Attach a request id, echoed back by the node in acknowledgements
    pub fn with_id(mut self, request_id: Option<String>) -> Self {
        match &mut self {
            Request::Subscribe { id, .. }
            | Request::Update { id, .. }
            | Request::Unsubscribe { id, .. }
            | Request::Ping { id, .. } => *id = request_id,
        }
        self
    }

    pub fn topic(&self) -> Option<Topic> {
        match self {
            Request::Subscribe { topic, .. }
            | Request::Update { topic, .. }
            | Request::Unsubscribe { topic, .. } => Some(*topic),
            Request::Ping { .. } => None,
        }
    }
}

/// Encode a request as a text frame
pub fn encode(request: &Request) -> Result<String> {
    Ok(serde_json::to_string(request)?)
}

/// Parse an outbound frame back into a [`Request`].
///
/// Accepts the string booleans older clients send (`"ack": "false"`).
pub fn decode_request(frame: &str) -> Result<Request> {
    Ok(serde_json::from_str(frame)?)
}

/// Decode one inbound frame.
///
/// Frames whose `topic` is missing or unknown are passed through as
/// [`EventTopic::Unknown`] events carrying the whole frame. Only non-JSON
/// input is an error.
pub fn decode_frame(frame: &str) -> Result<Inbound> {
    let value: Value = serde_json::from_str(frame).map_err(|e| Error::Decode {
        reason: e.to_string(),
        frame: truncate(frame),
    })?;

    let mut fields = match value {
        Value::Object(fields) => fields,
        other => {
            return Ok(Inbound::Event(Event {
                topic: EventTopic::Unknown(None),
                time: None,
                payload: other,
            }))
        }
    };

    let time = fields.get("time").and_then(parse_time);

    if !fields.contains_key("topic") {
        if let Some(action) = fields.get("ack").and_then(Value::as_str) {
            return Ok(Inbound::Ack(Ack {
                action: action.to_string(),
                id: fields.get("id").and_then(Value::as_str).map(str::to_string),
                time,
            }));
        }
    }

    let raw_topic = fields.get("topic").and_then(Value::as_str).map(str::to_string);
    match raw_topic.as_deref().map(Topic::from_str) {
        Some(Ok(topic)) => {
            let payload = fields.remove("message").unwrap_or(Value::Null);
            Ok(Inbound::Event(Event {
                topic: EventTopic::Known(topic),
                time,
                payload,
            }))
        }
        _ => Ok(Inbound::Event(Event {
            topic: EventTopic::Unknown(raw_topic),
            time,
            payload: Value::Object(fields),
        })),
    }
}

/// Node timestamps are milliseconds since the epoch, sent as a string
fn parse_time(value: &Value) -> Option<DateTime<Utc>> {
    let millis = match value {
        Value::String(s) => s.parse::<i64>().ok()?,
        Value::Number(n) => n.as_i64()?,
        _ => return None,
    };
    DateTime::from_timestamp_millis(millis)
}

fn truncate(frame: &str) -> String {
    frame.chars().take(200).collect()
}
