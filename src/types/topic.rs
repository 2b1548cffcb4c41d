use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Named category of event pushed by the node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    Confirmation,
    Vote,
    Telemetry,
    ActiveDifficulty,
    NewUnconfirmedBlock,
    StartedElection,
    StoppedElection,
    Work,
    Bootstrap,
}

impl Topic {
    /// Every topic, in declaration order
    pub const ALL: [Topic; 9] = [
        Topic::Confirmation,
        Topic::Vote,
        Topic::Telemetry,
        Topic::ActiveDifficulty,
        Topic::NewUnconfirmedBlock,
        Topic::StartedElection,
        Topic::StoppedElection,
        Topic::Work,
        Topic::Bootstrap,
    ];

    /// Wire name of the topic
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Confirmation => "confirmation",
            Topic::Vote => "vote",
            Topic::Telemetry => "telemetry",
            Topic::ActiveDifficulty => "active_difficulty",
            Topic::NewUnconfirmedBlock => "new_unconfirmed_block",
            Topic::StartedElection => "started_election",
            Topic::StoppedElection => "stopped_election",
            Topic::Work => "work",
            Topic::Bootstrap => "bootstrap",
        }
    }

    /// Whether subscriptions to this topic carry an account/representative
    /// filter set that `update` can modify.
    pub fn has_account_filter(&self) -> bool {
        matches!(self, Topic::Confirmation | Topic::Vote)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Topic::ALL
            .into_iter()
            .find(|topic| topic.as_str() == s)
            .ok_or_else(|| Error::Subscription(format!("unknown topic: {}", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_names_round_trip() {
        for topic in Topic::ALL {
            assert_eq!(topic.as_str().parse::<Topic>().unwrap(), topic);
            let json = serde_json::to_string(&topic).unwrap();
            assert_eq!(json, format!("\"{}\"", topic.as_str()));
        }
    }

    #[test]
    fn test_unknown_topic() {
        assert!("blocks".parse::<Topic>().is_err());
    }

    #[test]
    fn test_account_filter_topics() {
        let filtered: Vec<Topic> = Topic::ALL
            .into_iter()
            .filter(Topic::has_account_filter)
            .collect();
        assert_eq!(filtered, vec![Topic::Confirmation, Topic::Vote]);
    }
}
