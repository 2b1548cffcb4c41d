use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::serde_helpers::opt_bool_from_any;
use super::topic::Topic;
use crate::error::{Error, Result};

/// Per-topic subscription parameters.
///
/// Filter sets compare as sets, so two options built from the same accounts in
/// a different order are equal. Flags left as `None` are omitted from the wire
/// and the node applies its own default.
///
/// # Example
///
/// ```
/// use nano_ws::{SubscriptionOptions, Topic};
///
/// let options = SubscriptionOptions::new()
///     .accounts(["nano_1a", "nano_1b"])
///     .include_election_info(true);
/// assert!(options.validate(Topic::Confirmation).is_ok());
/// assert!(options.validate(Topic::Vote).is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionOptions {
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub accounts: BTreeSet<String>,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub representatives: BTreeSet<String>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "opt_bool_from_any"
    )]
    pub all_local_accounts: Option<bool>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "opt_bool_from_any"
    )]
    pub include_block: Option<bool>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "opt_bool_from_any"
    )]
    pub include_election_info: Option<bool>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "opt_bool_from_any"
    )]
    pub include_sideband_info: Option<bool>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "opt_bool_from_any"
    )]
    pub include_replays: Option<bool>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "opt_bool_from_any"
    )]
    pub include_indeterminate: Option<bool>,
}

impl SubscriptionOptions {
    /// Empty options: no filters, node defaults for every flag
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict confirmations to these accounts
    pub fn accounts<I, S>(mut self, accounts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accounts.extend(accounts.into_iter().map(Into::into));
        self
    }

    /// Restrict votes to these representatives
    pub fn representatives<I, S>(mut self, representatives: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.representatives
            .extend(representatives.into_iter().map(Into::into));
        self
    }

    pub fn all_local_accounts(mut self, value: bool) -> Self {
        self.all_local_accounts = Some(value);
        self
    }

    pub fn include_block(mut self, value: bool) -> Self {
        self.include_block = Some(value);
        self
    }

    pub fn include_election_info(mut self, value: bool) -> Self {
        self.include_election_info = Some(value);
        self
    }

    pub fn include_sideband_info(mut self, value: bool) -> Self {
        self.include_sideband_info = Some(value);
        self
    }

    pub fn include_replays(mut self, value: bool) -> Self {
        self.include_replays = Some(value);
        self
    }

    pub fn include_indeterminate(mut self, value: bool) -> Self {
        self.include_indeterminate = Some(value);
        self
    }

    /// The filter set `update` operates on for `topic`, if it has one
    pub fn filter(&self, topic: Topic) -> Option<&BTreeSet<String>> {
        match topic {
            Topic::Confirmation => Some(&self.accounts),
            Topic::Vote => Some(&self.representatives),
            _ => None,
        }
    }

    pub(crate) fn filter_mut(&mut self, topic: Topic) -> Option<&mut BTreeSet<String>> {
        match topic {
            Topic::Confirmation => Some(&mut self.accounts),
            Topic::Vote => Some(&mut self.representatives),
            _ => None,
        }
    }

    /// Check that every option set here applies to `topic` and that no two
    /// flags contradict each other.
    pub fn validate(&self, topic: Topic) -> Result<()> {
        let confirmation_only = [
            ("accounts", !self.accounts.is_empty()),
            ("all_local_accounts", self.all_local_accounts.is_some()),
            ("include_block", self.include_block.is_some()),
            ("include_election_info", self.include_election_info.is_some()),
            ("include_sideband_info", self.include_sideband_info.is_some()),
        ];
        let vote_only = [
            ("representatives", !self.representatives.is_empty()),
            ("include_replays", self.include_replays.is_some()),
            ("include_indeterminate", self.include_indeterminate.is_some()),
        ];

        let foreign: Vec<&(&str, bool)> = match topic {
            Topic::Confirmation => vote_only.iter().collect(),
            Topic::Vote => confirmation_only.iter().collect(),
            _ => confirmation_only.iter().chain(vote_only.iter()).collect(),
        };

        if let Some((name, _)) = foreign.into_iter().find(|(_, set)| *set) {
            return Err(Error::Subscription(format!(
                "option `{}` does not apply to topic `{}`",
                name, topic
            )));
        }

        if self.include_sideband_info == Some(true) && self.include_block == Some(false) {
            return Err(Error::Subscription(
                "include_sideband_info requires include_block".to_string(),
            ));
        }

        if let Some(filter) = self.filter(topic) {
            if filter.iter().any(|account| account.trim().is_empty()) {
                return Err(Error::Subscription(format!(
                    "empty account in `{}` filter",
                    topic
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_equality_ignores_order() {
        let a = SubscriptionOptions::new().accounts(["nano_b", "nano_a"]);
        let b = SubscriptionOptions::new().accounts(["nano_a", "nano_b"]);
        assert_eq!(a, b);
        assert_ne!(a, b.include_block(true));
    }

    #[test]
    fn test_wire_field_names() {
        let options = SubscriptionOptions::new()
            .accounts(["nano_1"])
            .all_local_accounts(true)
            .include_block(true)
            .include_election_info(false)
            .include_sideband_info(true);
        let value = serde_json::to_value(&options).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "accounts": ["nano_1"],
                "all_local_accounts": true,
                "include_block": true,
                "include_election_info": false,
                "include_sideband_info": true,
            })
        );

        let vote = SubscriptionOptions::new()
            .representatives(["nano_rep"])
            .include_replays(true)
            .include_indeterminate(false);
        let value = serde_json::to_value(&vote).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "representatives": ["nano_rep"],
                "include_replays": true,
                "include_indeterminate": false,
            })
        );
    }

    #[test]
    fn test_empty_options_serialize_to_empty_object() {
        let value = serde_json::to_value(SubscriptionOptions::new()).unwrap();
        assert_eq!(value, serde_json::json!({}));
    }

    #[test]
    fn test_deserialize_string_booleans() {
        let options: SubscriptionOptions = serde_json::from_str(
            r#"{"include_replays": "true", "include_indeterminate": "false"}"#,
        )
        .unwrap();
        assert_eq!(options.include_replays, Some(true));
        assert_eq!(options.include_indeterminate, Some(false));
    }

    #[test]
    fn test_validate_rejects_foreign_options() {
        let confirmation = SubscriptionOptions::new().include_block(true);
        assert!(confirmation.validate(Topic::Confirmation).is_ok());
        assert!(confirmation.validate(Topic::Vote).is_err());
        assert!(confirmation.validate(Topic::Telemetry).is_err());

        let vote = SubscriptionOptions::new().include_replays(true);
        assert!(vote.validate(Topic::Vote).is_ok());
        assert!(vote.validate(Topic::Confirmation).is_err());

        assert!(SubscriptionOptions::new().validate(Topic::Work).is_ok());
    }

    #[test]
    fn test_validate_conflicting_flags() {
        let options = SubscriptionOptions::new()
            .include_block(false)
            .include_sideband_info(true);
        let err = options.validate(Topic::Confirmation).unwrap_err();
        assert!(matches!(err, Error::Subscription(_)));
    }

    #[test]
    fn test_validate_empty_account() {
        let options = SubscriptionOptions::new().accounts([" "]);
        assert!(options.validate(Topic::Confirmation).is_err());
    }
}
