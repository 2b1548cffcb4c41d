//! In-memory record of the subscriptions the caller wants.
//!
//! The registry holds intent only. It never touches the network: the
//! connection manager reads a [`SubscriptionRegistry::snapshot`] to replay
//! subscriptions on every new socket.

use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::types::{SubscriptionOptions, Topic};

/// An active subscription: topic plus the options last declared for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub topic: Topic,
    pub options: SubscriptionOptions,
}

/// Filter change produced by [`SubscriptionRegistry::merge_update`], in the
/// shape the node expects (`accounts_add` never overlaps `accounts_del`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterDelta {
    pub accounts_add: Vec<String>,
    pub accounts_del: Vec<String>,
}

#[derive(Debug, Clone)]
struct Entry {
    topic: Topic,
    active: bool,
    options: SubscriptionOptions,
}

/// Per-topic subscription state, kept in registration order.
///
/// A topic keeps its position after it is cleared, so re-subscribing does not
/// reorder replay.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionRegistry {
    entries: Vec<Entry>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, topic: Topic) -> Option<&Entry> {
        self.entries.iter().find(|entry| entry.topic == topic)
    }

    fn entry_mut(&mut self, topic: Topic) -> Option<&mut Entry> {
        self.entries.iter_mut().find(|entry| entry.topic == topic)
    }

    /// Mark `topic` active with `options`, replacing any previous options.
    pub fn set_active(&mut self, topic: Topic, options: SubscriptionOptions) -> Result<()> {
        options.validate(topic)?;

        match self.entry_mut(topic) {
            Some(entry) => {
                entry.active = true;
                entry.options = options;
            }
            None => self.entries.push(Entry {
                topic,
                active: true,
                options,
            }),
        }
        Ok(())
    }

    /// Mark `topic` inactive. Returns whether it was active.
    pub fn clear(&mut self, topic: Topic) -> bool {
        match self.entry_mut(topic) {
            Some(entry) if entry.active => {
                entry.active = false;
                true
            }
            _ => false,
        }
    }

    /// Mark every topic inactive, returning the ones that were active.
    pub fn clear_all(&mut self) -> Vec<Topic> {
        self.entries
            .iter_mut()
            .filter(|entry| entry.active)
            .map(|entry| {
                entry.active = false;
                entry.topic
            })
            .collect()
    }

    /// Apply `(current ∪ add) − del` to the filter set of an active topic.
    ///
    /// An account listed in both `add` and `del` ends up removed. Applying the
    /// same pair twice leaves the same state as applying it once.
    pub fn merge_update(
        &mut self,
        topic: Topic,
        accounts_add: &[String],
        accounts_del: &[String],
    ) -> Result<FilterDelta> {
        if !topic.has_account_filter() {
            return Err(Error::Subscription(format!(
                "topic `{}` has no account filter to update",
                topic
            )));
        }
        if accounts_add
            .iter()
            .chain(accounts_del)
            .any(|account| account.trim().is_empty())
        {
            return Err(Error::Subscription("empty account in update".to_string()));
        }

        let entry = match self.entry_mut(topic) {
            Some(entry) if entry.active => entry,
            _ => {
                return Err(Error::Subscription(format!(
                    "topic `{}` is not subscribed",
                    topic
                )))
            }
        };

        let del: BTreeSet<&String> = accounts_del.iter().collect();
        let add: BTreeSet<&String> = accounts_add
            .iter()
            .filter(|account| !del.contains(account))
            .collect();

        // has_account_filter() was checked above
        if let Some(filter) = entry.options.filter_mut(topic) {
            filter.extend(add.iter().map(|account| (*account).clone()));
            for account in &del {
                filter.remove(*account);
            }
        }

        Ok(FilterDelta {
            accounts_add: add.into_iter().cloned().collect(),
            accounts_del: del.into_iter().cloned().collect(),
        })
    }

    pub fn is_active(&self, topic: Topic) -> bool {
        self.entry(topic).map(|entry| entry.active).unwrap_or(false)
    }

    /// Options last declared for `topic`, whether or not it is still active
    pub fn options(&self, topic: Topic) -> Option<&SubscriptionOptions> {
        self.entry(topic).map(|entry| &entry.options)
    }

    /// Copy of every active subscription, in registration order.
    pub fn snapshot(&self) -> Vec<Subscription> {
        self.entries
            .iter()
            .filter(|entry| entry.active)
            .map(|entry| Subscription {
                topic: entry.topic,
                options: entry.options.clone(),
            })
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.active).count()
    }
}
