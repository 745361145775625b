//! Subscription tracking and topic matching
//!
//! Keeps the patterns a connection has subscribed to, in registration
//! order, each paired with its dedicated message store. Matching follows
//! the MQTT wildcard rules: `+` spans exactly one level, `#` spans any
//! number of trailing levels and is only valid as the final level.

use std::sync::Arc;

use crate::store::ManagedStore;

/// True when an MQTT subscription pattern covers the given topic
pub fn topic_matches(pattern: &str, topic: &str) -> bool {
    let mut pattern_levels = pattern.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (pattern_levels.next(), topic_levels.next()) {
            // A multi-level wildcard must be the last level to be valid
            (Some("#"), _) => return pattern_levels.next().is_none(),
            (Some("+"), Some(_)) => continue,
            (Some(level), Some(name)) => {
                if level != name {
                    return false;
                }
            }
            (Some(_), None) => return false,
            (None, Some(_)) => return false,
            (None, None) => return true,
        }
    }
}

#[derive(Debug)]
struct SubscriptionEntry {
    pattern: String,
    active: bool,
    store: Arc<ManagedStore>,
}

/// Registered subscriptions of one connection, in registration order.
///
/// Unsubscribing deactivates an entry but keeps it and its store around,
/// so the history stays browsable and a re-subscribe picks up where it
/// left off.
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    entries: Vec<SubscriptionEntry>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pattern with its dedicated store, or re-activate an
    /// existing entry. A re-subscribe keeps the original store.
    pub fn subscribe(&mut self, pattern: impl Into<String>, store: Arc<ManagedStore>) {
        let pattern = pattern.into();
        if let Some(entry) = self.entry_mut(&pattern) {
            entry.active = true;
            return;
        }

        self.entries.push(SubscriptionEntry {
            pattern,
            active: true,
            store,
        });
    }

    /// Deactivate a pattern; false when it was never registered
    pub fn unsubscribe(&mut self, pattern: &str) -> bool {
        match self.entry_mut(pattern) {
            Some(entry) => {
                entry.active = false;
                true
            }
            None => false,
        }
    }

    /// Deactivate every registered pattern
    pub fn deactivate_all(&mut self) {
        for entry in &mut self.entries {
            entry.active = false;
        }
    }

    /// Drop a pattern entirely, returning its store
    pub fn remove(&mut self, pattern: &str) -> Option<Arc<ManagedStore>> {
        let index = self
            .entries
            .iter()
            .position(|entry| entry.pattern == pattern)?;
        Some(self.entries.remove(index).store)
    }

    /// Active patterns covering the topic, in registration order
    pub fn matching(&self, topic: &str) -> Vec<String> {
        self.entries
            .iter()
            .filter(|entry| entry.active && topic_matches(&entry.pattern, topic))
            .map(|entry| entry.pattern.clone())
            .collect()
    }

    /// First pattern covering the topic regardless of active state.
    /// Messages can still arrive for a just-deactivated subscription.
    pub fn first_matching_any(&self, topic: &str) -> Option<String> {
        self.entries
            .iter()
            .find(|entry| topic_matches(&entry.pattern, topic))
            .map(|entry| entry.pattern.clone())
    }

    /// The store registered for a pattern
    pub fn store_for(&self, pattern: &str) -> Option<Arc<ManagedStore>> {
        self.entries
            .iter()
            .find(|entry| entry.pattern == pattern)
            .map(|entry| Arc::clone(&entry.store))
    }

    pub fn is_active(&self, pattern: &str) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.pattern == pattern && entry.active)
    }

    /// Every registered pattern, active or not, in registration order
    pub fn patterns(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|entry| entry.pattern.clone())
            .collect()
    }

    /// Stores of every registered subscription
    pub fn stores(&self) -> Vec<Arc<ManagedStore>> {
        self.entries
            .iter()
            .map(|entry| Arc::clone(&entry.store))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry_mut(&mut self, pattern: &str) -> Option<&mut SubscriptionEntry> {
        self.entries
            .iter_mut()
            .find(|entry| entry.pattern == pattern)
    }
}
