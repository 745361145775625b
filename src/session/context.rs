//! Connection context
//!
//! The ingestion-side context of one broker connection. The network
//! client is a black box that calls back into [`on_message`] and
//! [`on_connection_lost`]; everything downstream of those callbacks
//! lives here: subscription matching, the fan-out of record copies to
//! per-subscription stores, the audit trail and the statistics bumps.
//!
//! [`on_message`]: ConnectionContext::on_message
//! [`on_connection_lost`]: ConnectionContext::on_connection_lost

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::message::{MessageRecord, Qos};
use crate::stats::StatsRegistry;
use crate::store::ManagedStore;

use super::audit::MessageAudit;
use super::subscription::SubscriptionSet;

/// One broker connection's stores, subscriptions and counters
#[derive(Debug)]
pub struct ConnectionContext {
    /// Connection id used for statistics
    id: String,
    /// The all-messages store; also lends the connection its name
    store: Arc<ManagedStore>,
    subscriptions: Mutex<SubscriptionSet>,
    stats: Arc<StatsRegistry>,
    audit: Mutex<Option<MessageAudit>>,
}

impl ConnectionContext {
    /// Wire a context to its all-messages store and the shared statistics
    /// registry. Counts as one connection in the lifetime totals.
    pub fn new(id: impl Into<String>, store: Arc<ManagedStore>, stats: Arc<StatsRegistry>) -> Self {
        stats.new_connection();
        Self {
            id: id.into(),
            store,
            subscriptions: Mutex::new(SubscriptionSet::new()),
            stats,
            audit: Mutex::new(None),
        }
    }

    /// Message-arrival callback.
    ///
    /// Builds the record, finds the subscriptions it matched, hands one
    /// copy to each matching subscription's store and one to the audit
    /// trail, bumps the statistics, and stores the record in the
    /// all-messages store. When no active subscription matches, the first
    /// matching inactive one still receives the message, since traffic
    /// can trail in after an unsubscribe.
    pub fn on_message(&self, topic: &str, payload: Bytes, qos: Qos, retained: bool) {
        let mut record = MessageRecord::new(topic, payload, qos, retained);

        let subscriptions = self.subscriptions.lock();
        let mut matching = subscriptions.matching(topic);
        if matching.is_empty() {
            if let Some(pattern) = subscriptions.first_matching_any(topic) {
                tracing::debug!(
                    topic = %topic,
                    pattern = %pattern,
                    "no active subscription, using first matching"
                );
                matching.push(pattern);
            }
        }
        if matching.is_empty() {
            tracing::warn!(
                connection = %self.store.name(),
                topic = %topic,
                "no matching subscription"
            );
        }

        record.set_matching_subscriptions(matching.clone());

        for pattern in &matching {
            if let Some(store) = subscriptions.store_for(pattern) {
                store.message_received(record.clone());
            }
        }
        drop(subscriptions);

        if let Some(audit) = &*self.audit.lock() {
            audit.record(record.clone());
        }

        self.stats.message_received(&self.id, &matching);
        self.store.message_received(record);
    }

    /// Connection-lost callback. Subscriptions deactivate; nothing is
    /// removed from any store.
    pub fn on_connection_lost(&self, cause: &str) {
        tracing::warn!(
            connection = %self.store.name(),
            cause = %cause,
            "connection lost"
        );
        self.subscriptions.lock().deactivate_all();
    }

    /// Report a successful broker publish
    pub fn message_published(&self, topic: &str) {
        self.stats.message_published(&self.id, topic);
    }

    /// Register a subscription with its dedicated store, or re-activate
    /// an existing one. Counts in the lifetime subscription total.
    pub fn subscribe(&self, pattern: impl Into<String>, store: Arc<ManagedStore>) {
        self.subscriptions.lock().subscribe(pattern, store);
        self.stats.new_subscription();
    }

    /// Deactivate a subscription, keeping its entry and store
    pub fn unsubscribe(&self, pattern: &str) -> bool {
        self.subscriptions.lock().unsubscribe(pattern)
    }

    /// Drop a subscription for good, stopping its store's collectors
    pub fn remove_subscription(&self, pattern: &str) -> bool {
        match self.subscriptions.lock().remove(pattern) {
            Some(store) => {
                store.clean_up();
                tracing::info!(
                    connection = %self.store.name(),
                    pattern = %pattern,
                    "subscription removed"
                );
                true
            }
            None => false,
        }
    }

    pub fn subscription_active(&self, pattern: &str) -> bool {
        self.subscriptions.lock().is_active(pattern)
    }

    /// The store of one subscription
    pub fn subscription_store(&self, pattern: &str) -> Option<Arc<ManagedStore>> {
        self.subscriptions.lock().store_for(pattern)
    }

    /// Registered patterns in registration order, active or not
    pub fn subscription_patterns(&self) -> Vec<String> {
        self.subscriptions.lock().patterns()
    }

    /// Attach an audit trail; a previous one is stopped first
    pub fn set_audit(&self, audit: MessageAudit) {
        if let Some(previous) = self.audit.lock().replace(audit) {
            previous.stop();
        }
    }

    /// Detach and stop the audit trail, if any
    pub fn stop_audit(&self) {
        if let Some(audit) = self.audit.lock().take() {
            audit.stop();
        }
    }

    pub fn audit_running(&self) -> bool {
        self.audit
            .lock()
            .as_ref()
            .map(|audit| audit.is_running())
            .unwrap_or(false)
    }

    /// The all-messages store
    pub fn store(&self) -> &Arc<ManagedStore> {
        &self.store
    }

    pub fn stats(&self) -> &Arc<StatsRegistry> {
        &self.stats
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Connection name, which is the all-messages store's name
    pub fn name(&self) -> &str {
        self.store.name()
    }

    /// Stop the audit trail and every store's collectors. Called once
    /// when the connection is closed for good.
    pub fn clean_up(&self) {
        self.stop_audit();

        let subscriptions = self.subscriptions.lock();
        for store in subscriptions.stores() {
            store.clean_up();
        }
        drop(subscriptions);

        self.store.clean_up();
        tracing::debug!(connection = %self.store.name(), "connection cleaned up");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::session::audit::AuditSink;
    use crate::store::StoreConfig;

    fn make_context() -> (ConnectionContext, Arc<ManagedStore>, Arc<StatsRegistry>) {
        let stats = Arc::new(StatsRegistry::new());
        let (store, _drain) = ManagedStore::new("conn", StoreConfig::default());
        let context = ConnectionContext::new("c1", Arc::clone(&store), Arc::clone(&stats));
        (context, store, stats)
    }

    fn make_store(name: &str) -> Arc<ManagedStore> {
        ManagedStore::new(name, StoreConfig::default()).0
    }

    fn payload(text: &str) -> Bytes {
        Bytes::copy_from_slice(text.as_bytes())
    }

    #[tokio::test]
    async fn test_on_message_fans_out_to_matching_stores() {
        let (context, all, _stats) = make_context();
        let sub_a = make_store("a/#");
        let sub_b = make_store("b/#");
        context.subscribe("a/#", Arc::clone(&sub_a));
        context.subscribe("b/#", Arc::clone(&sub_b));

        context.on_message("a/x", payload("1"), Qos::AtMostOnce, false);

        assert_eq!(all.message_count(), 1);
        assert_eq!(sub_a.message_count(), 1);
        assert_eq!(sub_b.message_count(), 0);

        let record = &all.all_messages()[0];
        assert_eq!(record.matching_subscriptions(), ["a/#"]);
    }

    #[tokio::test]
    async fn test_fanned_out_records_are_copies_of_one_message() {
        let (context, all, _stats) = make_context();
        let sub = make_store("a/#");
        context.subscribe("a/#", Arc::clone(&sub));

        context.on_message("a/x", payload("1"), Qos::ExactlyOnce, true);

        let in_all = &all.all_messages()[0];
        let in_sub = &sub.all_messages()[0];
        assert_eq!(in_all.id(), in_sub.id());
        assert_eq!(in_sub.qos(), Qos::ExactlyOnce);
        assert!(in_sub.retained());
    }

    #[tokio::test]
    async fn test_overlapping_subscriptions_count_once_overall() {
        let (context, all, stats) = make_context();
        context.subscribe("a/#", make_store("a/#"));
        context.subscribe("a/+", make_store("a/+"));

        context.on_message("a/x", payload("1"), Qos::AtMostOnce, false);
        stats.tick();

        let record = &all.all_messages()[0];
        assert_eq!(record.matching_subscriptions(), ["a/#", "a/+"]);

        let avg = stats.avg_received("c1", 5);
        assert_eq!(avg.overall, 0.2);
        assert_eq!(avg.rate_for("a/#"), 0.2);
        assert_eq!(avg.rate_for("a/+"), 0.2);
    }

    #[tokio::test]
    async fn test_fallback_to_inactive_subscription() {
        let (context, _all, _stats) = make_context();
        let sub = make_store("a/#");
        context.subscribe("a/#", Arc::clone(&sub));
        assert!(context.unsubscribe("a/#"));

        context.on_message("a/x", payload("late"), Qos::AtMostOnce, false);

        assert_eq!(sub.message_count(), 1);
        let record = &sub.all_messages()[0];
        assert_eq!(record.matching_subscriptions(), ["a/#"]);
    }

    #[tokio::test]
    async fn test_unmatched_message_is_still_stored() {
        let (context, all, _stats) = make_context();

        context.on_message("orphan", payload("1"), Qos::AtMostOnce, false);

        assert_eq!(all.message_count(), 1);
        assert!(all.all_messages()[0].matching_subscriptions().is_empty());
    }

    #[tokio::test]
    async fn test_connection_lost_deactivates_subscriptions() {
        let (context, _all, _stats) = make_context();
        context.subscribe("a/#", make_store("a/#"));

        context.on_connection_lost("broker went away");

        assert!(!context.subscription_active("a/#"));
        // The entry and its store survive for re-subscription
        assert!(context.subscription_store("a/#").is_some());
    }

    #[tokio::test]
    async fn test_audit_receives_record_copies() {
        #[derive(Clone, Default)]
        struct CollectSink {
            topics: Arc<Mutex<Vec<String>>>,
        }

        impl AuditSink for CollectSink {
            fn consume(&mut self, record: &MessageRecord) {
                self.topics.lock().push(record.topic().to_owned());
            }
        }

        let (context, _all, _stats) = make_context();
        let sink = CollectSink::default();
        let topics = Arc::clone(&sink.topics);
        context.set_audit(MessageAudit::start("c1", sink));
        assert!(context.audit_running());

        context.on_message("a", payload("1"), Qos::AtMostOnce, false);
        context.on_message("b", payload("2"), Qos::AtMostOnce, false);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(*topics.lock(), vec!["a", "b"]);

        context.stop_audit();
        assert!(!context.audit_running());
    }

    #[tokio::test]
    async fn test_publish_and_lifetime_totals() {
        let (context, _all, stats) = make_context();
        assert_eq!(stats.total_connections(), 1);

        context.subscribe("a/#", make_store("a/#"));
        context.subscribe("a/#", make_store("again"));
        assert_eq!(stats.total_subscriptions(), 2);

        context.message_published("a/x");
        assert_eq!(stats.total_published(), 1);

        stats.tick();
        assert_eq!(stats.avg_published("c1", 5).overall, 0.2);
    }

    #[tokio::test]
    async fn test_remove_subscription() {
        let (context, _all, _stats) = make_context();
        context.subscribe("a/#", make_store("a/#"));

        assert!(context.remove_subscription("a/#"));
        assert!(context.subscription_store("a/#").is_none());
        assert!(!context.remove_subscription("a/#"));
    }

    #[tokio::test]
    async fn test_clean_up_is_idempotent() {
        let (context, _all, _stats) = make_context();
        context.subscribe("a/#", make_store("a/#"));
        context.set_audit(MessageAudit::start("c1", LogSinkForTest));

        context.clean_up();
        assert!(!context.audit_running());
        context.clean_up();
    }

    struct LogSinkForTest;

    impl AuditSink for LogSinkForTest {
        fn consume(&mut self, _record: &MessageRecord) {}
    }
}
