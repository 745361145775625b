//! Process-wide statistics registry
//!
//! One instance per process, shared as `Arc<StatsRegistry>`. Ingestion
//! reports every received and published message; a once-a-second rollover
//! task closes the in-progress bin of every connection window. Reads are
//! cheap snapshots and never mutate the windows.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::interval::RateAverage;
use super::window::ConnectionWindow;

/// Rolling-average periods tracked for every connection, in seconds
pub const DEFAULT_PERIODS: [usize; 3] = [5, 30, 300];

/// Per-connection rolling throughput figures plus lifetime totals.
///
/// Received and published traffic roll in separate windows under separate
/// locks; a message is never counted in both. Lifetime totals are plain
/// atomics with setters, so a persistence collaborator can restore them at
/// startup and read them back at shutdown.
#[derive(Debug)]
pub struct StatsRegistry {
    /// Periods every window tracks, in seconds
    periods: Vec<usize>,
    /// How often the rollover task closes bins
    rollover_interval: Duration,
    received: Mutex<HashMap<String, ConnectionWindow>>,
    published: Mutex<HashMap<String, ConnectionWindow>>,
    messages_received: AtomicU64,
    messages_published: AtomicU64,
    connections: AtomicU64,
    subscriptions: AtomicU64,
    rollover_running: AtomicBool,
    rollover_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl StatsRegistry {
    /// Registry with the standard 5s/30s/300s periods
    pub fn new() -> Self {
        Self::with_periods(&DEFAULT_PERIODS)
    }

    pub fn with_periods(periods: &[usize]) -> Self {
        Self {
            periods: periods.to_vec(),
            rollover_interval: Duration::from_secs(1),
            received: Mutex::new(HashMap::new()),
            published: Mutex::new(HashMap::new()),
            messages_received: AtomicU64::new(0),
            messages_published: AtomicU64::new(0),
            connections: AtomicU64::new(0),
            subscriptions: AtomicU64::new(0),
            rollover_running: AtomicBool::new(false),
            rollover_task: Mutex::new(None),
        }
    }

    /// Override the rollover cadence, mainly for tests
    pub fn rollover_interval(mut self, interval: Duration) -> Self {
        self.rollover_interval = interval;
        self
    }

    /// Count one received message against the subscriptions it matched.
    /// The overall figure grows by one; each matching topic grows by one.
    pub fn message_received(&self, connection_id: &str, matching_topics: &[String]) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);

        let mut received = self.received.lock();
        let window = received
            .entry(connection_id.to_owned())
            .or_insert_with(|| ConnectionWindow::new(&self.periods));
        window.record(matching_topics.iter().map(String::as_str));
    }

    /// Count one published message against its topic
    pub fn message_published(&self, connection_id: &str, topic: &str) {
        self.messages_published.fetch_add(1, Ordering::Relaxed);

        let mut published = self.published.lock();
        let window = published
            .entry(connection_id.to_owned())
            .or_insert_with(|| ConnectionWindow::new(&self.periods));
        window.record([topic]);
    }

    /// Close the in-progress second for every connection window
    pub fn tick(&self) {
        for window in self.published.lock().values_mut() {
            window.roll();
        }
        for window in self.received.lock().values_mut() {
            window.roll();
        }
    }

    /// Rolling received rates; zero for unknown connections or periods
    pub fn avg_received(&self, connection_id: &str, period: usize) -> RateAverage {
        self.received
            .lock()
            .get(connection_id)
            .map(|window| window.average(period))
            .unwrap_or_default()
    }

    /// Rolling published rates; zero for unknown connections or periods
    pub fn avg_published(&self, connection_id: &str, period: usize) -> RateAverage {
        self.published
            .lock()
            .get(connection_id)
            .map(|window| window.average(period))
            .unwrap_or_default()
    }

    /// Messages received in the last closed second, across all connections
    pub fn received_overall_last_second(&self) -> u64 {
        self.received
            .lock()
            .values()
            .filter_map(|window| window.last_closed())
            .map(|bin| bin.overall())
            .sum()
    }

    /// Messages published in the last closed second, across all connections
    pub fn published_overall_last_second(&self) -> u64 {
        self.published
            .lock()
            .values()
            .filter_map(|window| window.last_closed())
            .map(|bin| bin.overall())
            .sum()
    }

    /// Drop both windows of a connection; they are recreated lazily on the
    /// next message
    pub fn reset_connection(&self, connection_id: &str) {
        self.received.lock().remove(connection_id);
        self.published.lock().remove(connection_id);
    }

    /// Zero one topic in a connection's received window, history included
    pub fn reset_topic(&self, connection_id: &str, topic: &str) {
        if let Some(window) = self.received.lock().get_mut(connection_id) {
            window.reset_topic(topic);
        }
    }

    /// Bump the lifetime connection total
    pub fn new_connection(&self) {
        self.connections.fetch_add(1, Ordering::Relaxed);
    }

    /// Bump the lifetime subscription total
    pub fn new_subscription(&self) {
        self.subscriptions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    pub fn set_total_received(&self, value: u64) {
        self.messages_received.store(value, Ordering::Relaxed);
    }

    pub fn total_published(&self) -> u64 {
        self.messages_published.load(Ordering::Relaxed)
    }

    pub fn set_total_published(&self, value: u64) {
        self.messages_published.store(value, Ordering::Relaxed);
    }

    pub fn total_connections(&self) -> u64 {
        self.connections.load(Ordering::Relaxed)
    }

    pub fn set_total_connections(&self, value: u64) {
        self.connections.store(value, Ordering::Relaxed);
    }

    pub fn total_subscriptions(&self) -> u64 {
        self.subscriptions.load(Ordering::Relaxed)
    }

    pub fn set_total_subscriptions(&self, value: u64) {
        self.subscriptions.store(value, Ordering::Relaxed);
    }

    /// Spawn the once-a-second rollover task. Calling twice is a no-op.
    pub fn start(self: &Arc<Self>) {
        let mut task = self.rollover_task.lock();
        if task.is_some() {
            return;
        }

        self.rollover_running.store(true, Ordering::Release);
        let registry = Arc::clone(self);
        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(registry.rollover_interval);
            loop {
                ticker.tick().await;
                if !registry.rollover_running.load(Ordering::Acquire) {
                    break;
                }
                registry.tick();
            }
            tracing::debug!("stats rollover stopped");
        }));

        tracing::debug!("stats rollover started");
    }

    /// Stop the rollover task. Idempotent.
    pub fn stop(&self) {
        self.rollover_running.store(false, Ordering::Release);
        if let Some(task) = self.rollover_task.lock().take() {
            task.abort();
        }
    }
}

impl Default for StatsRegistry {
    fn default() -> Self {
        Self::new()
    }
}
