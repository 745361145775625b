//! Store capacity and garbage-collection configuration

use std::time::Duration;

/// Capacity parameters for a message store
///
/// Three thresholds govern retention:
/// - `max_size`: hard cap, enforced synchronously on every add by evicting
///   the oldest record.
/// - `preferred_size`: soft target the garbage collector trims toward.
/// - `min_per_topic`: fairness floor; the collector never takes a topic
///   below this count, so a store full of single-message topics may settle
///   above `preferred_size` indefinitely.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Minimum records retained per topic during collection
    pub min_per_topic: usize,
    /// Soft size target for the garbage collector
    pub preferred_size: usize,
    /// Hard size cap enforced on add
    pub max_size: usize,
    /// Interval between garbage-collection passes
    pub gc_interval: Duration,
}

impl StoreConfig {
    /// Create a config with default values:
    /// 10 per topic / 5000 preferred / 10000 max, collecting every second.
    pub fn new() -> Self {
        Self {
            min_per_topic: 10,
            preferred_size: 5000,
            max_size: 10_000,
            gc_interval: Duration::from_secs(1),
        }
    }

    /// Set the per-topic retention floor
    pub fn min_per_topic(mut self, min_per_topic: usize) -> Self {
        self.min_per_topic = min_per_topic;
        self
    }

    /// Set the soft size target
    pub fn preferred_size(mut self, preferred_size: usize) -> Self {
        self.preferred_size = preferred_size;
        self
    }

    /// Set the hard size cap
    pub fn max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    /// Set the garbage-collection interval
    pub fn gc_interval(mut self, gc_interval: Duration) -> Self {
        self.gc_interval = gc_interval;
        self
    }

    /// Size both thresholds from one figure, the way connection stores are
    /// provisioned: `preferred = stored`, `max = 2 * stored`.
    pub fn sized_for(stored: usize) -> Self {
        Self::new().preferred_size(stored).max_size(stored * 2)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new()
    }
}
