//! Interval counters
//!
//! One [`IntervalCounts`] holds the message counts for a single second, or
//! the running sum of a whole period. Summing and subtracting whole
//! intervals is what lets the rolling window advance in O(1) per tick.

use std::collections::HashMap;

/// Message counts over one interval: an overall figure plus per-topic detail
#[derive(Debug, Clone, Default)]
pub struct IntervalCounts {
    overall: u64,
    per_topic: HashMap<String, u64>,
}

impl IntervalCounts {
    /// Count one message against the given topics.
    ///
    /// The overall figure grows by one regardless of how many topics are
    /// listed; a message matching several subscriptions still counts once
    /// overall but once per matching topic.
    pub fn record<'a>(&mut self, topics: impl IntoIterator<Item = &'a str>) {
        self.overall += 1;
        for topic in topics {
            *self.per_topic.entry(topic.to_owned()).or_insert(0) += 1;
        }
    }

    /// Overall message count
    pub fn overall(&self) -> u64 {
        self.overall
    }

    /// Count for one topic, zero when the topic never appeared
    pub fn count_for(&self, topic: &str) -> u64 {
        self.per_topic.get(topic).copied().unwrap_or(0)
    }

    /// Fold another interval into this one
    pub fn plus(&mut self, other: &IntervalCounts) {
        self.overall += other.overall;
        for (topic, count) in &other.per_topic {
            *self.per_topic.entry(topic.clone()).or_insert(0) += count;
        }
    }

    /// Subtract another interval from this one. Counts saturate at zero and
    /// topics whose count reaches zero are dropped, so long-gone topics do
    /// not accumulate in the map.
    pub fn minus(&mut self, other: &IntervalCounts) {
        self.overall = self.overall.saturating_sub(other.overall);
        for (topic, count) in &other.per_topic {
            let remaining = match self.per_topic.get_mut(topic) {
                Some(current) => {
                    *current = current.saturating_sub(*count);
                    *current
                }
                None => continue,
            };
            if remaining == 0 {
                self.per_topic.remove(topic);
            }
        }
    }

    /// Drop one topic's count, leaving the overall figure untouched
    pub fn reset_topic(&mut self, topic: &str) {
        self.per_topic.remove(topic);
    }

    /// Divide every count by a period length, yielding per-second rates
    pub fn average(&self, period: usize) -> RateAverage {
        let divisor = period as f64;
        RateAverage {
            overall: self.overall as f64 / divisor,
            per_topic: self
                .per_topic
                .iter()
                .map(|(topic, count)| (topic.clone(), *count as f64 / divisor))
                .collect(),
        }
    }
}

/// Per-second rates derived from an accumulated interval
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateAverage {
    /// Messages per second across all topics
    pub overall: f64,
    /// Messages per second per topic
    pub per_topic: HashMap<String, f64>,
}

impl RateAverage {
    /// Rate for one topic, zero when the topic never appeared
    pub fn rate_for(&self, topic: &str) -> f64 {
        self.per_topic.get(topic).copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_counts_once_overall_per_topic_each() {
        let mut counts = IntervalCounts::default();
        counts.record(["a", "b"]);
        counts.record(["a"]);

        assert_eq!(counts.overall(), 2);
        assert_eq!(counts.count_for("a"), 2);
        assert_eq!(counts.count_for("b"), 1);
        assert_eq!(counts.count_for("c"), 0);
    }

    #[test]
    fn test_plus_then_minus_returns_to_start() {
        let mut acc = IntervalCounts::default();
        acc.record(["a"]);

        let mut bin = IntervalCounts::default();
        bin.record(["a", "b"]);
        bin.record(["b"]);

        acc.plus(&bin);
        assert_eq!(acc.overall(), 3);
        assert_eq!(acc.count_for("b"), 2);

        acc.minus(&bin);
        assert_eq!(acc.overall(), 1);
        assert_eq!(acc.count_for("a"), 1);
        assert_eq!(acc.count_for("b"), 0);
    }

    #[test]
    fn test_minus_saturates_and_drops_empty_topics() {
        let mut acc = IntervalCounts::default();
        acc.record(["a"]);

        let mut bin = IntervalCounts::default();
        bin.record(["a"]);
        bin.record(["a"]);
        bin.record(["b"]);

        acc.minus(&bin);
        assert_eq!(acc.overall(), 0);
        assert_eq!(acc.count_for("a"), 0);
        assert!(acc.per_topic.is_empty());
    }

    #[test]
    fn test_reset_topic_keeps_overall() {
        let mut counts = IntervalCounts::default();
        counts.record(["a"]);
        counts.record(["b"]);

        counts.reset_topic("a");
        assert_eq!(counts.overall(), 2);
        assert_eq!(counts.count_for("a"), 0);
        assert_eq!(counts.count_for("b"), 1);
    }

    #[test]
    fn test_average_divides_by_period() {
        let mut counts = IntervalCounts::default();
        for _ in 0..7 {
            counts.record(["a"]);
        }

        let avg = counts.average(5);
        assert_eq!(avg.overall, 1.4);
        assert_eq!(avg.rate_for("a"), 1.4);
        assert_eq!(avg.rate_for("missing"), 0.0);
    }
}
