//! Per-connection rolling window
//!
//! A ring of per-second bins plus one running-sum accumulator per
//! configured period. `bins[0]` is the open bin collecting the in-progress
//! second; everything behind it is closed. Each roll folds the closing bin
//! into every accumulator and subtracts the bin that falls out of each
//! period, so averages never rescan the ring.

use std::collections::{HashMap, VecDeque};

use super::interval::{IntervalCounts, RateAverage};

#[derive(Debug)]
pub struct ConnectionWindow {
    /// Front is the open bin, the rest are closed seconds, newest first
    bins: VecDeque<IntervalCounts>,
    /// Running sum of the last `period` closed bins, per period
    accumulators: HashMap<usize, IntervalCounts>,
    /// Ring depth: one more than the longest period
    remove_after: usize,
}

impl ConnectionWindow {
    pub fn new(periods: &[usize]) -> Self {
        let remove_after = periods.iter().copied().max().unwrap_or(0) + 1;
        let mut bins = VecDeque::with_capacity(remove_after);
        bins.push_front(IntervalCounts::default());

        Self {
            bins,
            accumulators: periods
                .iter()
                .map(|&period| (period, IntervalCounts::default()))
                .collect(),
            remove_after,
        }
    }

    /// Count one message in the open bin
    pub fn record<'a>(&mut self, topics: impl IntoIterator<Item = &'a str>) {
        if let Some(open) = self.bins.front_mut() {
            open.record(topics);
        }
    }

    /// Close the open bin and advance every accumulator by one second
    pub fn roll(&mut self) {
        for (&period, acc) in self.accumulators.iter_mut() {
            if let Some(closing) = self.bins.front() {
                acc.plus(closing);
            }
            // The bin at index `period` leaves that period's window
            if let Some(leaving) = self.bins.get(period) {
                acc.minus(leaving);
            }
        }

        self.bins.push_front(IntervalCounts::default());
        self.bins.truncate(self.remove_after);
    }

    /// Per-second rates over the given period; zero for unknown periods
    pub fn average(&self, period: usize) -> RateAverage {
        self.accumulators
            .get(&period)
            .map(|acc| acc.average(period))
            .unwrap_or_default()
    }

    /// The most recent closed bin, absent until the first roll
    pub fn last_closed(&self) -> Option<&IntervalCounts> {
        if self.bins.len() > 1 {
            self.bins.get(1)
        } else {
            None
        }
    }

    /// Zero one topic across every bin and accumulator
    pub fn reset_topic(&mut self, topic: &str) {
        for bin in &mut self.bins {
            bin.reset_topic(topic);
        }
        for acc in self.accumulators.values_mut() {
            acc.reset_topic(topic);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn publish(window: &mut ConnectionWindow, count: usize) {
        for _ in 0..count {
            window.record(["/test"]);
        }
    }

    #[test]
    fn test_rolling_average_over_five_seconds() {
        let mut window = ConnectionWindow::new(&[5]);

        publish(&mut window, 2);
        window.roll();
        assert_eq!(window.average(5).overall, 0.4);

        publish(&mut window, 5);
        window.roll();
        assert_eq!(window.average(5).overall, 1.4);

        window.roll();
        window.roll();
        window.roll();
        assert_eq!(window.average(5).overall, 1.4);

        window.roll();
        assert_eq!(window.average(5).overall, 1.0);

        window.roll();
        assert_eq!(window.average(5).overall, 0.0);
    }

    #[test]
    fn test_steady_feed_converges_to_rate() {
        let mut window = ConnectionWindow::new(&[5, 30, 300]);

        for _ in 0..35 {
            publish(&mut window, 1);
            window.roll();
        }

        assert_eq!(window.average(5).overall, 1.0);
        assert_eq!(window.average(30).overall, 1.0);
        assert_eq!(window.average(300).overall, 35.0 / 300.0);
    }

    #[test]
    fn test_per_topic_rates_follow_overall() {
        let mut window = ConnectionWindow::new(&[5]);

        window.record(["a", "b"]);
        window.record(["a"]);
        window.roll();

        let avg = window.average(5);
        assert_eq!(avg.overall, 0.4);
        assert_eq!(avg.rate_for("a"), 0.4);
        assert_eq!(avg.rate_for("b"), 0.2);
    }

    #[test]
    fn test_ring_depth_is_bounded() {
        let mut window = ConnectionWindow::new(&[5]);

        for _ in 0..20 {
            window.roll();
        }
        assert_eq!(window.bins.len(), 6);
    }

    #[test]
    fn test_last_closed_tracks_previous_second() {
        let mut window = ConnectionWindow::new(&[5]);
        assert!(window.last_closed().is_none());

        publish(&mut window, 3);
        window.roll();
        assert_eq!(window.last_closed().map(|bin| bin.overall()), Some(3));

        window.roll();
        assert_eq!(window.last_closed().map(|bin| bin.overall()), Some(0));
    }

    #[test]
    fn test_reset_topic_clears_history() {
        let mut window = ConnectionWindow::new(&[5]);

        publish(&mut window, 4);
        window.record(["other"]);
        window.roll();

        window.reset_topic("/test");

        let avg = window.average(5);
        assert_eq!(avg.rate_for("/test"), 0.0);
        assert_eq!(avg.rate_for("other"), 0.2);
        // Overall keeps counting messages the topic once contributed
        assert_eq!(avg.overall, 1.0);

        // Rolling the zeroed bins out does not underflow
        for _ in 0..6 {
            window.roll();
        }
        assert_eq!(window.average(5).overall, 0.0);
    }

    #[test]
    fn test_unknown_period_reads_zero() {
        let mut window = ConnectionWindow::new(&[5]);
        publish(&mut window, 2);
        window.roll();

        assert_eq!(window.average(30).overall, 0.0);
    }
}
