//! Per-topic bookkeeping for a message store
//!
//! Tracks, for every topic seen by the owning store: how many of its
//! records are currently retained, the latest record, and whether the
//! topic is ticked for browsing. Entries are created lazily on first
//! message and only removed by `clear`.

use std::collections::HashMap;

use crate::message::{MessageRecord, PayloadFormat};

/// Live state for one topic
#[derive(Debug, Clone)]
struct TopicEntry {
    /// Records currently retained for this topic
    count: usize,
    /// Whether the topic is ticked for browsing
    visible: bool,
    /// Most recent record seen for this topic
    latest: Option<MessageRecord>,
}

/// One row of the topic summary table
#[derive(Debug, Clone)]
pub struct TopicSummaryRow {
    /// Topic name
    pub topic: String,
    /// Records currently retained for this topic
    pub count: usize,
    /// Whether the topic is ticked for browsing
    pub visible: bool,
    /// Most recent record seen for this topic
    pub latest: Option<MessageRecord>,
}

/// Count, latest-record and visibility tracking per topic
#[derive(Debug, Default)]
pub struct TopicIndex {
    entries: HashMap<String, TopicEntry>,
}

impl TopicIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Account for a newly stored record: bumps the topic count and replaces
    /// the latest record. The entry is created hidden on first sight; the
    /// owning store decides whether new topics start visible.
    pub fn increase(&mut self, record: &MessageRecord) {
        let entry = self
            .entries
            .entry(record.topic().to_owned())
            .or_insert(TopicEntry {
                count: 0,
                visible: false,
                latest: None,
            });

        entry.count += 1;
        entry.latest = Some(record.clone());
    }

    /// Account for a removed record. A decrease that would go below zero is
    /// a bookkeeping bug elsewhere; it is clamped and logged rather than
    /// stored as a negative count.
    pub fn decrease(&mut self, topic: &str) {
        match self.entries.get_mut(topic) {
            Some(entry) if entry.count > 0 => {
                entry.count -= 1;
            }
            Some(_) => {
                tracing::warn!(topic = %topic, "topic count decreased below zero; clamping");
            }
            None => {
                tracing::warn!(topic = %topic, "topic count decreased for unknown topic");
            }
        }
    }

    /// Records currently retained for `topic`, zero when unknown
    pub fn count_for(&self, topic: &str) -> usize {
        self.entries.get(topic).map_or(0, |entry| entry.count)
    }

    /// Whether the index has seen `topic`
    pub fn contains(&self, topic: &str) -> bool {
        self.entries.contains_key(topic)
    }

    /// Number of topics seen so far
    pub fn topic_count(&self) -> usize {
        self.entries.len()
    }

    /// All topics seen so far
    pub fn topics(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Whether `topic` is ticked for browsing; unknown topics are hidden
    pub fn is_visible(&self, topic: &str) -> bool {
        self.entries.get(topic).map_or(false, |entry| entry.visible)
    }

    /// Number of topics currently ticked for browsing
    pub fn visible_count(&self) -> usize {
        self.entries.values().filter(|entry| entry.visible).count()
    }

    /// Tick or untick one topic. Returns false for unknown topics.
    pub fn set_visible(&mut self, topic: &str, visible: bool) -> bool {
        match self.entries.get_mut(topic) {
            Some(entry) => {
                entry.visible = visible;
                true
            }
            None => false,
        }
    }

    /// Tick or untick every known topic
    pub fn set_visible_all(&mut self, visible: bool) {
        for entry in self.entries.values_mut() {
            entry.visible = visible;
        }
    }

    /// Flip the tick of each listed topic; unknown topics are ignored
    pub fn toggle_visible<'a>(&mut self, topics: impl IntoIterator<Item = &'a str>) {
        for topic in topics {
            if let Some(entry) = self.entries.get_mut(topic) {
                entry.visible = !entry.visible;
            }
        }
    }

    /// Latest record seen for `topic`
    pub fn latest(&self, topic: &str) -> Option<&MessageRecord> {
        self.entries.get(topic).and_then(|entry| entry.latest.as_ref())
    }

    /// Re-render the cached latest record of every topic with `format`
    pub fn reformat_latest(&mut self, format: &dyn PayloadFormat) {
        for entry in self.entries.values_mut() {
            if let Some(latest) = entry.latest.as_mut() {
                latest.ensure_formatted(format);
            }
        }
    }

    /// Snapshot of all rows, sorted by topic for stable presentation
    pub fn summary(&self) -> Vec<TopicSummaryRow> {
        let mut rows: Vec<TopicSummaryRow> = self
            .entries
            .iter()
            .map(|(topic, entry)| TopicSummaryRow {
                topic: topic.clone(),
                count: entry.count,
                visible: entry.visible,
                latest: entry.latest.clone(),
            })
            .collect();

        rows.sort_by(|a, b| a.topic.cmp(&b.topic));
        rows
    }

    /// Forget every topic
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::message::Qos;

    fn make_record(topic: &str, payload: &str) -> MessageRecord {
        MessageRecord::new(
            topic,
            Bytes::copy_from_slice(payload.as_bytes()),
            Qos::AtMostOnce,
            false,
        )
    }

    #[test]
    fn test_unknown_topic_counts_zero() {
        let index = TopicIndex::new();
        assert_eq!(index.count_for("nope"), 0);
        assert!(!index.contains("nope"));
        assert!(!index.is_visible("nope"));
    }

    #[test]
    fn test_increase_and_decrease() {
        let mut index = TopicIndex::new();
        index.increase(&make_record("a", "1"));
        index.increase(&make_record("a", "2"));
        index.increase(&make_record("b", "3"));

        assert_eq!(index.count_for("a"), 2);
        assert_eq!(index.count_for("b"), 1);
        assert_eq!(index.topic_count(), 2);

        index.decrease("a");
        assert_eq!(index.count_for("a"), 1);
    }

    #[test]
    fn test_decrease_clamps_at_zero() {
        let mut index = TopicIndex::new();
        index.increase(&make_record("a", "1"));

        index.decrease("a");
        index.decrease("a");
        index.decrease("missing");

        assert_eq!(index.count_for("a"), 0);
        assert_eq!(index.count_for("missing"), 0);
    }

    #[test]
    fn test_latest_tracks_most_recent() {
        let mut index = TopicIndex::new();
        index.increase(&make_record("a", "first"));
        index.increase(&make_record("a", "second"));

        let latest = index.latest("a").unwrap();
        assert_eq!(latest.payload_text(), "second");
    }

    #[test]
    fn test_entries_survive_count_reaching_zero() {
        let mut index = TopicIndex::new();
        index.increase(&make_record("a", "1"));
        index.decrease("a");

        // The topic stays known with its latest record
        assert!(index.contains("a"));
        assert_eq!(index.count_for("a"), 0);
        assert!(index.latest("a").is_some());
    }

    #[test]
    fn test_visibility_operations() {
        let mut index = TopicIndex::new();
        index.increase(&make_record("a", "1"));
        index.increase(&make_record("b", "1"));

        // New topics start hidden
        assert_eq!(index.visible_count(), 0);

        assert!(index.set_visible("a", true));
        assert!(index.is_visible("a"));
        assert!(!index.set_visible("missing", true));

        index.set_visible_all(true);
        assert_eq!(index.visible_count(), 2);

        index.toggle_visible(["a", "missing"]);
        assert!(!index.is_visible("a"));
        assert!(index.is_visible("b"));
    }

    #[test]
    fn test_summary_sorted_by_topic() {
        let mut index = TopicIndex::new();
        index.increase(&make_record("b", "1"));
        index.increase(&make_record("a", "1"));
        index.increase(&make_record("a", "2"));

        let rows = index.summary();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].topic, "a");
        assert_eq!(rows[0].count, 2);
        assert_eq!(rows[1].topic, "b");
        assert_eq!(rows[1].count, 1);
    }

    #[test]
    fn test_clear_forgets_everything() {
        let mut index = TopicIndex::new();
        index.increase(&make_record("a", "1"));
        index.clear();

        assert_eq!(index.topic_count(), 0);
        assert!(index.summary().is_empty());
    }
}
