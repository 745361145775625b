//! Bounded, arrival-ordered message buffer
//!
//! The sequence underlying both the primary store and the filtered view.
//! Index 0 is the oldest retained record. Two size thresholds apply: the
//! hard cap is enforced here on every add by evicting the oldest record,
//! the soft target is only reported (`exceeding_preferred_size`) and acted
//! on by the garbage collector.

use std::collections::VecDeque;

use crate::message::{MessageRecord, PayloadFormat};

use super::topics::TopicIndex;

/// Arrival-ordered record sequence with an embedded topic index
#[derive(Debug)]
pub struct MessageBuffer {
    /// Store name, for log context
    name: String,
    /// Soft size target for the garbage collector
    preferred_size: usize,
    /// Hard size cap enforced on add
    max_size: usize,
    /// Retained records, oldest at the front
    records: VecDeque<MessageRecord>,
    /// Per-topic counts, latest records and visibility flags
    topics: TopicIndex,
}

impl MessageBuffer {
    /// Create an empty buffer
    pub fn new(name: impl Into<String>, preferred_size: usize, max_size: usize) -> Self {
        Self {
            name: name.into(),
            preferred_size,
            max_size,
            records: VecDeque::new(),
            topics: TopicIndex::new(),
        }
    }

    /// Store name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a record, evicting and returning the oldest one when the
    /// buffer would exceed its hard cap.
    ///
    /// The topic index is updated for the added record and for the evicted
    /// one. A hard-cap eviction ignores the per-topic floor: bounding
    /// memory wins over fairness, and the affected topic recovers as new
    /// messages arrive. An empty topic string is a valid key.
    pub fn add(&mut self, record: MessageRecord) -> Option<MessageRecord> {
        self.topics.increase(&record);
        self.records.push_back(record);

        if self.records.len() <= self.max_size {
            return None;
        }

        let evicted = self.records.pop_front();
        if let Some(evicted) = &evicted {
            self.topics.decrease(evicted.topic());
            tracing::debug!(
                store = %self.name,
                id = evicted.id(),
                topic = %evicted.topic(),
                "hard cap reached, oldest record evicted"
            );
        }

        evicted
    }

    /// Remove the record at `index` (0 = oldest), updating the topic index
    pub fn remove(&mut self, index: usize) -> Option<MessageRecord> {
        let removed = self.records.remove(index);
        if let Some(removed) = &removed {
            self.topics.decrease(removed.topic());
        }

        removed
    }

    /// Drop every record and forget every topic
    pub fn clear(&mut self) {
        self.records.clear();
        self.topics.clear();
    }

    /// Number of retained records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the buffer holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether the buffer is above its soft size target
    pub fn exceeding_preferred_size(&self) -> bool {
        self.records.len() > self.preferred_size
    }

    /// Soft size target
    pub fn preferred_size(&self) -> usize {
        self.preferred_size
    }

    /// Hard size cap
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// The record at `index` (0 = oldest)
    pub fn get(&self, index: usize) -> Option<&MessageRecord> {
        self.records.get(index)
    }

    /// Iterate records oldest to newest. Double-ended, so view rebuilds
    /// can walk the history newest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &MessageRecord> {
        self.records.iter()
    }

    /// Copy out all records, oldest first
    pub fn snapshot(&self) -> Vec<MessageRecord> {
        self.records.iter().cloned().collect()
    }

    /// The embedded topic index
    pub fn topics(&self) -> &TopicIndex {
        &self.topics
    }

    /// Mutable access to the embedded topic index
    pub fn topics_mut(&mut self) -> &mut TopicIndex {
        &mut self.topics
    }

    /// Re-render every retained record and cached latest with `format`
    pub fn reformat_all(&mut self, format: &dyn PayloadFormat) {
        for record in self.records.iter_mut() {
            record.ensure_formatted(format);
        }
        self.topics.reformat_latest(format);
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

    fn make_buffer(preferred: usize, max: usize) -> MessageBuffer {
        MessageBuffer::new("test", preferred, max)
    }

    #[test]
    fn test_add_keeps_arrival_order() {
        let mut buffer = make_buffer(5, 10);
        buffer.add(make_record("a", "1"));
        buffer.add(make_record("b", "2"));
        buffer.add(make_record("a", "3"));

        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.get(0).unwrap().payload_text(), "1");
        assert_eq!(buffer.get(2).unwrap().payload_text(), "3");
    }

    #[test]
    fn test_add_enforces_hard_cap() {
        let mut buffer = make_buffer(2, 3);

        assert!(buffer.add(make_record("a", "1")).is_none());
        assert!(buffer.add(make_record("a", "2")).is_none());
        assert!(buffer.add(make_record("a", "3")).is_none());

        // Fourth add evicts the oldest
        let evicted = buffer.add(make_record("a", "4")).unwrap();
        assert_eq!(evicted.payload_text(), "1");
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.get(0).unwrap().payload_text(), "2");
    }

    #[test]
    fn test_size_never_exceeds_max() {
        let mut buffer = make_buffer(4, 6);
        for i in 0..50 {
            buffer.add(make_record("a", &i.to_string()));
            assert!(buffer.len() <= 6);
        }
        assert_eq!(buffer.len(), 6);
    }

    #[test]
    fn test_add_updates_topic_counts_for_added_and_evicted() {
        let mut buffer = make_buffer(2, 2);
        buffer.add(make_record("a", "1"));
        buffer.add(make_record("b", "2"));
        assert_eq!(buffer.topics().count_for("a"), 1);
        assert_eq!(buffer.topics().count_for("b"), 1);

        // Evicts the oldest record, which is on topic a
        buffer.add(make_record("b", "3"));
        assert_eq!(buffer.topics().count_for("a"), 0);
        assert_eq!(buffer.topics().count_for("b"), 2);

        // Topic a stays known even with no retained records
        assert!(buffer.topics().contains("a"));
    }

    #[test]
    fn test_remove_by_index() {
        let mut buffer = make_buffer(5, 10);
        buffer.add(make_record("a", "1"));
        buffer.add(make_record("b", "2"));
        buffer.add(make_record("a", "3"));

        let removed = buffer.remove(1).unwrap();
        assert_eq!(removed.topic(), "b");
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.topics().count_for("b"), 0);

        // Remaining order unchanged
        assert_eq!(buffer.get(0).unwrap().payload_text(), "1");
        assert_eq!(buffer.get(1).unwrap().payload_text(), "3");

        assert!(buffer.remove(5).is_none());
    }

    #[test]
    fn test_exceeding_preferred_size() {
        let mut buffer = make_buffer(2, 10);
        buffer.add(make_record("a", "1"));
        buffer.add(make_record("a", "2"));
        assert!(!buffer.exceeding_preferred_size());

        buffer.add(make_record("a", "3"));
        assert!(buffer.exceeding_preferred_size());
    }

    #[test]
    fn test_empty_topic_is_valid() {
        let mut buffer = make_buffer(5, 10);
        buffer.add(make_record("", "payload"));

        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.topics().count_for(""), 1);
    }

    #[test]
    fn test_clear_resets_records_and_topics() {
        let mut buffer = make_buffer(5, 10);
        buffer.add(make_record("a", "1"));
        buffer.add(make_record("b", "2"));

        buffer.clear();

        assert!(buffer.is_empty());
        assert_eq!(buffer.topics().topic_count(), 0);

        // Behaves as freshly constructed afterwards
        buffer.add(make_record("c", "3"));
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.topics().count_for("c"), 1);
    }

    #[test]
    fn test_snapshot_copies_in_order() {
        let mut buffer = make_buffer(5, 10);
        buffer.add(make_record("a", "1"));
        buffer.add(make_record("b", "2"));

        let snapshot = buffer.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].payload_text(), "1");
        assert_eq!(snapshot[1].payload_text(), "2");
    }

    #[test]
    fn test_iter_walks_either_direction() {
        let mut buffer = make_buffer(5, 10);
        buffer.add(make_record("a", "1"));
        buffer.add(make_record("a", "2"));
        buffer.add(make_record("a", "3"));

        let forward: Vec<_> = buffer.iter().map(|r| r.payload_text().into_owned()).collect();
        assert_eq!(forward, vec!["1", "2", "3"]);

        // Newest first, the order view rebuilds scan in
        let backward: Vec<_> = buffer
            .iter()
            .rev()
            .map(|r| r.payload_text().into_owned())
            .collect();
        assert_eq!(backward, vec!["3", "2", "1"]);
    }
}
