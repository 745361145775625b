//! Browsable view derived from a primary store
//!
//! Membership is a function of the primary store's content, the set of
//! browsed (visible) topics, and the registered content filters. The view
//! is maintained incrementally as messages arrive; bulk visibility changes
//! rebuild it from the primary store instead, newest records first, up to
//! the view's own preferred size. Browsing therefore shows recent history:
//! very old records of a newly shown topic may stay out of the view even
//! though the primary store still holds them.

use std::collections::HashSet;

use crate::message::{MessageRecord, PayloadFormat};

use super::buffer::MessageBuffer;
use super::filter::{FilterId, FilterSet, MessageFilter};

/// Outcome of offering one record to the view
#[derive(Debug)]
pub struct Admission {
    /// Whether the record entered the view
    pub added: bool,
    /// Record the view evicted to stay under its hard cap
    pub evicted: Option<MessageRecord>,
}

impl Admission {
    fn excluded() -> Self {
        Self {
            added: false,
            evicted: None,
        }
    }
}

/// Filtered, browsable companion to a primary message buffer
#[derive(Debug)]
pub struct FilterView {
    /// View's own bounded sequence with its own topic counts
    buffer: MessageBuffer,
    /// Topics currently ticked for browsing
    browsed: HashSet<String>,
    /// Registered content filters
    filters: FilterSet,
}

impl FilterView {
    /// Create an empty view sized like its primary store
    pub fn new(name: &str, preferred_size: usize, max_size: usize) -> Self {
        Self {
            buffer: MessageBuffer::new(format!("filtered-{name}"), preferred_size, max_size),
            browsed: HashSet::new(),
            filters: FilterSet::new(),
        }
    }

    /// Offer a freshly arrived record to the view.
    ///
    /// The record is admitted when its topic is browsed and no content
    /// filter rejects it. Filters are evaluated before the topic check so
    /// stateful filters observe every arriving record, browsed or not.
    pub fn consider_for_inclusion(&mut self, record: &MessageRecord) -> Admission {
        let rejected = self.filters.rejects(record, true);
        if rejected || !self.browsed.contains(record.topic()) {
            return Admission::excluded();
        }

        let evicted = self.buffer.add(record.clone());
        Admission {
            added: true,
            evicted,
        }
    }

    /// Mark topics as browsed. With `rebuild` set, a change to the browsed
    /// set reconstructs the view from `primary`. Returns whether a rebuild
    /// ran.
    ///
    /// The ingestion fast path passes `rebuild = false` when auto-showing a
    /// brand-new topic, since the only candidate record is the one it is
    /// about to offer.
    pub fn apply_topic_filters<I, S>(&mut self, topics: I, rebuild: bool, primary: &MessageBuffer) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut updated = false;
        for topic in topics {
            if self.browsed.insert(topic.into()) {
                updated = true;
            }
        }

        if updated && rebuild {
            self.rebuild(primary);
            return true;
        }

        false
    }

    /// Unmark topics as browsed. Hiding cannot be done incrementally, so
    /// any change reconstructs the view. Returns whether a rebuild ran.
    pub fn remove_topic_filters<'a, I>(&mut self, topics: I, primary: &MessageBuffer) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut updated = false;
        for topic in topics {
            if self.browsed.remove(topic) {
                updated = true;
            }
        }

        if updated {
            self.rebuild(primary);
        }

        updated
    }

    /// Mark every topic known to `primary` as browsed and rebuild the view.
    ///
    /// The rebuild runs even when every topic was browsed already, so
    /// records an earlier content filter kept out are pulled back in once
    /// that filter is gone.
    pub fn apply_all_topic_filters(&mut self, primary: &MessageBuffer) {
        for topic in primary.topics().topics() {
            self.browsed.insert(topic);
        }
        self.rebuild(primary);
    }

    /// Unmark every topic and empty the view without scanning the primary
    pub fn remove_all_topic_filters(&mut self) {
        self.browsed.clear();
        self.buffer.clear();
    }

    /// Whether `topic` is currently browsed
    pub fn is_browsed(&self, topic: &str) -> bool {
        self.browsed.contains(topic)
    }

    /// Number of browsed topics
    pub fn browsed_count(&self) -> usize {
        self.browsed.len()
    }

    /// True if ANY registered filter rejects `record`; side effects only
    /// run when `side_effects` is set
    pub fn filter_message(&mut self, record: &MessageRecord, side_effects: bool) -> bool {
        self.filters.rejects(record, side_effects)
    }

    /// Register a content filter
    pub fn add_filter(&mut self, filter: Box<dyn MessageFilter>) -> FilterId {
        self.filters.add(filter)
    }

    /// Unregister a content filter. The caller decides whether to rebuild.
    pub fn remove_filter(&mut self, id: FilterId) -> bool {
        self.filters.remove(id)
    }

    /// Whether any registered content filter is active
    pub fn filters_enabled(&self) -> bool {
        self.filters.enabled()
    }

    /// Reconstruct the view from the primary store.
    ///
    /// Scans newest to oldest, collecting records that are browsed and pass
    /// the filters, and stops once the view's preferred size is reached.
    /// Filter evaluation runs without side effects so match counters are
    /// not double-counted. Arrival order is restored on insertion.
    pub fn rebuild(&mut self, primary: &MessageBuffer) {
        self.buffer.clear();

        let cap = self.buffer.preferred_size();
        let mut matched: Vec<MessageRecord> = Vec::new();

        for record in primary.iter().rev() {
            if matched.len() >= cap {
                break;
            }

            if self.browsed.contains(record.topic()) && !self.filters.rejects(record, false) {
                matched.push(record.clone());
            }
        }

        for record in matched.into_iter().rev() {
            self.buffer.add(record);
        }

        tracing::debug!(
            store = %self.buffer.name(),
            records = self.buffer.len(),
            browsed = self.browsed.len(),
            "view rebuilt"
        );
    }

    /// Copy out the view's records, oldest first
    pub fn messages(&self) -> Vec<MessageRecord> {
        self.buffer.snapshot()
    }

    /// Number of records currently in the view
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether the view holds no records
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// The view's underlying buffer
    pub fn buffer(&self) -> &MessageBuffer {
        &self.buffer
    }

    /// Mutable access for the view's garbage collector
    pub(crate) fn buffer_mut(&mut self) -> &mut MessageBuffer {
        &mut self.buffer
    }

    /// Re-render every record in the view with `format`
    pub fn reformat_all(&mut self, format: &dyn PayloadFormat) {
        self.buffer.reformat_all(format);
    }
}
