//! Content filters for the browsable view
//!
//! Filters are predicates registered by consumers (search boxes, payload
//! matchers) that keep records out of the filtered view without touching
//! the primary store. Registration hands back an id used to unregister the
//! filter when its owner goes away.

use crate::message::MessageRecord;

/// Handle for a registered content filter
pub type FilterId = u64;

/// A content predicate over records
pub trait MessageFilter: Send {
    /// Whether the filter currently has any effect. Inactive filters stay
    /// registered but should reject nothing.
    fn is_active(&self) -> bool {
        true
    }

    /// True to keep `record` out of the view.
    ///
    /// `side_effects` is true on the live ingestion path and false during
    /// background rebuilds, so stateful filters (match counters, search
    /// hit lists) are not double-counted when the view is reconstructed.
    fn rejects(&mut self, record: &MessageRecord, side_effects: bool) -> bool;
}

/// Registered content filters, evaluated in registration order
#[derive(Default)]
pub struct FilterSet {
    filters: Vec<(FilterId, Box<dyn MessageFilter>)>,
    next_id: FilterId,
}

impl FilterSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
            next_id: 1,
        }
    }

    /// Register a filter, returning the id to unregister it with
    pub fn add(&mut self, filter: Box<dyn MessageFilter>) -> FilterId {
        let id = self.next_id;
        self.next_id += 1;
        self.filters.push((id, filter));
        id
    }

    /// Unregister a filter. Returns false when the id is unknown.
    pub fn remove(&mut self, id: FilterId) -> bool {
        let before = self.filters.len();
        self.filters.retain(|(filter_id, _)| *filter_id != id);
        self.filters.len() != before
    }

    /// Whether any registered filter is active
    pub fn enabled(&self) -> bool {
        self.filters.iter().any(|(_, filter)| filter.is_active())
    }

    /// Number of registered filters
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Whether no filters are registered
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// True if any filter rejects `record`. Stops at the first rejection.
    pub fn rejects(&mut self, record: &MessageRecord, side_effects: bool) -> bool {
        for (_, filter) in self.filters.iter_mut() {
            if filter.rejects(record, side_effects) {
                return true;
            }
        }

        false
    }
}

impl std::fmt::Debug for FilterSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterSet")
            .field("filters", &self.filters.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}
