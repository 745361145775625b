//! Garbage collection for message stores
//!
//! Each managed store runs two periodic collectors, one over the primary
//! buffer and one over the filtered view. A pass only runs while the
//! buffer is above its preferred size; it walks records oldest to newest
//! and removes those whose topic holds more than the per-topic floor,
//! re-checking the size after every removal. Eviction is therefore biased
//! toward old records, and a store whose topics are all at the floor is
//! left above its preferred size on purpose: the floor wins over the soft
//! target, and the store settles near the sum of the per-topic floors.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::events::StoreEvent;
use crate::message::MessageRecord;

use super::buffer::MessageBuffer;
use super::managed::ManagedStore;

/// Run one collection pass over `buffer`, returning the removed records in
/// removal order. Does nothing while the buffer is at or below its
/// preferred size.
pub(crate) fn collect(buffer: &mut MessageBuffer, min_per_topic: usize) -> Vec<MessageRecord> {
    if !buffer.exceeding_preferred_size() {
        return Vec::new();
    }

    let mut removed = Vec::new();
    let mut index = 0;

    while index < buffer.len() {
        let eligible = match buffer.get(index) {
            Some(record) => buffer.topics().count_for(record.topic()) > min_per_topic,
            None => break,
        };

        if !eligible {
            index += 1;
            continue;
        }

        // Removal shifts the next record into `index`, so don't advance
        if let Some(record) = buffer.remove(index) {
            removed.push(record);
        }

        if !buffer.exceeding_preferred_size() {
            break;
        }
    }

    removed
}

/// Spawn the periodic collector for the primary buffer.
///
/// Each pass removes and publishes while the primary lock is held, one
/// `Evicted` event per removed record, so consumers observe the removals
/// in application order relative to ingestion. Stops once the store's
/// running flag goes false.
pub(crate) fn spawn_primary_gc(store: &Arc<ManagedStore>) -> tokio::task::JoinHandle<()> {
    let store = Arc::clone(store);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(store.config().gc_interval);
        loop {
            ticker.tick().await;
            if !store.gc_running().load(Ordering::Acquire) {
                break;
            }

            {
                let mut primary = store.lock_primary();
                let removed = collect(&mut primary, store.config().min_per_topic);

                if !removed.is_empty() {
                    tracing::debug!(
                        store = %store.name(),
                        removed = removed.len(),
                        "primary store collected"
                    );
                }
                // Still under the lock; an interleaved add cannot slip
                // its events in between the removals and these
                for record in removed {
                    store.events().publish(StoreEvent::Evicted { record });
                }
            }
        }

        tracing::debug!(store = %store.name(), "primary collector stopped");
    })
}

/// Spawn the periodic collector for the filtered view.
///
/// Same pass as the primary collector, run over the view's buffer with
/// `BrowseRemoved` events published under the view lock so browsing
/// consumers can drop rows in order.
pub(crate) fn spawn_view_gc(store: &Arc<ManagedStore>) -> tokio::task::JoinHandle<()> {
    let store = Arc::clone(store);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(store.config().gc_interval);
        loop {
            ticker.tick().await;
            if !store.gc_running().load(Ordering::Acquire) {
                break;
            }

            {
                let mut view = store.lock_view();
                let removed = collect(view.buffer_mut(), store.config().min_per_topic);

                if !removed.is_empty() {
                    tracing::debug!(
                        store = %store.name(),
                        removed = removed.len(),
                        "view collected"
                    );
                }
                for record in removed {
                    store.events().publish(StoreEvent::BrowseRemoved { record });
                }
            }
        }

        tracing::debug!(store = %store.name(), "view collector stopped");
    })
}
