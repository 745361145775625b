//! The managed message store
//!
//! Pairs a primary buffer with its filtered view behind one facade: a
//! synchronous ingestion entry point, snapshot accessors for rendering,
//! visibility and content-filter management, and the lifecycle of the two
//! background collectors. All mutation happens under short lock sections;
//! when both stores are involved the primary lock is taken before the
//! view lock, everywhere. Events are published while the producing lock
//! is held, so consumers observe changes in application order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::events::{EventDrain, EventQueue, StoreEvent};
use crate::message::{MessageRecord, PayloadFormat, PlainFormat};

use super::buffer::MessageBuffer;
use super::config::StoreConfig;
use super::filter::{FilterId, MessageFilter};
use super::gc;
use super::topics::TopicSummaryRow;
use super::view::FilterView;

/// Bounded message store with a browsable filtered view
///
/// Constructed together with the drain half of its event queue; dropping
/// the drain simply discards further events. Call [`start`] to run the
/// background collectors and [`clean_up`] exactly once when the owning
/// surface closes, so no ticking task is leaked.
///
/// [`start`]: ManagedStore::start
/// [`clean_up`]: ManagedStore::clean_up
pub struct ManagedStore {
    /// Store name, used in log context
    name: String,
    /// Capacity and collection parameters
    config: StoreConfig,
    /// All retained messages in arrival order
    primary: Mutex<MessageBuffer>,
    /// The browsable subset
    view: Mutex<FilterView>,
    /// Formatter applied to arriving and stored records
    format: Mutex<Arc<dyn PayloadFormat>>,
    /// Producer half of the store's event queue
    events: EventQueue,
    /// Cancellation flag shared by both collectors
    gc_running: AtomicBool,
    /// Handles of the spawned collectors
    gc_tasks: Mutex<Vec<tokio::task::JoinHandle<()>>>,
}

impl ManagedStore {
    /// Create a store and the drain half of its event queue
    pub fn new(name: impl Into<String>, config: StoreConfig) -> (Arc<Self>, EventDrain) {
        let name = name.into();
        let (events, drain) = EventQueue::channel();

        let store = Arc::new(Self {
            primary: Mutex::new(MessageBuffer::new(
                name.clone(),
                config.preferred_size,
                config.max_size,
            )),
            view: Mutex::new(FilterView::new(&name, config.preferred_size, config.max_size)),
            format: Mutex::new(Arc::new(PlainFormat) as Arc<dyn PayloadFormat>),
            events,
            gc_running: AtomicBool::new(false),
            gc_tasks: Mutex::new(Vec::new()),
            name,
            config,
        });

        (store, drain)
    }

    /// Store name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Capacity and collection parameters
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Ingest one message.
    ///
    /// Fast and synchronous: formats the record, appends it to the primary
    /// buffer (evicting the oldest record past the hard cap), offers it to
    /// the view, and publishes the matching events. Safe to call from a
    /// network callback thread; it never waits on the rendering consumer.
    ///
    /// A message on a never-seen topic arrives visible when every known
    /// topic is currently shown, hidden otherwise.
    pub fn message_received(&self, mut record: MessageRecord) {
        let format = self.format.lock().clone();
        record.ensure_formatted(format.as_ref());

        let mut primary = self.primary.lock();
        let mut view = self.view.lock();

        let all_shown = view.browsed_count() == primary.topics().topic_count();
        let first_for_topic = !primary.topics().contains(record.topic());
        let newly_visible = all_shown && first_for_topic;

        let evicted = primary.add(record.clone());

        if newly_visible {
            primary.topics_mut().set_visible(record.topic(), true);
            view.apply_topic_filters([record.topic()], false, &primary);
        }

        let admission = view.consider_for_inclusion(&record);
        if admission.added {
            self.events.publish(StoreEvent::BrowseAdded {
                record: record.clone(),
            });
        }
        if let Some(view_evicted) = admission.evicted {
            self.events.publish(StoreEvent::BrowseRemoved {
                record: view_evicted,
            });
        }
        if let Some(evicted) = evicted {
            self.events.publish(StoreEvent::Evicted { record: evicted });
        }
        self.events.publish(StoreEvent::Stored {
            record,
            newly_visible,
        });
    }

    /// Copy out the browsable view, oldest first.
    ///
    /// This is deliberately the filtered sequence; the unfiltered history
    /// is reached through [`all_messages`](ManagedStore::all_messages).
    pub fn messages(&self) -> Vec<MessageRecord> {
        self.view.lock().messages()
    }

    /// Copy out every retained message, oldest first
    pub fn all_messages(&self) -> Vec<MessageRecord> {
        self.primary.lock().snapshot()
    }

    /// Number of retained messages in the primary buffer
    pub fn message_count(&self) -> usize {
        self.primary.lock().len()
    }

    /// Per-topic summary rows, sorted by topic
    pub fn topic_summary(&self) -> Vec<TopicSummaryRow> {
        self.primary.lock().topics().summary()
    }

    /// Every topic this store has seen
    pub fn all_topics(&self) -> Vec<String> {
        self.primary.lock().topics().topics()
    }

    /// Tick or untick one topic for browsing. Showing a topic pulls its
    /// recent history into the view; hiding rebuilds the view without it.
    pub fn set_show_value(&self, topic: &str, show: bool) {
        let mut primary = self.primary.lock();
        let mut view = self.view.lock();

        let rebuilt = if show {
            view.apply_topic_filters([topic], true, &primary)
        } else {
            view.remove_topic_filters([topic], &primary)
        };
        primary.topics_mut().set_visible(topic, show);

        if rebuilt {
            self.events.publish(StoreEvent::ViewRefreshed);
        }
    }

    /// Tick or untick every known topic for browsing
    pub fn set_all_show_values(&self, show: bool) {
        let mut primary = self.primary.lock();
        let mut view = self.view.lock();

        if show {
            view.apply_all_topic_filters(&primary);
        } else {
            view.remove_all_topic_filters();
        }
        primary.topics_mut().set_visible_all(show);

        self.events.publish(StoreEvent::ViewRefreshed);
    }

    /// Flip the browse tick of each listed topic
    pub fn toggle_show_values<'a>(&self, topics: impl IntoIterator<Item = &'a str>) {
        let mut primary = self.primary.lock();
        let mut view = self.view.lock();

        let mut to_show: Vec<&str> = Vec::new();
        let mut to_hide: Vec<&str> = Vec::new();
        for topic in topics {
            if view.is_browsed(topic) {
                to_hide.push(topic);
            } else {
                to_show.push(topic);
            }
        }

        let removed = view.remove_topic_filters(to_hide.iter().copied(), &primary);
        let applied = view.apply_topic_filters(to_show.iter().copied(), true, &primary);

        let flipped = to_hide.iter().copied().chain(to_show.iter().copied());
        primary.topics_mut().toggle_visible(flipped);

        if removed || applied {
            self.events.publish(StoreEvent::ViewRefreshed);
        }
    }

    /// True while some known topic is unticked, i.e. browsing is narrowed
    pub fn browse_filters_active(&self) -> bool {
        let primary = self.primary.lock();
        let view = self.view.lock();
        view.browsed_count() != primary.topics().topic_count()
    }

    /// Register a content filter. The view is not rebuilt here; call
    /// [`rebuild_view`](ManagedStore::rebuild_view) once the filter is set up.
    pub fn add_filter(&self, filter: Box<dyn MessageFilter>) -> FilterId {
        self.view.lock().add_filter(filter)
    }

    /// Unregister a content filter
    pub fn remove_filter(&self, id: FilterId) -> bool {
        self.view.lock().remove_filter(id)
    }

    /// Whether any registered content filter is active
    pub fn filters_enabled(&self) -> bool {
        self.view.lock().filters_enabled()
    }

    /// Rebuild the view from the primary store, typically after content
    /// filters changed. Filter evaluation runs without side effects.
    pub fn rebuild_view(&self) {
        let primary = self.primary.lock();
        let mut view = self.view.lock();
        view.rebuild(&primary);
        self.events.publish(StoreEvent::ViewRefreshed);
    }

    /// Swap the active payload formatter and re-render retained records.
    /// A formatter with the current id is a no-op.
    pub fn set_format(&self, format: Arc<dyn PayloadFormat>) {
        {
            let mut current = self.format.lock();
            if current.id() == format.id() {
                return;
            }
            *current = Arc::clone(&format);
        }

        let mut primary = self.primary.lock();
        let mut view = self.view.lock();
        primary.reformat_all(format.as_ref());
        view.reformat_all(format.as_ref());

        self.events.publish(StoreEvent::ViewRefreshed);
    }

    /// The active payload formatter
    pub fn format(&self) -> Arc<dyn PayloadFormat> {
        self.format.lock().clone()
    }

    /// Empty both stores and the topic index. Registered content filters
    /// survive; a fresh message stream starts from a blank store.
    pub fn clear(&self) {
        let mut primary = self.primary.lock();
        let mut view = self.view.lock();

        primary.clear();
        view.remove_all_topic_filters();

        self.events.publish(StoreEvent::ViewRefreshed);
    }

    /// Spawn the two background collectors. Calling twice is a no-op.
    pub fn start(self: &Arc<Self>) {
        let mut tasks = self.gc_tasks.lock();
        if !tasks.is_empty() {
            return;
        }

        self.gc_running.store(true, Ordering::Release);
        tasks.push(gc::spawn_primary_gc(self));
        tasks.push(gc::spawn_view_gc(self));

        tracing::debug!(store = %self.name, "collectors started");
    }

    /// Stop the background collectors.
    ///
    /// Must be called when the owning surface closes; a store that is
    /// never cleaned up leaks two ticking tasks. Idempotent.
    pub fn clean_up(&self) {
        self.gc_running.store(false, Ordering::Release);

        let mut tasks = self.gc_tasks.lock();
        if tasks.is_empty() {
            return;
        }
        for task in tasks.drain(..) {
            task.abort();
        }

        tracing::debug!(store = %self.name, "collectors stopped");
    }

    pub(crate) fn lock_primary(&self) -> MutexGuard<'_, MessageBuffer> {
        self.primary.lock()
    }

    pub(crate) fn lock_view(&self) -> MutexGuard<'_, FilterView> {
        self.view.lock()
    }

    pub(crate) fn events(&self) -> &EventQueue {
        &self.events
    }

    pub(crate) fn gc_running(&self) -> &AtomicBool {
        &self.gc_running
    }
}

impl std::fmt::Debug for ManagedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedStore")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish()
    }
}
