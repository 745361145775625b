//! Bounded message retention with a browsable view
//!
//! A [`ManagedStore`] keeps every retained message in a primary buffer and
//! mirrors the browsable subset in a filtered view. Both live behind
//! `parking_lot` mutexes so ingestion stays a short synchronous call, and
//! background collectors trim each buffer back towards its preferred size.
//!
//! # Architecture
//!
//! ```text
//!                          Arc<ManagedStore>
//!                ┌────────────────────────────────────┐
//!                │ primary: Mutex<MessageBuffer>      │
//!                │   records in arrival order         │
//!                │   topics: TopicIndex               │
//!                │ view: Mutex<FilterView>            │
//!                │   browsed topics + content filters │
//!                └──────────────────┬─────────────────┘
//!                                   │
//!   message_received() ──► primary.add() ──► view.consider_for_inclusion()
//!                                   │
//!                                   ▼
//!                  EventQueue ──► drain() ──► rendering surface
//!
//!   [primary collector] tick ──► collect(primary)  ──► Evicted
//!   [view collector]    tick ──► collect(view)     ──► BrowseRemoved
//! ```
//!
//! # Fairness
//!
//! A collector only removes records whose topic still holds more than
//! `min_per_topic` entries, so one chatty topic cannot push quiet topics
//! out of the store. With enough distinct topics the per-topic floors add
//! up past the preferred size; the store then settles above it, bounded by
//! the hard cap enforced at ingestion.

pub mod buffer;
pub mod config;
pub mod filter;
mod gc;
pub mod managed;
pub mod topics;
pub mod view;

pub use buffer::MessageBuffer;
pub use config::StoreConfig;
pub use filter::{FilterId, FilterSet, MessageFilter};
pub use managed::ManagedStore;
pub use topics::{TopicIndex, TopicSummaryRow};
pub use view::{Admission, FilterView};
