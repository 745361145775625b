//! In-memory message retention, filtering and statistics engine for MQTT
//! inspection tools
//!
//! `mqtt-lens` sits between a network-facing MQTT client (a black box
//! that calls back with topic, payload, QoS and retained flag) and a
//! rendering consumer. It retains a bounded, per-topic-fair window of
//! messages per connection, derives a browsable filtered view from it,
//! feeds a typed event queue, and keeps rolling throughput statistics.
//!
//! # Data flow
//!
//! ```text
//!   MQTT client callback
//!          │
//!          ▼
//!   ConnectionContext::on_message
//!          │  builds a MessageRecord, matches subscriptions
//!          ├──► MessageAudit ──► AuditSink
//!          ├──► StatsRegistry (rolling averages, lifetime totals)
//!          ├──► per-subscription ManagedStore (one record copy each)
//!          └──► all-messages ManagedStore
//!                      │
//!        primary MessageBuffer ──► FilterView (browsed + filtered)
//!                      │                   │
//!               [primary collector]  [view collector]
//!                      │                   │
//!                      └──► StoreEvent queue ──► rendering consumer
//! ```
//!
//! Ingestion is synchronous under short lock sections, so the network
//! client may call in from a plain I/O thread with no executor. The
//! collectors, the stats rollover and the audit drain run as tokio
//! tasks, each stoppable through an explicit flag.

pub mod events;
pub mod message;
pub mod replay;
pub mod session;
pub mod stats;
pub mod store;

pub use events::{EventDrain, EventQueue, StoreEvent};
pub use message::{FormatterId, MessageRecord, PayloadFormat, PlainFormat, Qos};
pub use replay::{replay_into, ReplayEntry, ReplayError, ReplaySummary};
pub use session::{
    topic_matches, AuditSink, ConnectionContext, LogSink, MessageAudit, SubscriptionSet,
};
pub use stats::{RateAverage, StatsRegistry};
pub use store::{
    FilterId, FilterView, ManagedStore, MessageBuffer, MessageFilter, StoreConfig, TopicSummaryRow,
};
