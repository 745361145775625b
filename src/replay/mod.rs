//! Message log replay
//!
//! Feeds already-parsed log entries back into a store, so a recorded
//! session can be browsed like a live one. Parsing itself happens in a
//! collaborator; this module defines the entry and error vocabulary it
//! produces and the partial-result loading loop. One bad line never
//! aborts the batch.

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::message::{MessageRecord, Qos};
use crate::store::ManagedStore;

/// One successfully parsed log line
#[derive(Debug, Clone)]
pub struct ReplayEntry {
    /// Topic the message was recorded under
    pub topic: String,
    /// Decoded payload
    pub payload: Bytes,
    /// QoS the message was received with
    pub qos: Qos,
    /// Whether the broker delivered it as retained
    pub retained: bool,
    /// Original arrival time from the log
    pub timestamp: DateTime<Utc>,
}

/// Why a log line was rejected by the parser
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayError {
    /// Entry carries no topic
    MissingTopic,
    /// QoS outside the 0..=2 range
    InvalidQos(u8),
    /// Entry could not be decoded at all
    Malformed(String),
}

impl std::fmt::Display for ReplayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplayError::MissingTopic => write!(f, "Log entry has no topic"),
            ReplayError::InvalidQos(qos) => write!(f, "Invalid QoS value: {}", qos),
            ReplayError::Malformed(reason) => write!(f, "Malformed log entry: {}", reason),
        }
    }
}

impl std::error::Error for ReplayError {}

/// Outcome of one replay batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Entries stored
    pub loaded: usize,
    /// Entries rejected by the parser
    pub failed: usize,
}

/// Feed a batch of parse results into a store.
///
/// Each good entry becomes a fresh record carrying the logged timestamp
/// and no matching subscriptions; each failure is counted and logged at
/// warn level. The store applies its usual capacity rules, so replaying
/// more than `max_size` lines keeps only the newest.
pub fn replay_into<I>(store: &ManagedStore, entries: I) -> ReplaySummary
where
    I: IntoIterator<Item = Result<ReplayEntry, ReplayError>>,
{
    let mut summary = ReplaySummary::default();

    for entry in entries {
        match entry {
            Ok(entry) => {
                let record = MessageRecord::with_timestamp(
                    entry.topic,
                    entry.payload,
                    entry.qos,
                    entry.retained,
                    entry.timestamp,
                );
                store.message_received(record);
                summary.loaded += 1;
            }
            Err(error) => {
                summary.failed += 1;
                tracing::warn!(store = %store.name(), error = %error, "replay entry rejected");
            }
        }
    }

    tracing::debug!(
        store = %store.name(),
        loaded = summary.loaded,
        failed = summary.failed,
        "replay finished"
    );
    summary
}
