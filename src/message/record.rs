//! The message value type shared by every store.
//!
//! A record is built once on arrival (or replay) and then fanned out by
//! cloning: each store owns its copy, so re-formatting one copy never
//! affects another. Payload bytes are shared cheaply via `Bytes`.

use std::borrow::Cow;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use chrono::{DateTime, Utc};

use super::format::{FormatterId, PayloadFormat};

/// Process-wide record id source. Ids are unique and monotonically
/// increasing for the lifetime of the process.
static NEXT_RECORD_ID: AtomicU64 = AtomicU64::new(1);

fn next_record_id() -> u64 {
    NEXT_RECORD_ID.fetch_add(1, Ordering::Relaxed)
}

/// MQTT quality-of-service level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Qos {
    /// QoS 0
    AtMostOnce,
    /// QoS 1
    AtLeastOnce,
    /// QoS 2
    ExactlyOnce,
}

impl Qos {
    /// Convert from the wire value. Values above 2 clamp to `ExactlyOnce`.
    pub fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Qos::AtMostOnce,
            1 => Qos::AtLeastOnce,
            _ => Qos::ExactlyOnce,
        }
    }

    /// The wire value (0, 1 or 2)
    pub fn as_u8(self) -> u8 {
        match self {
            Qos::AtMostOnce => 0,
            Qos::AtLeastOnce => 1,
            Qos::ExactlyOnce => 2,
        }
    }
}

/// One received or replayed message
///
/// Immutable after construction apart from the formatted-payload cache,
/// which is re-rendered when the active formatter changes.
#[derive(Debug, Clone)]
pub struct MessageRecord {
    /// Process-wide unique id
    id: u64,
    /// Topic the message arrived on
    topic: String,
    /// Raw payload bytes as received
    payload: Bytes,
    /// Delivery QoS
    qos: Qos,
    /// Broker retained flag
    retained: bool,
    /// Arrival (or replayed) wall-clock time
    timestamp: DateTime<Utc>,
    /// Subscription patterns that matched this topic at arrival time,
    /// in registration order
    matching_subscriptions: Vec<String>,
    /// Rendered payload, keyed by the formatter that produced it
    formatted: Option<(FormatterId, String)>,
}

impl MessageRecord {
    /// Create a record for a message arriving now
    pub fn new(topic: impl Into<String>, payload: Bytes, qos: Qos, retained: bool) -> Self {
        Self::with_timestamp(topic, payload, qos, retained, Utc::now())
    }

    /// Create a record with an explicit timestamp (replay path)
    pub fn with_timestamp(
        topic: impl Into<String>,
        payload: Bytes,
        qos: Qos,
        retained: bool,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: next_record_id(),
            topic: topic.into(),
            payload,
            qos,
            retained,
            timestamp,
            matching_subscriptions: Vec::new(),
            formatted: None,
        }
    }

    /// Process-wide unique id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Topic the message arrived on
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Raw payload bytes
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Delivery QoS
    pub fn qos(&self) -> Qos {
        self.qos
    }

    /// Broker retained flag
    pub fn retained(&self) -> bool {
        self.retained
    }

    /// Arrival time
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Subscription patterns that matched at arrival time
    pub fn matching_subscriptions(&self) -> &[String] {
        &self.matching_subscriptions
    }

    /// Record which subscription patterns matched this message
    pub fn set_matching_subscriptions(&mut self, patterns: Vec<String>) {
        self.matching_subscriptions = patterns;
    }

    /// Render the payload with `format`, reusing the cached result when it
    /// was produced by the same formatter.
    pub fn ensure_formatted(&mut self, format: &dyn PayloadFormat) {
        let stale = match &self.formatted {
            Some((id, _)) => *id != format.id(),
            None => true,
        };

        if stale {
            self.formatted = Some((format.id(), format.format(&self.payload)));
        }
    }

    /// The cached formatted payload, if any formatter has run
    pub fn formatted(&self) -> Option<&str> {
        self.formatted.as_ref().map(|(_, text)| text.as_str())
    }

    /// Text to display for this payload: the formatted cache when present,
    /// otherwise a lossy UTF-8 decode of the raw bytes.
    pub fn payload_text(&self) -> Cow<'_, str> {
        match &self.formatted {
            Some((_, text)) => Cow::Borrowed(text.as_str()),
            None => String::from_utf8_lossy(&self.payload),
        }
    }
}
