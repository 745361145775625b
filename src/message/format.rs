//! Payload formatting seam
//!
//! Rendering a payload for display is delegated to an external collaborator
//! (pretty-printers, decoders, user scripts). The engine only needs a stable
//! identity per formatter so each record can cache the last rendering and
//! skip re-work until the active formatter changes.

/// Identity of a payload formatter, used to key per-record format caches.
///
/// Two formatters with the same id are assumed to produce identical output
/// for identical payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FormatterId(u64);

impl FormatterId {
    /// Create an id from a raw value. Embedders hand out their own values;
    /// 0 is reserved for [`PlainFormat`].
    pub const fn new(raw: u64) -> Self {
        FormatterId(raw)
    }
}

/// A payload renderer
///
/// Implementations must be pure functions of the payload bytes: the result
/// is cached per record and replayed on later reads.
pub trait PayloadFormat: Send + Sync {
    /// Stable identity of this formatter
    fn id(&self) -> FormatterId;

    /// Render a payload for display
    fn format(&self, payload: &[u8]) -> String;
}

/// Default formatter: lossy UTF-8 passthrough
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainFormat;

impl PayloadFormat for PlainFormat {
    fn id(&self) -> FormatterId {
        FormatterId::new(0)
    }

    fn format(&self, payload: &[u8]) -> String {
        String::from_utf8_lossy(payload).into_owned()
    }
}
