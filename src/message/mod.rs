//! Message model: the record value type and the payload-formatting seam

pub mod format;
pub mod record;

pub use format::{FormatterId, PayloadFormat, PlainFormat};
pub use record::{MessageRecord, Qos};
