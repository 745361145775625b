//! Per-connection ingestion context
//!
//! Everything that sits between the network client's callbacks and the
//! stores: subscription registration and wildcard matching, the fan-out
//! of record copies, the audit trail, and connection lifecycle.

pub mod audit;
pub mod context;
pub mod subscription;

pub use audit::{AuditSink, LogSink, MessageAudit};
pub use context::ConnectionContext;
pub use subscription::{topic_matches, SubscriptionSet};
