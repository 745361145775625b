//! Message audit trail
//!
//! Ingestion enqueues a copy of every received message; a background task
//! drains the queue into a pluggable sink. The queue is unbounded so the
//! ingestion path never waits on the sink, at the cost of a warning when
//! the sink falls behind.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::message::MessageRecord;

/// Consecutive records drained without the queue going idle before the
/// backlog warning fires
const BACKLOG_WARN_EVERY: u64 = 10_000;

/// Receives drained audit records, one at a time, in arrival order
pub trait AuditSink: Send + 'static {
    fn consume(&mut self, record: &MessageRecord);
}

/// Sink writing one structured log line per record under the `audit` target
#[derive(Debug, Default)]
pub struct LogSink;

impl AuditSink for LogSink {
    fn consume(&mut self, record: &MessageRecord) {
        tracing::info!(
            target: "audit",
            topic = %record.topic(),
            qos = record.qos().as_u8(),
            retained = record.retained(),
            timestamp = %record.timestamp(),
            payload = %record.payload_text(),
            "message"
        );
    }
}

/// Per-connection audit trail with a background drain task.
///
/// [`record`](MessageAudit::record) never blocks; after
/// [`stop`](MessageAudit::stop) it silently discards, and records still
/// queued at stop time are dropped.
#[derive(Debug)]
pub struct MessageAudit {
    connection: String,
    tx: mpsc::UnboundedSender<MessageRecord>,
    running: Arc<AtomicBool>,
    task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl MessageAudit {
    /// Spawn the drain task and return the handle ingestion records into
    pub fn start(connection: impl Into<String>, mut sink: impl AuditSink) -> Self {
        let connection = connection.into();
        let (tx, mut rx) = mpsc::unbounded_channel::<MessageRecord>();
        let running = Arc::new(AtomicBool::new(true));

        let flag = Arc::clone(&running);
        let name = connection.clone();
        let task = tokio::spawn(async move {
            'drain: while let Some(record) = rx.recv().await {
                if !flag.load(Ordering::Acquire) {
                    break;
                }
                sink.consume(&record);

                // Sweep whatever queued up behind it
                let mut streak: u64 = 1;
                loop {
                    match rx.try_recv() {
                        Ok(record) => {
                            sink.consume(&record);
                            streak += 1;
                            if streak > BACKLOG_WARN_EVERY {
                                tracing::warn!(
                                    connection = %name,
                                    backlog = rx.len(),
                                    "audit sink not keeping up"
                                );
                                streak = 0;
                            }
                        }
                        Err(mpsc::error::TryRecvError::Empty) => break,
                        Err(mpsc::error::TryRecvError::Disconnected) => break 'drain,
                    }
                }
            }
            tracing::debug!(connection = %name, "audit drain stopped");
        });

        Self {
            connection,
            tx,
            running,
            task: Mutex::new(Some(task)),
        }
    }

    /// Enqueue one record copy for the sink. Never blocks; a stopped
    /// audit discards silently.
    pub fn record(&self, record: MessageRecord) {
        if !self.running.load(Ordering::Acquire) {
            return;
        }
        let _ = self.tx.send(record);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stop the drain task, dropping anything still queued. Idempotent.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        if let Some(task) = self.task.lock().take() {
            task.abort();
            tracing::debug!(connection = %self.connection, "audit stopped");
        }
    }

    pub fn connection(&self) -> &str {
        &self.connection
    }
}
