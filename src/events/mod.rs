//! Store-change events for rendering consumers
//!
//! Each managed store owns one queue. Producers (ingestion, the garbage
//! collectors, view maintenance) publish while holding the store lock that
//! produced the change, so a consumer observes events in exactly the order
//! the mutations were applied to that store. Events carry record copies,
//! never references into the store, so consumers render without holding
//! any store lock.
//!
//! The consumer side drains in batches: one await for the first event,
//! then a non-blocking sweep of everything already queued. Dropping the
//! drain unregisters the consumer; later publishes are discarded silently.

use tokio::sync::mpsc;

use crate::message::MessageRecord;

/// One change applied to a managed store
#[derive(Debug, Clone)]
pub enum StoreEvent {
    /// A record was appended to the primary store. `newly_visible` is set
    /// when this message introduced its topic while every topic was shown,
    /// so the topic was auto-ticked for browsing.
    Stored {
        record: MessageRecord,
        newly_visible: bool,
    },
    /// A record left the primary store (hard cap on add, or collection)
    Evicted { record: MessageRecord },
    /// A record entered the browsable view
    BrowseAdded { record: MessageRecord },
    /// A record left the browsable view (view hard cap, or collection)
    BrowseRemoved { record: MessageRecord },
    /// A bulk visibility or filter change rebuilt the view. Consumers
    /// should re-snapshot the store instead of replaying deltas.
    ViewRefreshed,
}

/// Producer half of a store's event queue
#[derive(Debug, Clone)]
pub struct EventQueue {
    tx: mpsc::UnboundedSender<StoreEvent>,
}

/// Consumer half of a store's event queue
#[derive(Debug)]
pub struct EventDrain {
    rx: mpsc::UnboundedReceiver<StoreEvent>,
}

impl EventQueue {
    /// Create a connected queue/drain pair
    pub fn channel() -> (EventQueue, EventDrain) {
        let (tx, rx) = mpsc::unbounded_channel();
        (EventQueue { tx }, EventDrain { rx })
    }

    /// Publish an event. Never blocks; a missing consumer discards the
    /// event rather than failing the producer.
    pub fn publish(&self, event: StoreEvent) {
        let _ = self.tx.send(event);
    }
}

impl EventDrain {
    /// Wait for at least one event, then sweep everything already queued.
    ///
    /// Returns an empty batch once every producer handle is gone.
    pub async fn drain(&mut self) -> Vec<StoreEvent> {
        let first = match self.rx.recv().await {
            Some(event) => event,
            None => return Vec::new(),
        };

        let mut batch = vec![first];
        while let Ok(event) = self.rx.try_recv() {
            batch.push(event);
        }

        batch
    }

    /// Sweep everything already queued without waiting
    pub fn try_drain(&mut self) -> Vec<StoreEvent> {
        let mut batch = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            batch.push(event);
        }

        batch
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use tokio_test::{assert_pending, assert_ready};

    use super::*;
    use crate::message::Qos;

    fn make_record(topic: &str, payload: &str) -> MessageRecord {
        MessageRecord::new(
            topic,
            Bytes::copy_from_slice(payload.as_bytes()),
            Qos::AtMostOnce,
            false,
        )
    }

    #[tokio::test]
    async fn test_events_drain_in_publish_order() {
        let (queue, mut drain) = EventQueue::channel();

        queue.publish(StoreEvent::Stored {
            record: make_record("a", "1"),
            newly_visible: true,
        });
        queue.publish(StoreEvent::BrowseAdded {
            record: make_record("a", "2"),
        });
        queue.publish(StoreEvent::ViewRefreshed);

        let batch = drain.drain().await;
        assert_eq!(batch.len(), 3);
        assert!(matches!(batch[0], StoreEvent::Stored { .. }));
        assert!(matches!(batch[1], StoreEvent::BrowseAdded { .. }));
        assert!(matches!(batch[2], StoreEvent::ViewRefreshed));
    }

    #[tokio::test]
    async fn test_interleaved_producers_keep_fifo_order() {
        let (queue, mut drain) = EventQueue::channel();
        let other = queue.clone();

        for i in 0..10 {
            let producer = if i % 2 == 0 { &queue } else { &other };
            producer.publish(StoreEvent::Stored {
                record: make_record("t", &i.to_string()),
                newly_visible: false,
            });
        }

        let batch = drain.drain().await;
        let payloads: Vec<String> = batch
            .iter()
            .map(|event| match event {
                StoreEvent::Stored { record, .. } => record.payload_text().into_owned(),
                _ => panic!("unexpected event"),
            })
            .collect();

        let expected: Vec<String> = (0..10).map(|i| i.to_string()).collect();
        assert_eq!(payloads, expected);
    }

    #[tokio::test]
    async fn test_try_drain_does_not_wait() {
        let (queue, mut drain) = EventQueue::channel();
        assert!(drain.try_drain().is_empty());

        queue.publish(StoreEvent::ViewRefreshed);
        assert_eq!(drain.try_drain().len(), 1);
        assert!(drain.try_drain().is_empty());
    }

    #[test]
    fn test_drain_parks_until_first_publish() {
        let (queue, mut drain) = EventQueue::channel();
        let mut pending = tokio_test::task::spawn(drain.drain());

        // Empty queue: the drain parks instead of returning an empty batch
        assert_pending!(pending.poll());
        assert_pending!(pending.poll());

        queue.publish(StoreEvent::ViewRefreshed);
        assert!(pending.is_woken());

        let batch = assert_ready!(pending.poll());
        assert_eq!(batch.len(), 1);
        assert!(matches!(batch[0], StoreEvent::ViewRefreshed));
    }

    #[tokio::test]
    async fn test_publish_after_consumer_dropped_is_silent() {
        let (queue, drain) = EventQueue::channel();
        drop(drain);

        // Must not panic or error
        queue.publish(StoreEvent::ViewRefreshed);
    }

    #[tokio::test]
    async fn test_drain_empty_once_producers_gone() {
        let (queue, mut drain) = EventQueue::channel();
        queue.publish(StoreEvent::ViewRefreshed);
        drop(queue);

        assert_eq!(drain.drain().await.len(), 1);
        // All producers dropped and queue swept: closed
        assert!(drain.drain().await.is_empty());
    }
}
