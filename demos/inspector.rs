//! Topic inspector demo - runs the retention engine against a synthetic feed
//!
//! Run with: cargo run --example inspector
//!
//! This example demonstrates:
//! - Wiring a `ConnectionContext` with per-subscription stores
//! - Draining `StoreEvent`s the way a rendering surface would
//! - Narrowing the browse view by topic and by content filter
//! - Reading per-connection message rates from the statistics registry
//! - Shutting the background tasks down cleanly
//!
//! # Architecture
//!
//! ```text
//!   synthetic feed ──> ConnectionContext::on_message
//!                          │
//!        +─────────────────┼───────────────────+
//!        ▼                 ▼                   ▼
//!   "sensors/#" store  "alerts/#" store  all-messages store
//!                                              │
//!                                          StoreEvent queue ──> console
//! ```

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use mqtt_lens::{
    ConnectionContext, LogSink, ManagedStore, MessageAudit, MessageFilter, MessageRecord, Qos,
    StatsRegistry, StoreConfig, StoreEvent,
};

/// Hides records whose payload contains the needle
struct HideContaining(&'static str);

impl MessageFilter for HideContaining {
    fn rejects(&mut self, record: &MessageRecord, _side_effects: bool) -> bool {
        record.payload_text().contains(self.0)
    }
}

/// A started store for one subscription; its events go unwatched here
fn make_store(name: &str) -> Arc<ManagedStore> {
    let (store, _drain) = ManagedStore::new(name, StoreConfig::sized_for(500));
    store.start();
    store
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize logging; the audit trail logs under the "audit" target
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mqtt_lens=debug".parse()?)
                .add_directive("audit=info".parse()?),
        )
        .init();

    let stats = Arc::new(StatsRegistry::new());
    stats.start();

    let (all_messages, mut events) = ManagedStore::new("demo", StoreConfig::default());
    all_messages.start();

    let context = ConnectionContext::new("demo", Arc::clone(&all_messages), Arc::clone(&stats));
    context.subscribe("sensors/#", make_store("sensors/#"));
    context.subscribe("alerts/#", make_store("alerts/#"));
    context.set_audit(MessageAudit::start("demo", LogSink));

    // The render loop a UI would run; here it prints to the console
    let renderer = tokio::spawn(async move {
        loop {
            let batch = events.drain().await;
            if batch.is_empty() {
                break;
            }
            for event in batch {
                match event {
                    StoreEvent::Stored {
                        record,
                        newly_visible,
                    } => println!(
                        "  stored    {:<26} {:<8} (new topic shown: {})",
                        record.topic(),
                        record.payload_text(),
                        newly_visible
                    ),
                    StoreEvent::BrowseAdded { record } => {
                        println!("  browse +  {}", record.topic());
                    }
                    StoreEvent::BrowseRemoved { record } => {
                        println!("  browse -  {}", record.topic());
                    }
                    StoreEvent::Evicted { record } => {
                        println!("  evicted   {}", record.topic());
                    }
                    StoreEvent::ViewRefreshed => println!("  view refreshed"),
                }
            }
        }
    });

    println!("=== Feeding synthetic traffic ===");
    let feed = [
        ("sensors/hall/temperature", "21.3"),
        ("sensors/hall/humidity", "48"),
        ("sensors/roof/temperature", "19.8"),
        ("alerts/door", "open"),
        ("sensors/hall/temperature", "21.4"),
        // Matches no subscription; still retained and audited
        ("devices/gateway", "offline"),
        ("sensors/roof/temperature", "19.9"),
        ("alerts/door", "closed"),
    ];
    for (topic, payload) in feed {
        context.on_message(
            topic,
            Bytes::from_static(payload.as_bytes()),
            Qos::AtMostOnce,
            false,
        );
        tokio::time::sleep(Duration::from_millis(150)).await;
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    println!();
    println!("=== Hiding sensors/hall/humidity from the browse view ===");
    all_messages.set_show_value("sensors/hall/humidity", false);

    println!();
    println!("=== Content filter: hide payloads containing \"offline\" ===");
    let filter = all_messages.add_filter(Box::new(HideContaining("offline")));
    all_messages.rebuild_view();
    tokio::time::sleep(Duration::from_millis(100)).await;

    println!();
    println!("=== Topic summary ===");
    for row in all_messages.topic_summary() {
        println!(
            "  {:<28} count={:<3} shown={}",
            row.topic, row.count, row.visible
        );
    }
    println!();
    println!(
        "Browse view holds {} of {} retained messages",
        all_messages.messages().len(),
        all_messages.message_count()
    );

    println!();
    println!("=== Removing the content filter restores the hidden record ===");
    all_messages.remove_filter(filter);
    all_messages.rebuild_view();
    println!(
        "Browse view now holds {} messages",
        all_messages.messages().len()
    );

    println!();
    println!("=== Rates over the last 5 seconds ===");
    let rates = stats.avg_received("demo", 5);
    println!("  overall      {:.1} msg/s", rates.overall);
    for (pattern, rate) in &rates.per_topic {
        println!("  {:<12} {:.1} msg/s", pattern, rate);
    }
    println!(
        "  lifetime: {} received / {} published",
        stats.total_received(),
        stats.total_published()
    );

    // Shut down: renderer first, then collectors, audit and rollover
    renderer.abort();
    context.clean_up();
    stats.stop();

    Ok(())
}
