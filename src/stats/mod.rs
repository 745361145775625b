//! Rolling throughput statistics
//!
//! Counts received and published messages per connection in per-second
//! bins and keeps O(1) rolling averages over fixed periods, next to
//! monotone lifetime totals. One [`StatsRegistry`] serves the whole
//! process; ingestion reports into it, a rollover task advances it.

pub mod interval;
pub mod registry;
pub mod window;

pub use interval::{IntervalCounts, RateAverage};
pub use registry::{StatsRegistry, DEFAULT_PERIODS};
pub use window::ConnectionWindow;
