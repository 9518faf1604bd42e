//! Usage collection: app discovery and per-day aggregation

pub mod aggregator;
pub mod collector;
pub mod ports;

pub use aggregator::{UsageAggregator, UsageZone};
pub use collector::UsageCollector;
pub use ports::UsageSource;
