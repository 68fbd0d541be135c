/*! Record processing

URL-keyed aggregation of per-page records, in memory or with disk-backed sorted runs.
!*/
mod aggregate;
mod shard;
mod spill;

pub use aggregate::{AggregateConfig, AggregateStats, Aggregator};
pub use shard::ShardedAggregator;
pub use spill::PartialRecord;
