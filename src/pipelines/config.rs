//! Pipeline parameters.
use std::time::Duration;

use crate::budget::Budget;
use crate::error::Error;
use crate::minify::MAX_BODY_BYTES;
use crate::processing::{AggregateConfig, AggregateStats, Aggregator, ShardedAggregator};
use crate::types::{AggregatedRecord, QaRecord};

pub const DEFAULT_QUEUE_DEPTH: usize = 256;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// page processing threads
    pub workers: usize,
    /// pages in flight between the reader and the writer
    pub queue_depth: usize,
    /// per-page processing time, [None] to disable
    pub timeout: Option<Duration>,
    pub max_body_bytes: usize,
    /// aggregation shards, 1 for a single aggregator
    pub shards: usize,
    pub aggregate: AggregateConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            queue_depth: DEFAULT_QUEUE_DEPTH,
            timeout: Some(DEFAULT_TIMEOUT),
            max_body_bytes: MAX_BODY_BYTES,
            shards: 1,
            aggregate: AggregateConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Budget of a page whose processing starts now.
    pub fn budget(&self) -> Budget {
        Budget::new(self.timeout)
    }

    pub(crate) fn aggregation(&self) -> Aggregation {
        if self.shards > 1 {
            Aggregation::Sharded(ShardedAggregator::new(
                self.shards,
                self.aggregate.clone(),
            ))
        } else {
            Aggregation::Single(Aggregator::new(self.aggregate.clone()))
        }
    }
}

/// Single or sharded aggregation.
pub(crate) enum Aggregation {
    Single(Aggregator),
    Sharded(ShardedAggregator),
}

impl Aggregation {
    pub fn insert(&mut self, record: QaRecord) -> Result<(), Error> {
        match self {
            Aggregation::Single(agg) => agg.insert(record),
            Aggregation::Sharded(agg) => agg.insert(record),
        }
    }

    pub fn finish<F>(self, sink: F) -> Result<AggregateStats, Error>
    where
        F: FnMut(AggregatedRecord) -> Result<(), Error>,
    {
        match self {
            Aggregation::Single(agg) => agg.finish(sink),
            Aggregation::Sharded(agg) => agg.finish(sink),
        }
    }
}
