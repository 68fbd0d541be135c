/*! Hash-sharded aggregation.

Urls are routed to one of `n` independent [Aggregator]s by hash, so shards never share a url.
Shards are finalized in parallel into sorted runs, which are then merged into a single
url-sorted output, identical to the one of a single [Aggregator].
!*/
use std::hash::Hasher;

use log::info;
use rayon::prelude::*;
use twox_hash::XxHash64;

use crate::error::Error;
use crate::processing::aggregate::{AggregateConfig, AggregateStats, Aggregator};
use crate::processing::spill::{self, Merge, PartialSource};
use crate::types::{AggregatedRecord, QaRecord};

pub struct ShardedAggregator {
    shards: Vec<Aggregator>,
    config: AggregateConfig,
}

impl ShardedAggregator {
    /// Create `shards` aggregators, splitting the spill threshold between them.
    pub fn new(shards: usize, config: AggregateConfig) -> Self {
        let shards = shards.max(1);
        let shard_config = AggregateConfig {
            spill_threshold_bytes: config.spill_threshold_bytes.map(|t| (t / shards).max(1)),
            tmp_dir: config.tmp_dir.clone(),
        };
        Self {
            shards: (0..shards)
                .map(|_| Aggregator::new(shard_config.clone()))
                .collect(),
            config,
        }
    }

    fn shard_of(&self, url: &str) -> usize {
        let mut hasher = XxHash64::with_seed(0);
        hasher.write(url.as_bytes());
        (hasher.finish() % self.shards.len() as u64) as usize
    }

    pub fn insert(&mut self, record: QaRecord) -> Result<(), Error> {
        let shard = self.shard_of(&record.url);
        self.shards[shard].insert(record)
    }

    /// Finalize: feed every aggregated record to `sink`, sorted by url.
    pub fn finish<F>(self, mut sink: F) -> Result<AggregateStats, Error>
    where
        F: FnMut(AggregatedRecord) -> Result<(), Error>,
    {
        let mut builder = tempfile::Builder::new();
        builder.prefix("ccqa-shards-");
        let dir = match &self.config.tmp_dir {
            Some(tmp) => builder.tempdir_in(tmp)?,
            None => builder.tempdir()?,
        };

        info!("finalizing {} shards", self.shards.len());
        let finished: Vec<(std::path::PathBuf, AggregateStats)> = self
            .shards
            .into_par_iter()
            .enumerate()
            .map(|(i, shard)| {
                let path = dir.path().join(format!("shard-{i:04}.jsonl"));
                let stats = shard.finish_into_run(&path)?;
                Ok((path, stats))
            })
            .collect::<Result<_, Error>>()?;

        let mut stats = AggregateStats::default();
        let mut sources: Vec<PartialSource> = Vec::with_capacity(finished.len());
        for (path, shard_stats) in &finished {
            stats += *shard_stats;
            sources.push(spill::read_run(path)?);
        }

        // urls are disjoint between shards, so this adds nothing to the counters
        let mut merge_stats = AggregateStats::default();
        Merge::new(sources)?.fold(&mut merge_stats, |partial| sink(partial.into()))?;
        Ok(stats)
    }

    /// Finalize into a vector.
    pub fn into_records(self) -> Result<(Vec<AggregatedRecord>, AggregateStats), Error> {
        let mut records = Vec::new();
        let stats = self.finish(|r| {
            records.push(r);
            Ok(())
        })?;
        Ok((records, stats))
    }
}
