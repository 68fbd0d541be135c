//! QA records → aggregated corpus.
use std::path::PathBuf;
use std::time::Instant;

use log::info;

use crate::error::Error;
use crate::io::{JsonlReader, JsonlWriter, WriterTrait};
use crate::pipelines::{Pipeline, PipelineConfig, RunStats};
use crate::types::{AggregatedRecord, QaRecord};

pub struct AggregatePipeline {
    src: PathBuf,
    dst: PathBuf,
    config: PipelineConfig,
}

impl AggregatePipeline {
    pub fn new(src: PathBuf, dst: PathBuf, config: PipelineConfig) -> Self {
        Self { src, dst, config }
    }
}

impl Pipeline<RunStats> for AggregatePipeline {
    fn run(&self) -> Result<RunStats, Error> {
        let start = Instant::now();
        info!(
            "aggregating {:?} into {:?} ({} shard(s))",
            self.src, self.dst, self.config.shards
        );

        let mut reader = JsonlReader::<QaRecord>::from_path(&self.src)?;
        let mut aggregation = self.config.aggregation();
        let mut stats = RunStats::default();

        for record in reader.by_ref() {
            stats.pages_in += 1;
            aggregation.insert(record?)?;
        }
        stats.skip_corrupt(reader.malformed());

        let mut writer = JsonlWriter::<AggregatedRecord>::create(&self.dst)?;
        let aggregate = aggregation.finish(|record| writer.write_single(&record))?;
        writer.flush()?;

        stats.aggregate = Some(aggregate);
        stats.set_elapsed(start.elapsed());
        stats.log();
        Ok(stats)
    }
}
