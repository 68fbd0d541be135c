//! Minified pages → QA records.
use std::path::PathBuf;
use std::time::Instant;

use log::{debug, info};

use crate::budget::Budget;
use crate::error::{Error, Skip};
use crate::extract::Extractor;
use crate::identifiers::{FastTextBuilder, Identify};
use crate::io::{JsonlReader, JsonlWriter, WriterTrait};
use crate::pipelines::ordered::ordered_map;
use crate::pipelines::{guarded, Pipeline, PipelineConfig, RunStats};
use crate::types::{MinifiedPage, QaRecord};

pub struct ExtractPipeline {
    src: PathBuf,
    dst: PathBuf,
    lid_path: PathBuf,
    config: PipelineConfig,
    extractor: Extractor,
}

impl ExtractPipeline {
    pub fn new(src: PathBuf, dst: PathBuf, lid_path: PathBuf, config: PipelineConfig) -> Self {
        Self {
            src,
            dst,
            lid_path,
            config,
            extractor: Extractor::default(),
        }
    }

    /// Run with a given language identifier.
    pub fn run_with(&self, identifier: &dyn Identify) -> Result<RunStats, Error> {
        let start = Instant::now();
        info!("extracting {:?} into {:?}", self.src, self.dst);

        let reader = JsonlReader::<MinifiedPage>::from_path(&self.src)?;
        let mut writer = JsonlWriter::<QaRecord>::create(&self.dst)?;
        let mut stats = RunStats::default();

        let reader = ordered_map(
            reader,
            self.config.workers,
            self.config.queue_depth,
            |page| -> Result<(String, Result<QaRecord, Skip>), Error> {
                let page = page?;
                Ok(extract_page(
                    &self.extractor,
                    identifier,
                    &self.config.budget(),
                    page,
                ))
            },
            |res: Result<(String, Result<QaRecord, Skip>), Error>| {
                let (url, res) = res?;
                match tally(&mut stats, &url, res) {
                    Some(record) => writer.write_single(&record),
                    None => Ok(()),
                }
            },
        )?;
        writer.flush()?;

        stats.skip_corrupt(reader.malformed());
        stats.set_elapsed(start.elapsed());
        stats.log();
        Ok(stats)
    }
}

/// Extract a page. Gives back the url for logging.
pub(crate) fn extract_page(
    extractor: &Extractor,
    identifier: &dyn Identify,
    budget: &Budget,
    page: MinifiedPage,
) -> (String, Result<QaRecord, Skip>) {
    let res = guarded(&page.url, || extractor.extract(&page, identifier, budget));
    (page.url, res)
}

/// Count an extraction outcome. Returns the record if there is one.
pub(crate) fn tally(
    stats: &mut RunStats,
    url: &str,
    res: Result<QaRecord, Skip>,
) -> Option<QaRecord> {
    match res {
        Ok(record) => {
            stats.records += 1;
            if !record.qa_pairs.is_empty() {
                stats.records_with_pairs += 1;
                stats.pairs += record.qa_pairs.len();
            }
            Some(record)
        }
        Err(skip) => {
            debug!("{}: skipped ({})", url, skip);
            stats.skip(&skip);
            None
        }
    }
}

impl Pipeline<RunStats> for ExtractPipeline {
    fn run(&self) -> Result<RunStats, Error> {
        let identifier = FastTextBuilder::default().path(&self.lid_path).build()?;
        self.run_with(&identifier)
    }
}
