/*! Archive → corpus, in one pass.

Pages are minified and extracted by the same worker, and flow in archive order into
the aggregator. Both intermediate artifacts are still written, as checkpoints:

```text
<dst>/minified.jsonl
<dst>/qa.jsonl
<dst>/corpus.jsonl
```
!*/
use std::path::PathBuf;
use std::time::Instant;

use log::{info, warn};

use crate::error::{Error, Skip};
use crate::extract::Extractor;
use crate::identifiers::{FastTextBuilder, Identify};
use crate::io::{JsonlWriter, WriterTrait};
use crate::minify::{Minified, Minifier};
use crate::pipelines::ordered::ordered_map;
use crate::pipelines::{extract, minify, Pipeline, PipelineConfig, RunStats};
use crate::sources::ArchiveReader;
use crate::types::{AggregatedRecord, MinifiedPage, QaRecord, RawCapture};

pub const MINIFIED_FILE: &str = "minified.jsonl";
pub const QA_FILE: &str = "qa.jsonl";
pub const CORPUS_FILE: &str = "corpus.jsonl";

/// What happened to a capture.
struct Outcome {
    url: String,
    minified: Result<Minified, Skip>,
    /// extraction of the minified page, if any
    extracted: Option<Result<QaRecord, Skip>>,
}

pub struct FullPipeline {
    src: PathBuf,
    dst: PathBuf,
    lid_path: PathBuf,
    config: PipelineConfig,
    minifier: Minifier,
    extractor: Extractor,
}

impl FullPipeline {
    pub fn new(src: PathBuf, dst: PathBuf, lid_path: PathBuf, config: PipelineConfig) -> Self {
        let minifier = Minifier::new(config.max_body_bytes);
        Self {
            src,
            dst,
            lid_path,
            config,
            minifier,
            extractor: Extractor::default(),
        }
    }

    /// Minify then extract a capture, both stages sharing one budget.
    fn process(&self, identifier: &dyn Identify, capture: RawCapture) -> Outcome {
        let budget = self.config.budget();
        let (url, minified) = minify::minify_capture(&self.minifier, &budget, capture);
        let extracted = match &minified {
            Ok(m) => Some(
                extract::extract_page(&self.extractor, identifier, &budget, m.page.clone()).1,
            ),
            Err(_) => None,
        };
        Outcome {
            url,
            minified,
            extracted,
        }
    }

    /// Run with a given language identifier.
    pub fn run_with(&self, identifier: &dyn Identify) -> Result<RunStats, Error> {
        let start = Instant::now();
        if !self.dst.exists() {
            warn!("Destination does not exist. Creating {:?}", self.dst);
            std::fs::create_dir_all(&self.dst)?;
        }
        if !self.dst.is_dir() {
            return Err(Error::Custom(format!(
                "destination has to be a directory: {:?}",
                self.dst
            )));
        }
        info!("running full pipeline on {:?} into {:?}", self.src, self.dst);

        let reader = ArchiveReader::from_path(&self.src)?;
        let mut minified_writer =
            JsonlWriter::<MinifiedPage>::create(&self.dst.join(MINIFIED_FILE))?;
        let mut qa_writer = JsonlWriter::<QaRecord>::create(&self.dst.join(QA_FILE))?;
        let mut aggregation = self.config.aggregation();
        let mut stats = RunStats::default();

        let reader = ordered_map(
            reader,
            self.config.workers,
            self.config.queue_depth,
            |capture| self.process(identifier, capture),
            |outcome: Outcome| {
                if let Some(page) = minify::tally(&mut stats, outcome.minified) {
                    minified_writer.write_single(&page)?;
                }
                if let Some(extracted) = outcome.extracted {
                    if let Some(record) = extract::tally(&mut stats, &outcome.url, extracted) {
                        qa_writer.write_single(&record)?;
                        aggregation.insert(record)?;
                    }
                }
                Ok(())
            },
        )?;
        minified_writer.flush()?;
        qa_writer.flush()?;

        let reader_stats = reader.stats();
        stats.skip_corrupt(reader_stats.corrupt);
        stats.reader = Some(reader_stats);

        let mut corpus = JsonlWriter::<AggregatedRecord>::create(&self.dst.join(CORPUS_FILE))?;
        let aggregate = aggregation.finish(|record| corpus.write_single(&record))?;
        corpus.flush()?;
        stats.aggregate = Some(aggregate);

        stats.set_elapsed(start.elapsed());
        stats.log();
        Ok(stats)
    }
}

impl Pipeline<RunStats> for FullPipeline {
    fn run(&self) -> Result<RunStats, Error> {
        let identifier = FastTextBuilder::default().path(&self.lid_path).build()?;
        self.run_with(&identifier)
    }
}
