//! Command line arguments and parameters management/parsing.
use std::path::PathBuf;
use std::time::Duration;

use structopt::StructOpt;

use crate::pipelines::{PipelineConfig, DEFAULT_QUEUE_DEPTH};
use crate::processing::AggregateConfig;

#[derive(Debug, StructOpt)]
#[structopt(name = "ccqa", about = "question/answer mining from web archives.")]
/// Holds every command that is callable by the `ccqa` command.
pub enum Ccqa {
    #[structopt(about = "Minify the HTML responses of a WARC file")]
    Minify(Minify),
    #[structopt(about = "Extract question/answer pairs from minified pages")]
    Extract(Extract),
    #[structopt(about = "Merge QA records by url")]
    Aggregate(Aggregate),
    #[structopt(about = "Run minify, extract and aggregate in one pass")]
    Pipeline(Pipeline),
}

impl Ccqa {
    pub fn common(&self) -> &Common {
        match self {
            Ccqa::Minify(c) => &c.common,
            Ccqa::Extract(c) => &c.common,
            Ccqa::Aggregate(c) => &c.common,
            Ccqa::Pipeline(c) => &c.common,
        }
    }
}

#[derive(Debug, StructOpt)]
/// Options shared by every command.
pub struct Common {
    #[structopt(long = "workers", help = "page processing threads. Default is the number of cores.")]
    pub workers: Option<usize>,
    #[structopt(
        long = "queue-depth",
        help = "pages in flight between reading and writing.",
        default_value = "256"
    )]
    pub queue_depth: usize,
    #[structopt(
        long = "timeout-ms",
        help = "per-page processing time limit, 0 to disable.",
        default_value = "30000"
    )]
    pub timeout_ms: u64,
    #[structopt(
        long = "spill-threshold-mb",
        help = "aggregation memory (approx.) over which records are spilled to disk, 0 to never spill.",
        default_value = "1024"
    )]
    pub spill_threshold_mb: usize,
    #[structopt(long = "shards", help = "aggregation shards.", default_value = "1")]
    pub shards: usize,
    #[structopt(
        parse(from_os_str),
        long = "tmp-dir",
        help = "where spilled runs are written. Default is the system temporary directory."
    )]
    pub tmp_dir: Option<PathBuf>,
    #[structopt(
        parse(from_os_str),
        long = "stats",
        help = "write the run summary as JSON at this path"
    )]
    pub stats: Option<PathBuf>,
}

impl Common {
    pub fn config(&self) -> PipelineConfig {
        let defaults = PipelineConfig::default();
        PipelineConfig {
            workers: self.workers.unwrap_or(defaults.workers),
            queue_depth: if self.queue_depth == 0 {
                DEFAULT_QUEUE_DEPTH
            } else {
                self.queue_depth
            },
            timeout: match self.timeout_ms {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
            max_body_bytes: defaults.max_body_bytes,
            shards: self.shards.max(1),
            aggregate: AggregateConfig {
                spill_threshold_bytes: match self.spill_threshold_mb {
                    0 => None,
                    mb => Some(mb.saturating_mul(1024 * 1024)),
                },
                tmp_dir: self.tmp_dir.clone(),
            },
        }
    }
}

#[derive(Debug, StructOpt)]
/// Minify command and parameters.
pub struct Minify {
    #[structopt(parse(from_os_str), help = "source WARC file (plain or gzipped)")]
    pub src: PathBuf,
    #[structopt(parse(from_os_str), help = "minified pages destination (JSON lines)")]
    pub dst: PathBuf,
    #[structopt(flatten)]
    pub common: Common,
}

#[derive(Debug, StructOpt)]
/// Extract command and parameters.
pub struct Extract {
    #[structopt(parse(from_os_str), help = "minified pages (JSON lines)")]
    pub src: PathBuf,
    #[structopt(parse(from_os_str), help = "QA records destination (JSON lines)")]
    pub dst: PathBuf,
    #[structopt(
        parse(from_os_str),
        long = "lid-path",
        help = "Path to lid.176.bin",
        default_value = "lid.176.bin"
    )]
    pub lid_path: PathBuf,
    #[structopt(flatten)]
    pub common: Common,
}

#[derive(Debug, StructOpt)]
/// Aggregate command and parameters.
pub struct Aggregate {
    #[structopt(parse(from_os_str), help = "QA records (JSON lines)")]
    pub src: PathBuf,
    #[structopt(parse(from_os_str), help = "corpus destination (JSON lines)")]
    pub dst: PathBuf,
    #[structopt(flatten)]
    pub common: Common,
}

#[derive(Debug, StructOpt)]
/// Pipeline command and parameters.
///
/// ```sh
/// USAGE:
///     ccqa pipeline [OPTIONS] <src> <dst>
///
/// ARGS:
///     <src>    source WARC file (plain or gzipped)
///     <dst>    destination folder (minified.jsonl, qa.jsonl, corpus.jsonl)
/// ```
pub struct Pipeline {
    #[structopt(parse(from_os_str), help = "source WARC file (plain or gzipped)")]
    pub src: PathBuf,
    #[structopt(parse(from_os_str), help = "destination folder")]
    pub dst: PathBuf,
    #[structopt(
        parse(from_os_str),
        long = "lid-path",
        help = "Path to lid.176.bin",
        default_value = "lid.176.bin"
    )]
    pub lid_path: PathBuf,
    #[structopt(flatten)]
    pub common: Common,
}
