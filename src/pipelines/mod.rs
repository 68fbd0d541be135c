//! Pipelines.
//!
//! Each stage can run on its own, reading the artifact of the previous one,
//! or chained with [FullPipeline]. All of them implement the light [Pipeline] trait
//! and return a [RunStats] summary.
//!
//! Pages go through an [ordered::ordered_map], so artifacts keep the order of the archive.
mod aggregate;
mod config;
mod extract;
mod full;
mod minify;
pub mod ordered;
#[allow(clippy::module_inception)]
mod pipeline;
mod stats;

use std::panic::{self, AssertUnwindSafe};

use log::warn;

use crate::error::Skip;

pub use aggregate::AggregatePipeline;
pub use config::{PipelineConfig, DEFAULT_QUEUE_DEPTH, DEFAULT_TIMEOUT};
pub use extract::ExtractPipeline;
pub use full::{FullPipeline, CORPUS_FILE, MINIFIED_FILE, QA_FILE};
pub use minify::MinifyPipeline;
pub use pipeline::Pipeline;
pub use stats::{RunStats, SkipCounts};

/// Run a page's processing, turning a panic into [Skip::Failed].
pub(crate) fn guarded<T, F>(url: &str, f: F) -> Result<T, Skip>
where
    F: FnOnce() -> Result<T, Skip>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(res) => res,
        Err(panic) => {
            let msg = ordered::panic_message(&*panic);
            warn!("{}: processing panicked: {}", url, msg);
            Err(Skip::Failed(msg))
        }
    }
}
