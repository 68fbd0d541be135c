//! Run summary.
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use log::info;
use serde::Serialize;

use crate::error::{Error, Skip};
use crate::processing::AggregateStats;
use crate::sources::ReaderStats;

/// Skipped pages, by category.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SkipCounts {
    pub corrupt: usize,
    pub not_ok: usize,
    pub not_html: usize,
    pub too_large: usize,
    pub empty: usize,
    pub timeout: usize,
    pub failed: usize,
}

impl SkipCounts {
    pub fn add(&mut self, skip: &Skip) {
        self.add_many(skip, 1);
    }

    /// Count `n` pages skipped for a same reason.
    pub fn add_many(&mut self, skip: &Skip, n: usize) {
        let counter = match skip {
            Skip::Corrupt => &mut self.corrupt,
            Skip::NotOk(_) => &mut self.not_ok,
            Skip::NotHtml => &mut self.not_html,
            Skip::TooLarge => &mut self.too_large,
            Skip::Empty => &mut self.empty,
            Skip::Timeout => &mut self.timeout,
            Skip::Failed(_) => &mut self.failed,
        };
        *counter += n;
    }

    pub fn total(&self) -> usize {
        self.corrupt
            + self.not_ok
            + self.not_html
            + self.too_large
            + self.empty
            + self.timeout
            + self.failed
    }
}

/// Counters of a run, whatever the stages it went through.
///
/// Stages that did not run leave their counters at zero (or [None]).
#[derive(Debug, Default, Clone, Serialize)]
pub struct RunStats {
    /// archive counters, when reading an archive
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reader: Option<ReaderStats>,
    /// captures or lines read
    pub pages_in: usize,
    pub minified: usize,
    pub decode_fallbacks: usize,
    /// QA records written, empty ones included
    pub records: usize,
    pub records_with_pairs: usize,
    pub pairs: usize,
    pub skipped: SkipCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<AggregateStats>,
    pub elapsed_secs: f64,
}

impl RunStats {
    pub fn skip(&mut self, skip: &Skip) {
        self.skipped.add(skip);
    }

    /// Count the entries an input reader could not decode.
    pub fn skip_corrupt(&mut self, n: usize) {
        self.skipped.add_many(&Skip::Corrupt, n);
    }

    pub fn set_elapsed(&mut self, elapsed: Duration) {
        self.elapsed_secs = elapsed.as_secs_f64();
    }

    /// Print the summary at info level.
    pub fn log(&self) {
        if let Some(reader) = &self.reader {
            info!(
                "archive: {} entries, {} responses, {} other, {} corrupt",
                reader.entries, reader.responses, reader.non_response, reader.corrupt
            );
        }
        info!(
            "pages: {} in, {} minified ({} decode fallbacks), {} records ({} with pairs, {} pairs)",
            self.pages_in,
            self.minified,
            self.decode_fallbacks,
            self.records,
            self.records_with_pairs,
            self.pairs
        );
        let s = &self.skipped;
        info!(
            "skipped {}: corrupt={} not_ok={} not_html={} too_large={} empty={} timeout={} failed={}",
            s.total(),
            s.corrupt,
            s.not_ok,
            s.not_html,
            s.too_large,
            s.empty,
            s.timeout,
            s.failed
        );
        if let Some(agg) = &self.aggregate {
            info!(
                "aggregate: {} records ({} empty) → {} urls, {} → {} pairs, {} language conflicts, {} spills",
                agg.records,
                agg.empty_records,
                agg.urls,
                agg.pairs_in,
                agg.pairs_out,
                agg.language_conflicts,
                agg.spills
            );
        }
        info!("done in {:.2}s", self.elapsed_secs);
    }

    /// Write the summary as pretty JSON.
    pub fn save(&self, dst: &Path) -> Result<(), Error> {
        let mut f = File::create(dst)?;
        serde_json::to_writer_pretty(&mut f, self)?;
        f.write_all(b"\n")?;
        Ok(())
    }
}
