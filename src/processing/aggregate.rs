/*! URL-keyed aggregation.

Records sharing a url are merged into one:
- the first seen language is kept,
- pairs are unioned, compared after whitespace normalization, in first seen order.

The url → record map is held in memory until its approximate size goes over a threshold.
It is then sorted and written to disk as a run, and the final output is a k-way merge of all runs.
Output is always sorted by url, whether runs were written or not.
!*/
use std::collections::hash_map::Entry as MapEntry;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::ops::AddAssign;
use std::path::{Path, PathBuf};

use log::{debug, info};
use rayon::prelude::*;
use serde::Serialize;
use tempfile::TempDir;
use twox_hash::XxHash64;

use crate::error::Error;
use crate::io::{JsonlWriter, WriterTrait};
use crate::processing::spill::{self, Merge, PartialRecord, PartialSource};
use crate::types::{AggregatedRecord, QaPair, QaRecord};

/// Fixed per-url and per-pair memory overheads, approximated.
const ENTRY_OVERHEAD: usize = 128;
const PAIR_OVERHEAD: usize = 96;

#[derive(Debug, Clone)]
pub struct AggregateConfig {
    /// approximate in-memory size over which a run is written. [None] never spills.
    pub spill_threshold_bytes: Option<usize>,
    /// where run files go, defaults to the system temporary directory.
    pub tmp_dir: Option<PathBuf>,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            spill_threshold_bytes: Some(1024 * 1024 * 1024),
            tmp_dir: None,
        }
    }
}

/// Aggregation counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AggregateStats {
    /// records inserted, empty ones included
    pub records: usize,
    pub empty_records: usize,
    /// distinct urls in the output
    pub urls: usize,
    pub pairs_in: usize,
    pub pairs_out: usize,
    pub duplicate_pairs: usize,
    pub language_conflicts: usize,
    /// runs written to disk
    pub spills: usize,
}

impl AddAssign for AggregateStats {
    fn add_assign(&mut self, other: Self) {
        self.records += other.records;
        self.empty_records += other.empty_records;
        self.urls += other.urls;
        self.pairs_in += other.pairs_in;
        self.pairs_out += other.pairs_out;
        self.duplicate_pairs += other.duplicate_pairs;
        self.language_conflicts += other.language_conflicts;
        self.spills += other.spills;
    }
}

fn pair_hash(pair: &QaPair) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    pair.hash(&mut hasher);
    hasher.finish()
}

fn pair_size(pair: &QaPair) -> usize {
    pair.question.len()
        + pair.answer.len()
        + pair.context.as_ref().map_or(0, String::len)
        + PAIR_OVERHEAD
}

/// In-progress record of a url.
///
/// Pairs are indexed by hash; the stored pair is compared on a hash hit.
#[derive(Debug)]
pub(crate) struct Entry {
    pub(crate) seq: u64,
    pub(crate) language: String,
    pairs: Vec<QaPair>,
    index: HashMap<u64, usize>,
}

impl Entry {
    pub(crate) fn new(seq: u64, language: String) -> Self {
        Self {
            seq,
            language,
            pairs: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Add a normalized pair. Returns false if it was already there.
    pub(crate) fn add(&mut self, pair: QaPair) -> bool {
        let hash = pair_hash(&pair);
        let known = match self.index.get(&hash) {
            Some(i) if self.pairs[*i] == pair => true,
            // collision
            Some(_) => self.pairs.contains(&pair),
            None => false,
        };
        if known {
            return false;
        }
        self.index.entry(hash).or_insert(self.pairs.len());
        self.pairs.push(pair);
        true
    }

    pub(crate) fn into_partial(self, url: String) -> PartialRecord {
        PartialRecord {
            url,
            seq: self.seq,
            language: self.language,
            qa_pairs: self.pairs,
        }
    }
}

impl From<PartialRecord> for AggregatedRecord {
    fn from(partial: PartialRecord) -> Self {
        Self {
            url: partial.url,
            language: partial.language,
            qa_pairs: partial.qa_pairs,
        }
    }
}

/// Single-owner aggregator.
pub struct Aggregator {
    config: AggregateConfig,
    entries: HashMap<String, Entry>,
    /// approximate size of `entries`
    bytes: usize,
    next_seq: u64,
    spill_dir: Option<TempDir>,
    runs: Vec<PathBuf>,
    stats: AggregateStats,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(AggregateConfig::default())
    }
}

impl Aggregator {
    pub fn new(config: AggregateConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
            bytes: 0,
            next_seq: 0,
            spill_dir: None,
            runs: Vec::new(),
            stats: AggregateStats::default(),
        }
    }

    /// Counters so far. `urls` and `pairs_out` are only known after [Aggregator::finish].
    pub fn stats(&self) -> AggregateStats {
        self.stats
    }

    /// Insert a record, merging it with previous records of the same url.
    ///
    /// Records without pairs are counted but not merged.
    pub fn insert(&mut self, record: QaRecord) -> Result<(), Error> {
        self.stats.records += 1;
        if record.qa_pairs.is_empty() {
            self.stats.empty_records += 1;
            return Ok(());
        }
        self.stats.pairs_in += record.qa_pairs.len();

        let seq = self.next_seq;
        self.next_seq += 1;

        let entry = match self.entries.entry(record.url) {
            MapEntry::Occupied(e) => {
                let entry = e.into_mut();
                if entry.language != record.language {
                    debug!(
                        "language conflict: keeping {}, ignoring {}",
                        entry.language, record.language
                    );
                    self.stats.language_conflicts += 1;
                }
                entry
            }
            MapEntry::Vacant(e) => {
                self.bytes += e.key().len() + record.language.len() + ENTRY_OVERHEAD;
                e.insert(Entry::new(seq, record.language))
            }
        };

        for pair in record.qa_pairs {
            let pair = pair.normalized();
            let size = pair_size(&pair);
            if entry.add(pair) {
                self.bytes += size;
            } else {
                self.stats.duplicate_pairs += 1;
            }
        }

        if let Some(threshold) = self.config.spill_threshold_bytes {
            if self.bytes > threshold {
                self.spill()?;
            }
        }
        Ok(())
    }

    /// Take the in-memory entries, sorted by url.
    fn drain_sorted(&mut self) -> Vec<PartialRecord> {
        let mut records: Vec<PartialRecord> = std::mem::take(&mut self.entries)
            .into_iter()
            .map(|(url, entry)| entry.into_partial(url))
            .collect();
        records.par_sort_unstable_by(|a, b| a.url.cmp(&b.url));
        self.bytes = 0;
        records
    }

    fn run_dir(&mut self) -> Result<&Path, Error> {
        if self.spill_dir.is_none() {
            let mut builder = tempfile::Builder::new();
            builder.prefix("ccqa-runs-");
            let dir = match &self.config.tmp_dir {
                Some(tmp) => builder.tempdir_in(tmp)?,
                None => builder.tempdir()?,
            };
            self.spill_dir = Some(dir);
        }
        match &self.spill_dir {
            Some(dir) => Ok(dir.path()),
            None => Err(Error::Custom("no run directory".to_string())),
        }
    }

    /// Write the in-memory entries as a sorted run.
    fn spill(&mut self) -> Result<(), Error> {
        if self.entries.is_empty() {
            return Ok(());
        }
        let name = format!("run-{:05}.jsonl", self.runs.len());
        let path = self.run_dir()?.join(name);
        let approx = self.bytes;
        let records = self.drain_sorted();
        info!(
            "spilling {} urls (~{}MB) to {:?}",
            records.len(),
            approx / (1024 * 1024),
            path
        );
        spill::write_run(&path, records)?;
        self.runs.push(path);
        self.stats.spills += 1;
        Ok(())
    }

    /// Merge runs and in-memory entries, passing merged partials to `sink` in url order.
    fn merge<F>(mut self, mut sink: F) -> Result<AggregateStats, Error>
    where
        F: FnMut(PartialRecord) -> Result<(), Error>,
    {
        let tail = self.drain_sorted();
        let mut sources: Vec<PartialSource> = self
            .runs
            .iter()
            .map(|run| spill::read_run(run))
            .collect::<Result<_, _>>()?;
        sources.push(Box::new(tail.into_iter().map(Ok)));

        let mut stats = self.stats;
        let mut urls = 0;
        let mut pairs_out = 0;
        Merge::new(sources)?.fold(&mut stats, |partial| {
            urls += 1;
            pairs_out += partial.qa_pairs.len();
            sink(partial)
        })?;
        stats.urls = urls;
        stats.pairs_out = pairs_out;

        // run files go with the directory
        drop(self.spill_dir);
        Ok(stats)
    }

    /// Finalize: feed every aggregated record to `sink`, sorted by url.
    pub fn finish<F>(self, mut sink: F) -> Result<AggregateStats, Error>
    where
        F: FnMut(AggregatedRecord) -> Result<(), Error>,
    {
        self.merge(|partial| sink(partial.into()))
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

    /// Finalize into a single sorted run at `path`.
    pub(crate) fn finish_into_run(self, path: &Path) -> Result<AggregateStats, Error> {
        let mut writer = JsonlWriter::create(path)?;
        let stats = self.merge(|partial| writer.write_single(&partial))?;
        writer.flush()?;
        Ok(stats)
    }
}
