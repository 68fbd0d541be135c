/*! Sorted runs and k-way merging.

A run is a JSON lines file of [PartialRecord], sorted by url, urls being unique inside a run.
Merging pops partials from a min-heap keyed on `(url, seq)`, so that partials of
a same url come out together, oldest first.
!*/
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::io::{JsonlWriter, WriterTrait};
use crate::processing::aggregate::{AggregateStats, Entry};
use crate::types::QaPair;

/// Part of the aggregated record of a url, as stored in runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialRecord {
    pub url: String,
    /// insertion sequence number of the first record of the url
    pub seq: u64,
    pub language: String,
    pub qa_pairs: Vec<QaPair>,
}

pub(crate) type PartialSource = Box<dyn Iterator<Item = Result<PartialRecord, Error>> + Send>;

/// Write a sorted run.
pub(crate) fn write_run(path: &Path, records: Vec<PartialRecord>) -> Result<(), Error> {
    let mut writer = JsonlWriter::create(path)?;
    for record in &records {
        writer.write_single(record)?;
    }
    writer.flush()?;
    debug!("wrote run {:?} ({} urls)", path, writer.written());
    Ok(())
}

/// Read back a run.
///
/// Runs are written by us, so any parse error is fatal.
pub(crate) fn read_run(path: &Path) -> Result<PartialSource, Error> {
    let lines = BufReader::new(File::open(path)?).lines();
    Ok(Box::new(lines.map(|line| -> Result<PartialRecord, Error> {
        let line = line?;
        Ok(serde_json::from_str::<PartialRecord>(&line)?)
    })))
}

/// Heap entry: a partial and the source it comes from.
struct Head {
    record: PartialRecord,
    source: usize,
}

impl Head {
    fn key(&self) -> (&str, u64, usize) {
        (&self.record.url, self.record.seq, self.source)
    }
}

impl PartialEq for Head {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Head {}

impl PartialOrd for Head {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Reversed, [BinaryHeap] being a max-heap.
impl Ord for Head {
    fn cmp(&self, other: &Self) -> Ordering {
        other.key().cmp(&self.key())
    }
}

/// K-way merge of sorted sources.
pub(crate) struct Merge {
    sources: Vec<PartialSource>,
    heap: BinaryHeap<Head>,
}

impl Merge {
    pub fn new(sources: Vec<PartialSource>) -> Result<Self, Error> {
        let mut merge = Self {
            heap: BinaryHeap::with_capacity(sources.len()),
            sources,
        };
        for source in 0..merge.sources.len() {
            merge.advance(source)?;
        }
        Ok(merge)
    }

    fn advance(&mut self, source: usize) -> Result<(), Error> {
        if let Some(record) = self.sources[source].next() {
            self.heap.push(Head {
                record: record?,
                source,
            });
        }
        Ok(())
    }

    /// Every partial of the next url, oldest first.
    fn next_group(&mut self) -> Result<Option<Vec<PartialRecord>>, Error> {
        let first = match self.heap.pop() {
            Some(head) => head,
            None => return Ok(None),
        };
        self.advance(first.source)?;
        let mut group = vec![first.record];

        while self
            .heap
            .peek()
            .map_or(false, |head| head.record.url == group[0].url)
        {
            if let Some(head) = self.heap.pop() {
                self.advance(head.source)?;
                group.push(head.record);
            }
        }
        Ok(Some(group))
    }

    /// Fold each url's partials and feed them to `sink`, in url order.
    ///
    /// Duplicate pairs and language conflicts between partials are added to `stats`.
    pub fn fold<F>(mut self, stats: &mut AggregateStats, mut sink: F) -> Result<(), Error>
    where
        F: FnMut(PartialRecord) -> Result<(), Error>,
    {
        while let Some(group) = self.next_group()? {
            let mut group = group.into_iter();
            let first = match group.next() {
                Some(first) => first,
                None => continue,
            };
            let url = first.url;
            let mut entry = Entry::new(first.seq, first.language);
            for pair in first.qa_pairs {
                entry.add(pair);
            }

            for partial in group {
                if partial.language != entry.language {
                    stats.language_conflicts += 1;
                }
                for pair in partial.qa_pairs {
                    if !entry.add(pair) {
                        stats.duplicate_pairs += 1;
                    }
                }
            }
            sink(entry.into_partial(url))?;
        }
        Ok(())
    }
}
