/*! JSON lines writer.

One serialized record per line. serde_json escapes control characters,
so a record never spans more than one line.
!*/
use std::fs::File;
use std::io::{BufWriter, Write};
use std::marker::PhantomData;
use std::path::Path;

use serde::Serialize;

use crate::error::Error;

pub trait WriterTrait {
    type Item;

    fn write_single(&mut self, val: &Self::Item) -> Result<(), Error>;
    /// Flush buffered records.
    fn flush(&mut self) -> Result<(), Error>;
}

pub struct JsonlWriter<T, W: Write = BufWriter<File>> {
    handle: W,
    written: usize,
    record: PhantomData<T>,
}

impl<T: Serialize> JsonlWriter<T> {
    /// Create (or truncate) the file at `dst`.
    pub fn create(dst: &Path) -> Result<Self, Error> {
        Ok(Self::new(BufWriter::new(File::create(dst)?)))
    }
}

impl<T: Serialize, W: Write> JsonlWriter<T, W> {
    pub fn new(handle: W) -> Self {
        Self {
            handle,
            written: 0,
            record: PhantomData,
        }
    }

    /// Number of records written.
    pub fn written(&self) -> usize {
        self.written
    }
}

impl<T: Serialize, W: Write> WriterTrait for JsonlWriter<T, W> {
    type Item = T;

    fn write_single(&mut self, val: &T) -> Result<(), Error> {
        serde_json::to_writer(&mut self.handle, val)?;
        self.handle.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Error> {
        Ok(self.handle.flush()?)
    }
}
