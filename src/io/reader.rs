/*! JSON lines reader.

Lines that are not valid records are logged, counted and skipped: an intermediate
artifact with a few broken lines is still usable.
!*/
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::marker::PhantomData;
use std::path::Path;

use log::error;
use serde::de::DeserializeOwned;

use crate::error::Error;

#[derive(Debug)]
pub struct JsonlReader<T, R: BufRead = BufReader<File>> {
    lines: Lines<R>,
    line: usize,
    malformed: usize,
    record: PhantomData<T>,
}

impl<T: DeserializeOwned> JsonlReader<T> {
    pub fn from_path(src: &Path) -> Result<Self, Error> {
        let handle = File::open(src)?;
        Ok(Self::new(BufReader::new(handle)))
    }
}

impl<T: DeserializeOwned, R: BufRead> JsonlReader<T, R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line: 0,
            malformed: 0,
            record: PhantomData,
        }
    }

    /// Number of lines that could not be parsed so far.
    pub fn malformed(&self) -> usize {
        self.malformed
    }
}

impl<T: DeserializeOwned, R: BufRead> Iterator for JsonlReader<T, R> {
    type Item = Result<T, Error>;

    /// Next well-formed record. I/O errors are returned, parse errors are skipped.
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                    self.line += 1;
                    self.malformed += 1;
                    error!("line {}: not utf-8", self.line);
                    continue;
                }
                Err(e) => return Some(Err(Error::Io(e))),
            };
            self.line += 1;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<T>(&line) {
                Ok(record) => return Some(Ok(record)),
                Err(e) => {
                    self.malformed += 1;
                    error!("line {}: malformed record: {e}", self.line);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::types::MinifiedPage;

    #[test]
    fn skips_malformed() {
        let data = r#"{"url":"a","html":"<p>1</p>"}
not json
{"url":"b"}

{"url":"c","html":"<p>3</p>"}
"#;
        let mut reader: JsonlReader<MinifiedPage, _> = JsonlReader::new(Cursor::new(data));
        let urls: Vec<String> = reader
            .by_ref()
            .map(|r| r.unwrap().url)
            .collect();
        assert_eq!(urls, vec!["a", "c"]);
        assert_eq!(reader.malformed(), 2);
    }

    #[test]
    fn invalid_utf8_line() {
        let mut data = b"{\"url\":\"a\",\"html\":\"x\"}\n".to_vec();
        data.extend_from_slice(b"\xff\xfe\n");
        data.extend_from_slice(b"{\"url\":\"b\",\"html\":\"y\"}\n");
        let mut reader: JsonlReader<MinifiedPage, _> = JsonlReader::new(Cursor::new(data));
        assert_eq!(reader.by_ref().filter_map(Result::ok).count(), 2);
        assert_eq!(reader.malformed(), 1);
    }
}
