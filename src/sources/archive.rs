//! Streaming WARC reader.
//!
//! Yields one [RawCapture] per `response` record, in archive order, never holding
//! more than one record in memory. Corrupt records are skipped and counted.
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use log::{debug, info, warn};
use serde::Serialize;
use warc::{BufferedBody, Record, WarcHeader, WarcReader};

use crate::error::Error;
use crate::sources::http;
use crate::types::RawCapture;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const WARC_MAGIC: &[u8] = b"WARC/";

type Records = Box<dyn Iterator<Item = Result<Record<BufferedBody>, warc::Error>> + Send>;

/// Entry counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReaderStats {
    /// every entry seen, including corrupt ones
    pub entries: usize,
    /// well-formed response entries
    pub responses: usize,
    /// request, warcinfo, metadata... entries
    pub non_response: usize,
    /// entries with broken framing or unparseable HTTP payloads
    pub corrupt: usize,
}

/// Archive reader instance.
///
/// Reads both compressed and decompressed archives. Common Crawl
/// files are gzipped per record and need a multi gz decoder (such as [MultiGzDecoder]).
pub struct ArchiveReader {
    records: Records,
    stats: ReaderStats,
}

impl ArchiveReader {
    /// Open an archive, gzipped or not.
    ///
    /// Fails with [Error::FatalInput] if the file does not start like a WARC file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let mut file = BufReader::new(File::open(path)?);
        let gzipped = file.fill_buf()?.starts_with(&GZIP_MAGIC);

        // we use a different reader from the default one in the warc crate to
        // manage multipart gzipped content.
        let archive = if gzipped {
            debug!("{:?}: gzip stream", path);
            Self::new(BufReader::new(MultiGzDecoder::new(file)))?
        } else {
            Self::new(file)?
        };
        info!("opened archive {:?}", path);
        Ok(archive)
    }

    /// Wrap a buffered reader.
    ///
    /// Leading whitespace is skipped, then the stream must start with `WARC/`.
    pub fn new<R: BufRead + Send + 'static>(mut reader: R) -> Result<Self, Error> {
        loop {
            let buf = reader.fill_buf()?;
            if buf.is_empty() {
                return Err(Error::FatalInput("empty archive".to_string()));
            }
            let blanks = buf.iter().take_while(|b| b.is_ascii_whitespace()).count();
            if blanks == 0 {
                break;
            }
            reader.consume(blanks);
        }

        let head = reader.fill_buf()?;
        let prefix = &head[..head.len().min(WARC_MAGIC.len())];
        if prefix != WARC_MAGIC {
            return Err(Error::FatalInput(format!(
                "missing WARC version line (starts with {:?})",
                String::from_utf8_lossy(prefix)
            )));
        }

        Ok(Self {
            records: Box::new(WarcReader::new(reader).iter_records()),
            stats: ReaderStats::default(),
        })
    }

    pub fn stats(&self) -> ReaderStats {
        self.stats
    }

    /// Convert a well-formed record into a capture.
    ///
    /// `Ok(None)` means that the record is not a response.
    fn to_capture(&self, record: Record<BufferedBody>) -> Result<Option<RawCapture>, ()> {
        let (headers, body) = record.into_raw_parts();
        let get = |h: WarcHeader| {
            headers
                .headers
                .get(&h)
                .map(|v| String::from_utf8_lossy(v).trim().to_string())
        };

        match get(WarcHeader::WarcType) {
            Some(t) if t.eq_ignore_ascii_case("response") => (),
            _ => return Ok(None),
        }

        let url = get(WarcHeader::TargetURI).ok_or(())?;
        let ip_address = get(WarcHeader::IPAddress);
        let response = http::parse_response(body).ok_or(())?;

        Ok(Some(RawCapture {
            offset: self.stats.entries - 1,
            url,
            ip_address,
            status: response.status,
            headers: response.headers,
            body: response.body,
        }))
    }
}

impl Iterator for ArchiveReader {
    type Item = RawCapture;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = self.records.next()?;
            self.stats.entries += 1;
            match record {
                Ok(record) => match self.to_capture(record) {
                    Ok(Some(capture)) => {
                        self.stats.responses += 1;
                        return Some(capture);
                    }
                    Ok(None) => self.stats.non_response += 1,
                    Err(()) => {
                        debug!("entry {}: unparseable response", self.stats.entries - 1);
                        self.stats.corrupt += 1;
                    }
                },
                Err(e) => {
                    warn!("entry {}: corrupt record: {:?}", self.stats.entries - 1, e);
                    self.stats.corrupt += 1;
                }
            }
        }
    }
}

/// Build an uncompressed WARC `response` record (test/bench fixture).
#[doc(hidden)]
pub fn warc_response(url: &str, http_payload: &str) -> String {
    warc_record("response", url, http_payload)
}

/// Build an uncompressed WARC record of any type (test/bench fixture).
#[doc(hidden)]
pub fn warc_record(warc_type: &str, url: &str, payload: &str) -> String {
    format!(
        "WARC/1.0\r\n\
         WARC-Type: {warc_type}\r\n\
         WARC-Date: 2021-02-24T17:02:28Z\r\n\
         WARC-Record-ID: <urn:uuid:c7f19cbd-e348-48ff-9a92-4852b114b6db>\r\n\
         WARC-Target-URI: {url}\r\n\
         WARC-IP-Address: 192.0.2.1\r\n\
         Content-Type: application/http; msgtype={warc_type}\r\n\
         Content-Length: {}\r\n\
         \r\n\
         {payload}\r\n\r\n",
        payload.len()
    )
}
