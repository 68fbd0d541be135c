//! Archive sources.
//!
//! Mainly exists to wrap warc's library [warc::WarcReader] and an efficient gzip library.
//!
//! [archive::ArchiveReader] implements [Iterator] over contained [crate::types::RawCapture].
pub mod archive;
mod http;

pub use archive::{ArchiveReader, ReaderStats};
