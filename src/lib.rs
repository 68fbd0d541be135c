//! # ccqa
//!
//! Question/answer mining from web archives: WARC captures are minified,
//! question/answer structures are extracted from the markup, and records
//! of a same url are merged into a deduplicated corpus.
//!
//! The library exposes every stage; the `ccqa` binary wires them to the command line.
pub mod budget;
pub mod cli;
pub mod dom;
pub mod error;
pub mod extract;
pub mod identifiers;
pub mod io;
pub mod minify;
pub mod pipelines;
pub mod processing;
pub mod sources;
pub mod types;
