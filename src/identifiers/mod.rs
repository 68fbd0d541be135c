/*! Language identification models

Holds an [Identify] trait for implementing other ones.

The current identifier used is [fasttext](https://fasttext.cc) !*/
mod fasttext;
mod identification;

pub use self::fasttext::{FastText, FastTextBuilder};
pub use identification::{label_to_tag, Identification};

use crate::error::Error;

/// Language identification on a piece of text.
///
/// Implementors are shared between worker threads.
pub trait Identify: Send + Sync {
    /// Best identification, or [None] when the model has no prediction.
    fn identify(&self, text: &str) -> Result<Option<Identification>, Error>;
}
