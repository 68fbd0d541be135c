//! Fasttext identifier
use std::path::Path;

use fasttext::FastText as FastTextLib;
use log::{debug, error};

use crate::error::Error;

use super::{Identification, Identify};

/// Default model file, looked up in the working directory.
pub const DEFAULT_MODEL: &str = "lid.176.bin";

/// Holds a [fasttext::FastText] instance and its parameters:
/// - [FastText::k], number of predicted languages on a text
/// - [FastText::threshold], prediction threshold
pub struct FastText {
    inner: FastTextLib,
    pub k: i32,
    pub threshold: f32,
}

impl FastText {
    /// Top-k predictions for a text.
    ///
    /// Returns Ok(None) if no prediction is over the threshold.
    /// Labels that cannot be converted are logged and ignored.
    pub fn predict(&self, text: &str) -> Result<Option<Vec<Identification>>, Error> {
        // fasttext reads lines, and chokes on null chars
        let text = text.replace(['\n', char::from(0)], " ");
        let predictions = self
            .inner
            .predict(&text, self.k, self.threshold)
            .map_err(Error::FastText)?;
        if predictions.is_empty() {
            return Ok(None);
        }

        let ids = predictions
            .into_iter()
            .filter_map(|pred| match Identification::try_from(pred) {
                Ok(id) => Some(id),
                Err(e) => {
                    error!("Couldn't find a proper label: {e:?}");
                    None
                }
            })
            .collect();
        Ok(Some(ids))
    }
}

impl Identify for FastText {
    fn identify(&self, text: &str) -> Result<Option<Identification>, Error> {
        let id = self
            .predict(text)?
            .and_then(|ids| ids.into_iter().next());
        debug!("{id:?}");
        Ok(id)
    }
}

/// Fasttext builder.
pub struct FastTextBuilder<'a> {
    path: Option<&'a Path>,
    k: Option<i32>,
    threshold: Option<f32>,
}

impl<'a> FastTextBuilder<'a> {
    fn init_fasttextlib(path: &Path) -> Result<FastTextLib, Error> {
        let path = path
            .to_str()
            .ok_or_else(|| Error::Custom(format!("invalid filepath for lid: {path:?}")))?;
        let mut ft = FastTextLib::new();
        ft.load_model(path).map_err(Error::FastText)?;
        Ok(ft)
    }

    /// attempt to build, resort to the following defaults if not set:
    /// - path: `lid.176.bin`
    /// - k: 1
    /// - threshold: 0.0
    pub fn build_or_default(&self) -> Result<FastText, Error> {
        let path = self.path.unwrap_or_else(|| Path::new(DEFAULT_MODEL));
        Ok(FastText {
            inner: Self::init_fasttextlib(path)?,
            k: self.k.unwrap_or(1),
            threshold: self.threshold.unwrap_or(0.0),
        })
    }

    pub fn build(&self) -> Result<FastText, Error> {
        let (path, k, threshold) = match (self.path, self.k, self.threshold) {
            (Some(p), Some(k), Some(t)) => (p, k, t),
            (None, _, _) => return Err(Error::Custom("No path provided".to_string())),
            (_, None, _) => return Err(Error::Custom("No k provided".to_string())),
            (_, _, None) => return Err(Error::Custom("No threshold provided".to_string())),
        };

        Ok(FastText {
            inner: Self::init_fasttextlib(path)?,
            k,
            threshold,
        })
    }

    pub fn path<'b>(&'b mut self, path: &'a Path) -> &'b mut FastTextBuilder<'a> {
        self.path = Some(path);
        self
    }

    pub fn k<'b>(&'b mut self, k: i32) -> &'b mut FastTextBuilder<'a> {
        self.k = Some(k);
        self
    }

    pub fn threshold<'b>(&'b mut self, threshold: f32) -> &'b mut FastTextBuilder<'a> {
        self.threshold = Some(threshold);
        self
    }
}

/// The threshold is left at 0 so that confidence filtering happens in the extractor.
impl<'a> Default for FastTextBuilder<'a> {
    fn default() -> Self {
        Self {
            path: Some(Path::new(DEFAULT_MODEL)),
            k: Some(1),
            threshold: Some(0.0),
        }
    }
}
