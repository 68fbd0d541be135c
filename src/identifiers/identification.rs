//! Identification and label conversion.
use fasttext::Prediction;
use oxilangtag::{LanguageTag, LanguageTagParseError};

const LABEL_PREFIX: &str = "__label__";

/// Identified language along with its probability.
#[derive(Debug, Clone, PartialEq)]
pub struct Identification {
    label: LanguageTag<String>,
    prob: f32,
}

impl Identification {
    pub fn new(label: LanguageTag<String>, prob: f32) -> Self {
        Self { label, prob }
    }

    /// Get a reference to the identification's label.
    pub fn label(&self) -> &LanguageTag<String> {
        &self.label
    }

    /// Get a reference to the identification's prob.
    pub fn prob(&self) -> &f32 {
        &self.prob
    }
}

/// Convert a fasttext label (`__label__xx`) into a normalized BCP47 tag.
///
/// `lid.176.bin` labels are mainly correct BCP47, apart from a few
/// deprecated or non-standard ones that are fixed here.
pub fn label_to_tag(label: &str) -> Result<LanguageTag<String>, LanguageTagParseError> {
    let label = label.strip_prefix(LABEL_PREFIX).unwrap_or(label);
    let standard = match label {
        "sh" => "sr-Latn".to_string(),
        "tl" => "fil".to_string(),
        "als" => "gsw".to_string(),
        other => other.replace('_', "-"),
    };
    LanguageTag::parse_and_normalize(&standard)
}

impl TryFrom<Prediction> for Identification {
    type Error = LanguageTagParseError;
    fn try_from(prediction: Prediction) -> Result<Self, LanguageTagParseError> {
        Ok(Self::new(label_to_tag(&prediction.label)?, prediction.prob))
    }
}
