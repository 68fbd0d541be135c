//! Records flowing between pipeline stages.
//!
//! [RawCapture] → [MinifiedPage] → [QaRecord] → [AggregatedRecord].
//! Everything except [RawCapture] is persisted as JSON lines.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Language value used when identification is missing or not confident enough.
pub const UNKNOWN_LANGUAGE: &str = "unknown";

/// One HTTP response capture, as read from an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCapture {
    /// entry index in the archive
    pub offset: usize,
    pub url: String,
    pub ip_address: Option<String>,
    pub status: u16,
    /// HTTP headers, lower-cased names.
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl RawCapture {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// Minified page, one line of the minified artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinifiedPage {
    pub url: String,
    /// `WARC-IP-Address` of the capture
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    /// language declared by the page itself (`<html lang>`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    pub html: String,
}

impl MinifiedPage {
    /// Page without capture metadata.
    pub fn new(url: String, html: String) -> Self {
        Self {
            url,
            ip_address: None,
            lang: None,
            html,
        }
    }
}

/// A question/answer candidate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl QaPair {
    pub fn new(question: String, answer: String, context: Option<String>) -> Self {
        Self {
            question,
            answer,
            context,
        }
    }

    /// Whitespace-normalized copy.
    ///
    /// Two pairs are duplicates iff their normalized forms are equal.
    /// An empty context normalizes to `None`.
    pub fn normalized(&self) -> QaPair {
        let context = self
            .context
            .as_deref()
            .map(normalize_whitespace)
            .filter(|c| !c.is_empty());
        QaPair {
            question: normalize_whitespace(&self.question),
            answer: normalize_whitespace(&self.answer),
            context,
        }
    }
}

/// Per-page extraction result, one line of the QA artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaRecord {
    pub url: String,
    /// identified language of the pairs
    pub language: String,
    /// language declared by the page, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declared_language: Option<String>,
    pub qa_pairs: Vec<QaPair>,
}

/// Merged record for a given url, one line of the final corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedRecord {
    pub url: String,
    pub language: String,
    pub qa_pairs: Vec<QaPair>,
}

/// Collapse every whitespace run into a single space and trim.
pub fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for word in text.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}
