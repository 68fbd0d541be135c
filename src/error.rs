//! Error enum
use std::fmt;

use oxilangtag::LanguageTagParseError;

/// Run-level errors.
///
/// Anything that happens while processing a single page is *not* an [Error]
/// but a [Skip], which is counted and never crosses the page boundary.
#[derive(Debug)]
#[allow(dead_code)]
pub enum Error {
    Io(std::io::Error),
    Warc(warc::Error),
    Serde(serde_json::Error),
    /// The input is not a recognizable archive at all.
    FatalInput(String),
    FastText(String),
    LanguageTag(LanguageTagParseError),
    Custom(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "io error: {e}"),
            Error::Warc(e) => write!(f, "warc error: {e:?}"),
            Error::Serde(e) => write!(f, "serialization error: {e}"),
            Error::FatalInput(msg) => write!(f, "unreadable input: {msg}"),
            Error::FastText(msg) => write!(f, "fasttext error: {msg}"),
            Error::LanguageTag(e) => write!(f, "invalid language tag: {e}"),
            Error::Custom(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Error {
        Error::Io(e)
    }
}

impl From<warc::Error> for Error {
    fn from(e: warc::Error) -> Error {
        Error::Warc(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Error {
        Error::Serde(e)
    }
}

impl From<LanguageTagParseError> for Error {
    fn from(e: LanguageTagParseError) -> Error {
        Error::LanguageTag(e)
    }
}

impl From<String> for Error {
    fn from(s: String) -> Error {
        Error::Custom(s)
    }
}

/// Recoverable, per-page outcome.
///
/// The page is dropped and the category is counted in the run summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Skip {
    /// Archive entry or intermediate line that could not be decoded.
    Corrupt,
    /// HTTP status outside of the 2xx range.
    NotOk(u16),
    /// Content type is not HTML.
    NotHtml,
    /// Body exceeds the configured size limit.
    TooLarge,
    /// Nothing left after minification.
    Empty,
    /// Page processing exceeded its time budget.
    Timeout,
    /// Processing panicked or failed in an unexpected way.
    Failed(String),
}

impl Skip {
    /// Category name used in run summaries.
    pub fn category(&self) -> &'static str {
        match self {
            Skip::Corrupt => "corrupt",
            Skip::NotOk(_) => "not_ok",
            Skip::NotHtml => "not_html",
            Skip::TooLarge => "too_large",
            Skip::Empty => "empty",
            Skip::Timeout => "timeout",
            Skip::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for Skip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Skip::NotOk(status) => write!(f, "not_ok ({status})"),
            Skip::Failed(msg) => write!(f, "failed ({msg})"),
            other => f.write_str(other.category()),
        }
    }
}
