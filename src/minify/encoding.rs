//! Character encoding detection and transcoding.
//!
//! The charset is taken from, in order: a byte order mark, the HTTP `Content-Type`
//! header, `<meta charset>` / `<meta http-equiv>` in the first KiB of the body.
//! Unknown labels and undecodable bytes never fail a page: we fall back to
//! UTF-8 with replacement characters and report it.
//!
//! A document cannot declare itself UTF-16 from inside: its `<meta>` was readable
//! as ASCII. Such a declaration means UTF-8, and `x-user-defined` means windows-1252.
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8, WINDOWS_1252, X_USER_DEFINED};
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;

lazy_static! {
    static ref HEADER_CHARSET_RE: Regex =
        Regex::new(r#"(?i)charset\s*=\s*["']?([^"'\s;,]+)"#).unwrap();
    static ref META_CHARSET_RE: Regex =
        Regex::new(r#"(?i)<meta[^>]+charset\s*=\s*["']?([^"'\s/>;]+)"#).unwrap();
}

/// How a body got decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub text: String,
    /// name of the encoding that was used
    pub encoding: &'static str,
    /// the declared charset was unusable or the body had invalid sequences
    pub fallback: bool,
}

/// Charset label declared in a `Content-Type` value.
fn header_charset(content_type: &str) -> Option<&str> {
    HEADER_CHARSET_RE
        .captures(content_type)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Charset label declared in the document head.
fn meta_charset(body: &[u8]) -> Option<String> {
    let head = String::from_utf8_lossy(&body[..body.len().min(1024)]);
    META_CHARSET_RE
        .captures(&head)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Encoding to use for a charset declared in the document itself.
fn meta_encoding(declared: &'static Encoding) -> &'static Encoding {
    if declared == UTF_16LE || declared == UTF_16BE {
        UTF_8
    } else if declared == X_USER_DEFINED {
        WINDOWS_1252
    } else {
        declared
    }
}

/// Decode an HTML body to UTF-8.
pub fn decode(body: &[u8], content_type: Option<&str>) -> Decoded {
    let (declared, from_meta) = match content_type.and_then(header_charset) {
        Some(label) => (Some(label.to_string()), false),
        None => (meta_charset(body), true),
    };

    let (encoding, mut fallback) = match &declared {
        Some(label) => match Encoding::for_label(label.trim().as_bytes()) {
            Some(e) if from_meta => (meta_encoding(e), false),
            Some(e) => (e, false),
            None => {
                debug!("unknown charset {:?}, falling back to utf-8", label);
                (UTF_8, true)
            }
        },
        None => (UTF_8, false),
    };

    // decode() sniffs and strips a BOM, which overrides any declaration
    let (text, used, had_errors) = encoding.decode(body);
    if had_errors {
        debug!("invalid {} sequences replaced", used.name());
        fallback = true;
    }

    Decoded {
        text: text.into_owned(),
        encoding: used.name(),
        fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_default() {
        let d = decode("<p>héllo</p>".as_bytes(), None);
        assert_eq!(d.text, "<p>héllo</p>");
        assert_eq!(d.encoding, "UTF-8");
        assert!(!d.fallback);
    }

    #[test]
    fn header_charset_latin1() {
        let body = b"<p>caf\xe9</p>";
        let d = decode(body, Some("text/html; charset=ISO-8859-1"));
        assert_eq!(d.text, "<p>café</p>");
        // encoding_rs maps ISO-8859-1 to windows-1252 per WHATWG
        assert_eq!(d.encoding, "windows-1252");
        assert!(!d.fallback);
    }

    #[test]
    fn meta_charset_used_without_header() {
        let body = b"<html><head><meta charset=\"windows-1252\"></head><body>na\xefve</body></html>";
        let d = decode(body, Some("text/html"));
        assert!(d.text.contains("naïve"));
    }

    #[test]
    fn meta_utf16_means_utf8() {
        let body = "<html><head><meta charset=\"utf-16\"></head><body><h2>What is X?</h2><p>Café.</p></body></html>";
        let d = decode(body.as_bytes(), Some("text/html"));
        assert_eq!(d.encoding, "UTF-8");
        assert_eq!(d.text, body);
        assert!(!d.fallback);

        let d = decode(b"<meta charset=\"x-user-defined\"><p>caf\xe9</p>", None);
        assert_eq!(d.encoding, "windows-1252");
        assert!(d.text.contains("café"));
    }

    #[test]
    fn header_utf16_is_honored() {
        let body: Vec<u8> = "<p>hi</p>".encode_utf16().flat_map(u16::to_le_bytes).collect();
        let d = decode(&body, Some("text/html; charset=utf-16le"));
        assert_eq!(d.encoding, "UTF-16LE");
        assert_eq!(d.text, "<p>hi</p>");
    }

    #[test]
    fn http_equiv_charset() {
        let body = b"<meta http-equiv=\"Content-Type\" content=\"text/html; charset=iso-8859-1\"><p>\xe0</p>";
        let d = decode(body, None);
        assert!(d.text.contains("<p>à</p>"));
    }

    #[test]
    fn bogus_charset_falls_back() {
        let body = b"<p>caf\xe9 ok</p>";
        let d = decode(body, Some("text/html; charset=x-totally-bogus"));
        assert!(d.fallback);
        assert_eq!(d.encoding, "UTF-8");
        assert!(d.text.contains('\u{FFFD}'));
        assert!(d.text.contains("ok"));
    }

    #[test]
    fn bom_wins() {
        let mut body = vec![0xEF, 0xBB, 0xBF];
        body.extend_from_slice("<p>é</p>".as_bytes());
        let d = decode(&body, Some("text/html; charset=windows-1252"));
        assert_eq!(d.text, "<p>é</p>");
        assert_eq!(d.encoding, "UTF-8");
    }
}
