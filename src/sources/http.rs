//! HTTP response payload splitting.
//!
//! WARC `response` records hold the raw HTTP message: status line, headers, blank line, body.
use std::collections::HashMap;

/// Parsed HTTP response.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

/// Locate the end of the header block.
///
/// Returns (end of headers, start of body).
fn header_end(payload: &[u8]) -> Option<(usize, usize)> {
    let crlf = payload.windows(4).position(|w| w == b"\r\n\r\n");
    let lf = payload.windows(2).position(|w| w == b"\n\n");
    match (crlf, lf) {
        (Some(c), Some(l)) if l < c => Some((l, l + 2)),
        (Some(c), _) => Some((c, c + 4)),
        (None, Some(l)) => Some((l, l + 2)),
        (None, None) => None,
    }
}

/// Parse a raw HTTP response.
///
/// Returns [None] if there is no status line or no header terminator.
/// Header names are lower-cased, duplicate names keep the last value.
pub(crate) fn parse_response(mut payload: Vec<u8>) -> Option<HttpResponse> {
    let (end, body_start) = header_end(&payload)?;
    let head = String::from_utf8_lossy(&payload[..end]).into_owned();
    let mut lines = head.lines();

    let status_line = lines.next()?;
    let mut parts = status_line.split_whitespace();
    let protocol = parts.next()?;
    if !protocol.starts_with("HTTP/") {
        return None;
    }
    let status = parts.next()?.parse::<u16>().ok()?;

    let headers = lines
        .filter_map(|line| {
            let (name, value) = line.split_once(':')?;
            Some((name.trim().to_ascii_lowercase(), value.trim().to_string()))
        })
        .collect();

    let body = payload.split_off(body_start);
    Some(HttpResponse {
        status,
        headers,
        body,
    })
}
