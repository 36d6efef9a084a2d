//! Case-insensitive header map and the shared header/body framing used
//! by both requests and responses.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use bytes::Bytes;
use soloio::BufReader;

use crate::error::HttpError;

/// A header name ordered case-insensitively while remembering the
/// spelling it was first seen with (which is what serialization emits).
#[derive(Debug, Clone)]
pub struct HeaderName(String);

impl HeaderName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for HeaderName {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeaderName {}

impl PartialOrd for HeaderName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeaderName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .bytes()
            .map(|b| b.to_ascii_lowercase())
            .cmp(other.0.bytes().map(|b| b.to_ascii_lowercase()))
    }
}

/// Ordered map of header name to value under case-insensitive name
/// ordering. Re-inserting an existing name overwrites the value and
/// keeps the first-seen spelling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    inner: BTreeMap<HeaderName, String>,
}

impl HeaderMap {
    pub fn new() -> HeaderMap {
        HeaderMap::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.insert(HeaderName(name.into()), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .get(&HeaderName(name.to_string()))
            .map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.inner.remove(&HeaderName(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Entries in case-insensitive name order, original spellings.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for HeaderMap {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in iter {
            map.insert(name, value);
        }
        map
    }
}

fn valid_name_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-'
}

/// Parse one `name: value` line. The space after the colon is optional
/// (RFC 7230 §3.2); the value is trimmed and must be non-empty; the
/// name is restricted to alphanumerics plus `_` and `-`.
fn parse_header_line(line: &str) -> Result<(&str, &str), HttpError> {
    let Some(colon) = line.find(':') else {
        return Err(HttpError::MalformedHeader(line.to_string()));
    };
    let name = &line[..colon];
    if name.is_empty() || !name.bytes().all(valid_name_byte) {
        return Err(HttpError::MalformedHeader(line.to_string()));
    }
    let value = line[colon + 1..].trim();
    if value.is_empty() {
        return Err(HttpError::MalformedHeader(line.to_string()));
    }
    Ok((name, value))
}

/// Read header lines up to the blank CRLF, then a `Content-Length`
/// body if one was announced. Premature EOF anywhere is a framing
/// error.
///
/// `Content-Length` is consumed here rather than kept in the map — the
/// body length carries the same information, and serialization always
/// regenerates the header from it. This keeps parse∘serialize an
/// identity on the message value.
pub(crate) async fn read_header_block(
    reader: &mut BufReader<'_>,
) -> Result<(HeaderMap, Bytes), HttpError> {
    let mut headers = HeaderMap::new();
    loop {
        let line = reader.get_line(b"\r\n").await?;
        if line.hup {
            return Err(HttpError::UnexpectedEof);
        }
        if line.value.is_empty() {
            break;
        }
        let text = String::from_utf8(line.value)
            .map_err(|err| HttpError::MalformedHeader(err.to_string()))?;
        let (name, value) = parse_header_line(&text)?;
        headers.insert(name, value);
    }

    let mut body = Bytes::new();
    if let Some(announced) = headers.remove("Content-Length") {
        let length: usize = announced
            .trim()
            .parse()
            .map_err(|_| HttpError::InvalidContentLength(announced.clone()))?;
        let read = reader.get_n(length).await?;
        if read.value.len() != length {
            return Err(HttpError::UnexpectedEof);
        }
        body = Bytes::from(read.value);
    }
    Ok((headers, body))
}

/// Append the header block to a wire image: every header except a
/// caller-supplied `Content-Length`, a regenerated `Content-Length`
/// when the body is non-empty, then the blank line.
pub(crate) fn append_header_block(out: &mut Vec<u8>, headers: &HeaderMap, body: &[u8]) {
    for (name, value) in headers.iter() {
        if name.eq_ignore_ascii_case("Content-Length") {
            continue;
        }
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    if !body.is_empty() {
        out.extend_from_slice(b"Content-Length: ");
        out.extend_from_slice(body.len().to_string().as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"\r\n");
}
