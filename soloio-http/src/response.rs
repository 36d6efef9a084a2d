//! HTTP/1.1 response value, wire parsing, and serialization.

use bytes::Bytes;
use soloio::{BufReader, BufWriter};

use crate::error::HttpError;
use crate::headers::{HeaderMap, append_header_block, read_header_block};
use crate::status::reason_phrase;

/// An HTTP/1.1 response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: u16) -> Response {
        Response {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Builder-style header insertion.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Response {
        self.headers.insert(name, value);
        self
    }

    /// Builder-style body assignment.
    pub fn body(mut self, body: impl Into<Bytes>) -> Response {
        self.body = body.into();
        self
    }

    /// Read one response off the stream (the client side of the codec).
    pub async fn read_from(reader: &mut BufReader<'_>) -> Result<Response, HttpError> {
        let line = reader.get_line(b"\r\n").await?;
        if line.hup {
            return Err(HttpError::UnexpectedEof);
        }
        let text = String::from_utf8(line.value)
            .map_err(|_| HttpError::MalformedStatusLine(String::from("<non-utf8>")))?;

        let Some(rest) = text.strip_prefix("HTTP/1.1 ") else {
            return Err(HttpError::MalformedStatusLine(text.clone()));
        };
        let digits = rest.split_whitespace().next().unwrap_or("");
        let status: u16 = digits
            .parse()
            .map_err(|_| HttpError::MalformedStatusLine(text.clone()))?;

        let (headers, body) = read_header_block(reader).await?;
        Ok(Response {
            status,
            headers,
            body,
        })
    }

    /// Serialize onto the stream: status line with the registry reason
    /// phrase, headers (with `Content-Length` regenerated from the
    /// body), blank line, body.
    pub async fn write_to(&self, writer: &mut BufWriter<'_>) -> Result<(), HttpError> {
        let mut head = Vec::with_capacity(256);
        head.extend_from_slice(b"HTTP/1.1 ");
        head.extend_from_slice(self.status.to_string().as_bytes());
        head.push(b' ');
        head.extend_from_slice(reason_phrase(self.status).as_bytes());
        head.extend_from_slice(b"\r\n");
        append_header_block(&mut head, &self.headers, &self.body);

        if writer.write(&head).await?.hup {
            return Err(HttpError::UnexpectedEof);
        }
        if !self.body.is_empty() && writer.write(&self.body).await?.hup {
            return Err(HttpError::UnexpectedEof);
        }
        if writer.flush().await?.hup {
            return Err(HttpError::UnexpectedEof);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_chains() {
        let res = Response::new(200)
            .header("Content-Type", "text/html")
            .body("<h1>Hello, World!</h1>");
        assert_eq!(res.status, 200);
        assert_eq!(res.headers.get("content-type"), Some("text/html"));
        assert_eq!(&res.body[..], b"<h1>Hello, World!</h1>");
    }
}
