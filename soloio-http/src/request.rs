//! HTTP/1.1 request value, wire parsing, and serialization.

use bytes::Bytes;
use soloio::{BufReader, BufWriter};

use crate::error::HttpError;
use crate::headers::{HeaderMap, append_header_block, read_header_block};
use crate::method::Method;
use crate::target::Target;

/// An HTTP/1.1 request. Bodies are `Content-Length`-framed; chunked
/// transfer is not spoken here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    /// The request target exactly as it appeared on the wire.
    pub target: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Request {
    pub fn new(method: Method, target: impl Into<String>) -> Request {
        Request {
            method,
            target: target.into(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Classify the request target into its RFC 7230 form.
    pub fn parse_target(&self) -> Result<Target, HttpError> {
        Target::parse(&self.target)
    }

    /// Read one request off the stream.
    ///
    /// Framing errors (bad request line, bad header, short body) are
    /// hard failures — the connection is not recoverable after one.
    pub async fn read_from(reader: &mut BufReader<'_>) -> Result<Request, HttpError> {
        let line = reader.get_line(b"\r\n").await?;
        if line.hup {
            return Err(HttpError::UnexpectedEof);
        }
        let text = String::from_utf8(line.value)
            .map_err(|_| HttpError::MalformedRequestLine(String::from("<non-utf8>")))?;

        let mut parts = text.split_whitespace();
        let (Some(method_token), Some(target), Some(version)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(HttpError::MalformedRequestLine(text.clone()));
        };
        if parts.next().is_some() || !version.ends_with("HTTP/1.1") {
            return Err(HttpError::MalformedRequestLine(text.clone()));
        }
        let method = Method::parse(method_token)
            .ok_or_else(|| HttpError::InvalidMethod(method_token.to_string()))?;
        let target = target.to_string();

        let (headers, body) = read_header_block(reader).await?;
        Ok(Request {
            method,
            target,
            headers,
            body,
        })
    }

    /// Serialize onto the stream: request line, headers (with
    /// `Content-Length` regenerated from the body), blank line, body.
    pub async fn write_to(&self, writer: &mut BufWriter<'_>) -> Result<(), HttpError> {
        let mut head = Vec::with_capacity(256);
        head.extend_from_slice(self.method.as_str().as_bytes());
        head.push(b' ');
        head.extend_from_slice(self.target.as_bytes());
        head.extend_from_slice(b" HTTP/1.1\r\n");
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
    fn new_request_is_empty() {
        let req = Request::new(Method::Get, "/");
        assert_eq!(req.method, Method::Get);
        assert_eq!(req.target, "/");
        assert!(req.headers.is_empty());
        assert!(req.body.is_empty());
    }

    #[test]
    fn parse_target_delegates() {
        let req = Request::new(Method::Get, "/where?q=now");
        let target = req.parse_target().unwrap();
        assert_eq!(target.path(), Some("/where"));

        let req = Request::new(Method::Options, "*");
        assert_eq!(req.parse_target().unwrap(), Target::Asterisk);
    }
}
