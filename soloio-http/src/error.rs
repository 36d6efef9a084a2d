use thiserror::Error;

/// Errors returned by the HTTP codec and router.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Runtime or syscall failure underneath the codec.
    #[error("I/O error: {0}")]
    Io(#[from] soloio::Error),
    /// Request line did not split into method, target, and version, or
    /// the version was not HTTP/1.1.
    #[error("malformed request line: {0:?}")]
    MalformedRequestLine(String),
    /// Status line did not start with `HTTP/1.1 <code>`.
    #[error("malformed status line: {0:?}")]
    MalformedStatusLine(String),
    /// The method token is not one this server speaks.
    #[error("invalid HTTP method: {0:?}")]
    InvalidMethod(String),
    /// Header line without a colon, an illegal name character, or an
    /// empty value.
    #[error("malformed header line: {0:?}")]
    MalformedHeader(String),
    /// The request target fits none of the four RFC 7230 forms.
    #[error("invalid request target: {0:?}")]
    InvalidTarget(String),
    /// Content-Length that does not parse as a byte count.
    #[error("invalid Content-Length: {0:?}")]
    InvalidContentLength(String),
    /// The peer hung up before the message was complete.
    #[error("connection closed before the message was complete")]
    UnexpectedEof,
    /// Route registration misuse (bad path, query params on a prefix
    /// route).
    #[error("invalid route registration: {0}")]
    InvalidRoute(String),
}
