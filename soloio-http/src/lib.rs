//! soloio-http — HTTP/1.1 codec and router for the soloio runtime.
//!
//! Requests and responses are plain values; parsing reads from a
//! [`soloio::BufReader`], serialization writes through a
//! [`soloio::BufWriter`]. Bodies are `Content-Length`-framed — no
//! chunked transfer encoding, no HTTP/2. The router is two-tier: an
//! exact-path table consulted first, then a slash-segmented trie for
//! longest-prefix fallback, with `*` (any-method) handlers losing to
//! method-specific ones at the same path.
//!
//! The `soloio-server` binary in this crate is the end-to-end exercise:
//! it binds the first free port in 9000–9200 and serves a small route
//! table, one task per connection.

pub mod client;
pub mod error;
pub mod headers;
pub mod method;
pub mod request;
pub mod response;
pub mod router;
pub mod server;
pub mod status;
pub mod target;

/// HTTP/1.1 client bound to one server address.
pub use client::HttpClient;
/// Builder for one request through an [`HttpClient`].
pub use client::RequestBuilder;
/// Errors returned by the codec and router.
pub use error::HttpError;
/// Ordered case-insensitive header map.
pub use headers::HeaderMap;
/// HTTP request method.
pub use method::Method;
/// An HTTP/1.1 request.
pub use request::Request;
/// An HTTP/1.1 response.
pub use response::Response;
/// A shared request handler.
pub use router::Handler;
/// Boxed future a handler returns.
pub use router::HandlerFuture;
/// Method-and-path router.
pub use router::Router;
/// Serve one connection: read a request, route, respond, close.
pub use server::handle_connection;
/// Accept connections forever, one spawned task per connection.
pub use server::serve;
/// Reason phrase for a status code.
pub use status::reason_phrase;
/// One of the four request-target forms.
pub use target::Target;
