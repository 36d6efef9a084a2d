//! Minimal HTTP/1.1 client: one connection per request.
//!
//! The server side of this crate closes the connection after each
//! response, so the client does the mirror image — connect, send one
//! request, read one response, drop the socket. Requests are assembled
//! with a small builder.

use std::net::SocketAddr;

use bytes::Bytes;
use soloio::{BufReader, BufWriter, ReactorHandle, TcpStream};

use crate::error::HttpError;
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;

/// HTTP/1.1 client bound to one server address.
///
/// Cheap to keep around: it holds no socket, only the reactor handle
/// and the destination.
pub struct HttpClient {
    reactor: ReactorHandle,
    addr: SocketAddr,
    host: String,
}

impl HttpClient {
    pub fn new(reactor: &ReactorHandle, addr: SocketAddr, host: &str) -> HttpClient {
        HttpClient {
            reactor: reactor.clone(),
            addr,
            host: host.to_string(),
        }
    }

    /// Build a GET request.
    pub fn get(&self, path: &str) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::Get, path)
    }

    /// Build a POST request.
    pub fn post(&self, path: &str) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::Post, path)
    }

    /// Build a PUT request.
    pub fn put(&self, path: &str) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::Put, path)
    }

    /// Build a DELETE request.
    pub fn delete(&self, path: &str) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::Delete, path)
    }

    /// Send a fully built request and await the response.
    pub async fn send(&self, mut request: Request) -> Result<Response, HttpError> {
        if !self.host.is_empty() && !request.headers.contains("Host") {
            request.headers.insert("Host", self.host.clone());
        }

        let stream = TcpStream::connect(&self.reactor, self.addr).await?;
        let mut writer = BufWriter::new(&self.reactor, stream.fd());
        request.write_to(&mut writer).await?;

        let mut reader = BufReader::new(&self.reactor, stream.fd());
        Response::read_from(&mut reader).await
    }
}

/// Builder for one request through an [`HttpClient`].
pub struct RequestBuilder<'a> {
    client: &'a HttpClient,
    method: Method,
    path: String,
    headers: Vec<(String, String)>,
    body: Bytes,
}

impl<'a> RequestBuilder<'a> {
    fn new(client: &'a HttpClient, method: Method, path: &str) -> RequestBuilder<'a> {
        RequestBuilder {
            client,
            method,
            path: path.to_string(),
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// Add a header to the request.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Set the request body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Send the request and return the response.
    pub async fn send(self) -> Result<Response, HttpError> {
        let mut request = Request::new(self.method, self.path);
        for (name, value) in self.headers {
            request.headers.insert(name, value);
        }
        request.body = self.body;
        self.client.send(request).await
    }
}
