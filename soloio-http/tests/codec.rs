//! Codec round-trips over a real socket: what `write_to` produces,
//! `read_from` must reproduce.

use std::net::{TcpListener as StdListener, TcpStream as StdStream};
use std::os::fd::IntoRawFd;

use bytes::Bytes;
use soloio::{AsyncFd, BufReader, BufWriter, Runtime, when_all};
use soloio_http::{HeaderMap, HttpError, Method, Request, Response};

/// Two connected runtime-side fds over loopback.
fn fd_pair() -> (AsyncFd, AsyncFd) {
    let listener = StdListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let client = StdStream::connect(addr).unwrap();
    let (server, _) = listener.accept().unwrap();
    (
        AsyncFd::adopt(client.into_raw_fd()).unwrap(),
        AsyncFd::adopt(server.into_raw_fd()).unwrap(),
    )
}

fn round_trip_request(req: Request) -> Request {
    let rt = Runtime::new().unwrap();
    let reactor = rt.reactor();
    let (a, b) = fd_pair();

    let write_side = {
        let reactor = reactor.clone();
        let req = req.clone();
        async move {
            let mut writer = BufWriter::new(&reactor, &a);
            req.write_to(&mut writer).await.unwrap();
        }
    };
    let read_side = {
        let reactor = reactor.clone();
        async move {
            let mut reader = BufReader::new(&reactor, &b);
            Request::read_from(&mut reader).await.unwrap()
        }
    };

    let ((), parsed) = rt.block_on(when_all(write_side, read_side)).unwrap();
    parsed
}

fn round_trip_response(res: Response) -> Response {
    let rt = Runtime::new().unwrap();
    let reactor = rt.reactor();
    let (a, b) = fd_pair();

    let write_side = {
        let reactor = reactor.clone();
        let res = res.clone();
        async move {
            let mut writer = BufWriter::new(&reactor, &a);
            res.write_to(&mut writer).await.unwrap();
        }
    };
    let read_side = {
        let reactor = reactor.clone();
        async move {
            let mut reader = BufReader::new(&reactor, &b);
            Response::read_from(&mut reader).await.unwrap()
        }
    };

    let ((), parsed) = rt.block_on(when_all(write_side, read_side)).unwrap();
    parsed
}

#[test]
fn request_round_trip_bare() {
    let req = Request::new(Method::Get, "/");
    assert_eq!(round_trip_request(req.clone()), req);
}

#[test]
fn request_round_trip_with_headers_and_body() {
    let mut req = Request::new(Method::Post, "/submit?kind=note");
    req.headers.insert("Host", "example.org");
    req.headers.insert("X-Trace_Id", "abc-123");
    req.headers.insert("Accept", "text/plain");
    req.body = Bytes::from_static(b"some opaque payload \x01\x02\x03");
    assert_eq!(round_trip_request(req.clone()), req);
}

#[test]
fn request_round_trip_preserves_header_spelling() {
    let mut req = Request::new(Method::Put, "/case");
    req.headers.insert("x-MiXeD-Case", "kept");
    let parsed = round_trip_request(req);
    let (name, value) = parsed.headers.iter().next().unwrap();
    assert_eq!(name, "x-MiXeD-Case");
    assert_eq!(value, "kept");
}

#[test]
fn response_round_trip() {
    let res = Response::new(200)
        .header("Content-Type", "text/html")
        .body("<h1>Hello, World!</h1>");
    assert_eq!(round_trip_response(res.clone()), res);
}

#[test]
fn response_round_trip_no_body() {
    let res = Response::new(302).header("Location", "/home/");
    assert_eq!(round_trip_response(res.clone()), res);
}

#[test]
fn parse_rejects_malformed_framing() {
    let rt = Runtime::new().unwrap();
    let reactor = rt.reactor();

    let cases: &[&[u8]] = &[
        b"GET /\r\n\r\n",                              // no version
        b"GET / HTTP/1.0\r\n\r\n",                     // wrong version
        b"BREW / HTTP/1.1\r\n\r\n",                    // unknown method
        b"GET / HTTP/1.1\r\nBad Header\r\n\r\n",       // no colon
        b"GET / HTTP/1.1\r\nX:\r\n\r\n",               // empty value
        b"GET / HTTP/1.1\r\nContent-Length: x\r\n\r\n", // bad length
        b"GET / HTTP/1.1\r\nContent-Length: 10\r\n\r\nabc", // short body
        b"GET / HTTP/1.1\r\nHost: x\r\n",              // EOF before blank line
    ];

    for wire in cases {
        let (a, b) = fd_pair();
        let reactor2 = reactor.clone();
        let write_side = async move {
            {
                let mut writer = BufWriter::new(&reactor2, &a);
                writer.write(wire).await.unwrap();
                writer.flush().await.unwrap();
            }
            drop(a); // EOF so short bodies terminate
        };
        let reactor3 = reactor.clone();
        let read_side = async move {
            let mut reader = BufReader::new(&reactor3, &b);
            Request::read_from(&mut reader).await
        };
        let ((), outcome) = rt.block_on(when_all(write_side, read_side)).unwrap();
        assert!(outcome.is_err(), "parsed unexpectedly: {wire:?}");
    }
}

#[test]
fn parse_accepts_zero_headers() {
    let rt = Runtime::new().unwrap();
    let reactor = rt.reactor();
    let (a, b) = fd_pair();

    let reactor2 = reactor.clone();
    let write_side = async move {
        let mut writer = BufWriter::new(&reactor2, &a);
        writer.write(b"GET /bare HTTP/1.1\r\n\r\n").await.unwrap();
        writer.flush().await.unwrap();
    };
    let reactor3 = reactor.clone();
    let read_side = async move {
        let mut reader = BufReader::new(&reactor3, &b);
        Request::read_from(&mut reader).await
    };

    let ((), outcome) = rt.block_on(when_all(write_side, read_side)).unwrap();
    let req = outcome.unwrap();
    assert_eq!(req.method, Method::Get);
    assert_eq!(req.target, "/bare");
    assert!(req.headers.is_empty());
}

#[test]
fn serialized_wire_shape() {
    // Inspect the exact bytes: status line, name-ordered headers,
    // regenerated Content-Length, blank line, body.
    let rt = Runtime::new().unwrap();
    let reactor = rt.reactor();
    let (a, b) = fd_pair();

    let headers: HeaderMap = [
        ("Content-Type", "text/plain"),
        ("Content-Length", "999"),
    ]
    .into_iter()
    .collect();
    let res = Response {
        status: 200,
        headers,
        body: Bytes::from_static(b"hi"),
    };

    let reactor2 = reactor.clone();
    let write_side = async move {
        {
            let mut writer = BufWriter::new(&reactor2, &a);
            res.write_to(&mut writer).await.unwrap();
        }
        drop(a);
    };
    let reactor3 = reactor.clone();
    let read_side = async move {
        let mut reader = BufReader::new(&reactor3, &b);
        let mut wire = Vec::new();
        loop {
            match reader.get_char().await.unwrap() {
                Some(byte) => wire.push(byte),
                None => break,
            }
        }
        wire
    };

    let ((), wire) = rt.block_on(when_all(write_side, read_side)).unwrap();
    let text = String::from_utf8(wire).unwrap();
    assert_eq!(
        text,
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 2\r\n\r\nhi"
    );
}

#[test]
fn io_errors_become_http_errors() {
    // Feed garbage UTF-8 in the request line and confirm the error
    // kind, exercising the From<soloio::Error> path as well.
    let rt = Runtime::new().unwrap();
    let reactor = rt.reactor();
    let (a, b) = fd_pair();

    let reactor2 = reactor.clone();
    let write_side = async move {
        let mut writer = BufWriter::new(&reactor2, &a);
        writer.write(b"\xff\xfe / HTTP/1.1\r\n\r\n").await.unwrap();
        writer.flush().await.unwrap();
    };
    let reactor3 = reactor.clone();
    let read_side = async move {
        let mut reader = BufReader::new(&reactor3, &b);
        Request::read_from(&mut reader).await
    };

    let ((), outcome) = rt.block_on(when_all(write_side, read_side)).unwrap();
    assert!(matches!(
        outcome.unwrap_err(),
        HttpError::MalformedRequestLine(_)
    ));
}
