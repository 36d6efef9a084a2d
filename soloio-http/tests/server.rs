//! End-to-end: a full server on the runtime, exercised with std TCP
//! clients from the test thread.

use std::io::{Read, Write};
use std::net::{Ipv4Addr, TcpStream as StdStream};
use std::rc::Rc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use soloio::{Runtime, TcpListener};
use soloio_http::{Method, Request, Response, Router, handle_connection};

fn build_router() -> Router {
    let mut router = Router::new();
    router
        .route(Method::Get, "/", |_req| async {
            Ok(Response::new(302).header("Location", "/home/"))
        })
        .unwrap();
    router
        .route(Method::Get, "/home/", |_req| async {
            Ok(Response::new(200)
                .header("Content-Type", "text/html")
                .body("<h1>Hello, World!</h1>"))
        })
        .unwrap();
    router
        .route_prefix(Method::Get, "/", |_req| async {
            Ok(Response::new(404)
                .header("Content-Type", "application/json")
                .body(r#"{ "message": "Cannot find a route." }"#))
        })
        .unwrap();
    router
        .route(Method::Post, "/echo-body", |req: Request| async move {
            Ok(Response::new(200).body(req.body))
        })
        .unwrap();
    router
}

/// Serve `connections` requests on a helper thread, returning the port.
fn spawn_server(connections: usize) -> u16 {
    let (port_tx, port_rx) = mpsc::channel();

    thread::spawn(move || {
        let rt = Runtime::new().unwrap();
        let reactor = rt.reactor();
        let timer = rt.timer();
        let spawner = rt.spawner();
        let router = Rc::new(build_router());
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0).into()).unwrap();
        port_tx.send(listener.local_addr().port()).unwrap();

        rt.block_on(async move {
            for _ in 0..connections {
                let (stream, _peer) = listener.accept(&reactor).await.unwrap();
                spawner.spawn(handle_connection(reactor.clone(), stream, router.clone()));
            }
            // Let in-flight connection tasks finish before the loop exits.
            soloio::sleep_for(&timer, Duration::from_millis(200)).await;
        })
        .unwrap();
    });

    port_rx.recv().unwrap()
}

/// Issue one request, returning (status, body).
fn get(port: u16, request: &str) -> (u16, Vec<u8>) {
    let mut stream = StdStream::connect((Ipv4Addr::LOCALHOST, port)).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    stream.write_all(request.as_bytes()).unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).unwrap();
    let text = String::from_utf8_lossy(&raw);

    let status: u16 = text
        .strip_prefix("HTTP/1.1 ")
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|digits| digits.parse().ok())
        .unwrap_or_else(|| panic!("bad response: {text:?}"));

    let body = match text.find("\r\n\r\n") {
        Some(pos) => raw[pos + 4..].to_vec(),
        None => Vec::new(),
    };
    (status, body)
}

#[test]
fn root_redirects() {
    let port = spawn_server(1);
    let (status, _body) = get(port, "GET / HTTP/1.1\r\nHost: t\r\n\r\n");
    assert_eq!(status, 302);
}

#[test]
fn home_with_and_without_trailing_slash() {
    let port = spawn_server(2);
    let (status, body) = get(port, "GET /home/ HTTP/1.1\r\nHost: t\r\n\r\n");
    assert_eq!(status, 200);
    assert_eq!(body, b"<h1>Hello, World!</h1>");

    // No trailing slash: the exact table retries with one appended.
    let (status, body) = get(port, "GET /home HTTP/1.1\r\nHost: t\r\n\r\n");
    assert_eq!(status, 200);
    assert_eq!(body, b"<h1>Hello, World!</h1>");
}

#[test]
fn unknown_path_falls_back_to_prefix_404() {
    let port = spawn_server(1);
    let (status, body) = get(port, "GET /not-found HTTP/1.1\r\nHost: t\r\n\r\n");
    assert_eq!(status, 404);
    assert_eq!(body, br#"{ "message": "Cannot find a route." }"#);
}

#[test]
fn post_body_is_framed_by_content_length() {
    let port = spawn_server(1);
    let (status, body) = get(
        port,
        "POST /echo-body HTTP/1.1\r\nHost: t\r\nContent-Length: 11\r\n\r\nhello bytes",
    );
    assert_eq!(status, 200);
    assert_eq!(body, b"hello bytes");
}

#[test]
fn malformed_request_closes_silently() {
    let port = spawn_server(2);

    let mut stream = StdStream::connect((Ipv4Addr::LOCALHOST, port)).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    stream.write_all(b"NOT-HTTP\r\n\r\n").unwrap();
    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).unwrap();
    assert!(raw.is_empty());

    // The server survives and serves the next connection.
    let (status, _) = get(port, "GET / HTTP/1.1\r\nHost: t\r\n\r\n");
    assert_eq!(status, 302);
}

#[test]
fn concurrent_clients() {
    let port = spawn_server(4);
    let handles: Vec<_> = (0..4)
        .map(|_| {
            thread::spawn(move || {
                let (status, _) = get(port, "GET /home/ HTTP/1.1\r\nHost: t\r\n\r\n");
                assert_eq!(status, 200);
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}
