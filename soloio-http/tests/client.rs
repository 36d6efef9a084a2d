//! Client-side end-to-end: HttpClient (its own runtime) against a
//! served router on a helper thread.

use std::net::Ipv4Addr;
use std::rc::Rc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use soloio::{Runtime, TcpListener};
use soloio_http::{HttpClient, Method, Response, Router, handle_connection};

fn spawn_server(connections: usize) -> u16 {
    let (port_tx, port_rx) = mpsc::channel();

    thread::spawn(move || {
        let rt = Runtime::new().unwrap();
        let reactor = rt.reactor();
        let timer = rt.timer();
        let spawner = rt.spawner();

        let mut router = Router::new();
        router
            .route(Method::Get, "/greet", |_req| async {
                Ok(Response::new(200)
                    .header("Content-Type", "text/plain")
                    .body("hi there"))
            })
            .unwrap();
        router
            .route(Method::Post, "/shout", |req| async move {
                let mut body = req.body.to_vec();
                body.make_ascii_uppercase();
                Ok(Response::new(200).body(body))
            })
            .unwrap();
        let router = Rc::new(router);

        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0).into()).unwrap();
        port_tx.send(listener.local_addr().port()).unwrap();

        rt.block_on(async move {
            for _ in 0..connections {
                let (stream, _peer) = listener.accept(&reactor).await.unwrap();
                spawner.spawn(handle_connection(reactor.clone(), stream, router.clone()));
            }
            soloio::sleep_for(&timer, Duration::from_millis(200)).await;
        })
        .unwrap();
    });

    port_rx.recv().unwrap()
}

#[test]
fn get_round_trip() {
    let port = spawn_server(1);

    let rt = Runtime::new().unwrap();
    let reactor = rt.reactor();
    let client = HttpClient::new(&reactor, (Ipv4Addr::LOCALHOST, port).into(), "localhost");

    let response = rt
        .block_on(async { client.get("/greet").send().await })
        .unwrap()
        .unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.headers.get("content-type"), Some("text/plain"));
    assert_eq!(&response.body[..], b"hi there");
}

#[test]
fn post_with_body_and_headers() {
    let port = spawn_server(1);

    let rt = Runtime::new().unwrap();
    let reactor = rt.reactor();
    let client = HttpClient::new(&reactor, (Ipv4Addr::LOCALHOST, port).into(), "localhost");

    let response = rt
        .block_on(async {
            client
                .post("/shout")
                .header("X-Request-Id", "42")
                .body("quiet words")
                .send()
                .await
        })
        .unwrap()
        .unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(&response.body[..], b"QUIET WORDS");
}

#[test]
fn miss_gets_the_404_synthesis() {
    let port = spawn_server(1);

    let rt = Runtime::new().unwrap();
    let reactor = rt.reactor();
    let client = HttpClient::new(&reactor, (Ipv4Addr::LOCALHOST, port).into(), "localhost");

    let response = rt
        .block_on(async { client.get("/no-such-route").send().await })
        .unwrap()
        .unwrap();
    assert_eq!(response.status, 404);
}
