//! Connection-serving loop: accept, spawn a task per connection, parse
//! one request, route it, write the response.
//!
//! Shared by the demo binary and the test suites. A connection serves
//! one request and closes — keep-alive is not spoken here.

use std::rc::Rc;

use soloio::{BufReader, BufWriter, ReactorHandle, Spawner, TcpListener, TcpStream};

use crate::request::Request;
use crate::response::Response;
use crate::router::Router;

/// The response for a routing miss.
pub fn not_found() -> Response {
    Response::new(404)
        .header("Content-Type", "application/json")
        .body(r#"{ "message": "Cannot find a route." }"#)
}

/// Serve one connection: read a request, route, respond, close.
///
/// This is the per-connection error boundary: a malformed request
/// closes the socket silently, a handler failure is logged, and a
/// failed response write is ignored — the client is already gone.
pub async fn handle_connection(reactor: ReactorHandle, stream: TcpStream, router: Rc<Router>) {
    let mut reader = BufReader::new(&reactor, stream.fd());
    let mut writer = BufWriter::new(&reactor, stream.fd());

    let Ok(request) = Request::read_from(&mut reader).await else {
        return;
    };

    let response = match router.find_route(request.method, &request.target) {
        None => not_found(),
        Some(handler) => match handler(request).await {
            Ok(response) => response,
            Err(err) => {
                eprintln!("handler error: {err}");
                return;
            }
        },
    };

    let _ = response.write_to(&mut writer).await;
}

/// Accept connections forever, spawning [`handle_connection`] for each.
/// Returns the error that stopped the accept loop.
pub async fn serve(
    reactor: ReactorHandle,
    spawner: Spawner,
    listener: TcpListener,
    router: Rc<Router>,
) -> soloio::Error {
    loop {
        match listener.accept(&reactor).await {
            Ok((stream, _peer)) => {
                spawner.spawn(handle_connection(reactor.clone(), stream, router.clone()));
            }
            Err(err) => return err,
        }
    }
}
