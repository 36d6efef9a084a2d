//! Demo HTTP/1.1 server on the soloio runtime.
//!
//! Binds the first free TCP port in 9000–9200 on all interfaces,
//! prints the chosen port, and serves a small route table with one
//! spawned task per connection. Malformed requests close the
//! connection silently; handler failures are logged at the
//! per-connection boundary.

use std::net::Ipv4Addr;
use std::process::ExitCode;
use std::rc::Rc;

use soloio::{Runtime, TcpListener};
use soloio_http::{HttpError, Method, Response, Router, serve};

const PORT_RANGE: (u16, u16) = (9000, 9200);

fn build_router() -> Result<Router, HttpError> {
    let mut router = Router::new();
    router.route(Method::Get, "/", |_req| async {
        Ok(Response::new(302).header("Location", "/home/"))
    })?;
    router.route(Method::Get, "/home/", |_req| async {
        Ok(Response::new(200)
            .header("Content-Type", "text/html")
            .body("<h1>Hello, World!</h1>"))
    })?;
    Ok(router)
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let router = Rc::new(build_router()?);

    let runtime = Runtime::new()?;
    let reactor = runtime.reactor();
    let spawner = runtime.spawner();

    let (lo, hi) = PORT_RANGE;
    let listener = TcpListener::bind_range(Ipv4Addr::UNSPECIFIED.into(), lo, hi)?;
    println!("Server is listening on port {}...", listener.local_addr().port());

    // serve() runs until accepting itself fails; that failure is the
    // server's exit reason.
    let err = runtime.block_on(serve(reactor, spawner, listener, router))?;
    Err(err.into())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("server error: {err}");
            ExitCode::FAILURE
        }
    }
}
