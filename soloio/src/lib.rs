//! soloio — a single-threaded, readiness-driven async runtime.
//!
//! soloio runs every task on one thread over two cooperating
//! schedulers: an earliest-deadline timer queue and an epoll reactor.
//! The event loop drains due timers, then blocks in `epoll_wait` no
//! longer than the next deadline. Cancellation is dropping a future —
//! a dropped sleep erases its timer entry, a dropped I/O wait removes
//! its fd registration — so `when_any` races and `timeout()` tear down
//! their losers completely.
//!
//! There is no process-wide runtime: suspending operations take a
//! scheduler handle explicitly, and the `Rc`-based handles pin
//! everything to the constructing thread.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use soloio::{Runtime, sleep_for};
//!
//! fn main() -> Result<(), soloio::Error> {
//!     let rt = Runtime::new()?;
//!     let timer = rt.timer();
//!     let out = rt.block_on(async move {
//!         sleep_for(&timer, Duration::from_millis(10)).await;
//!         42
//!     })?;
//!     assert_eq!(out, 42);
//!     Ok(())
//! }
//! ```
//!
//! # Platform
//!
//! Linux only (epoll, accept4, pipe2).

// ── Internal modules ────────────────────────────────────────────────────
pub(crate) mod task;
pub(crate) mod waker;

// ── Public modules ──────────────────────────────────────────────────────
pub mod error;
pub mod fd;
pub mod join;
pub mod metrics;
pub mod net;
pub mod reactor;
pub mod runtime;
pub mod select;
pub mod stream;
pub mod timer;

// ── Re-exports: runtime core ────────────────────────────────────────────

/// Runtime errors.
pub use error::Error;
/// Crate-wide result alias.
pub use error::Result;
/// The event loop plus its schedulers.
pub use runtime::Runtime;
/// Handle for attaching background tasks to the runtime.
pub use runtime::Spawner;
/// Completion handle for a task spawned with [`Spawner::spawn_handle`].
pub use runtime::JoinHandle;
/// Opaque handle for a spawned task.
pub use task::TaskId;

// ── Re-exports: timers ──────────────────────────────────────────────────

/// Error returned when a [`timeout()`] expires.
pub use timer::Elapsed;
/// Future returned by [`sleep_for()`]/[`sleep_until()`].
pub use timer::Sleep;
/// Cloneable handle to the runtime's timer queue.
pub use timer::TimerHandle;
/// Create a future that completes after a duration.
pub use timer::sleep_for;
/// Create a future that completes at an absolute instant.
pub use timer::sleep_until;
/// Race a future against a deadline.
pub use timer::timeout;

// ── Re-exports: reactor ─────────────────────────────────────────────────

/// Events a wait asks for.
pub use reactor::Interest;
/// Cloneable handle to the runtime's reactor.
pub use reactor::ReactorHandle;
/// The event mask a completed wait observed.
pub use reactor::Readiness;
/// Future returned by [`wait_event()`].
pub use reactor::WaitEvent;
/// Suspend until an fd reports one of the requested events.
pub use reactor::wait_event;

// ── Re-exports: combinators ─────────────────────────────────────────────

/// Future returned by [`try_when_all()`].
pub use join::TryWhenAll;
/// Future returned by [`when_all()`].
pub use join::WhenAll;
/// Future returned by [`when_all3()`].
pub use join::WhenAll3;
/// Run two fallible futures concurrently, surfacing the first error
/// early while the sibling runs out in the background set.
pub use join::try_when_all;
/// Future returned by [`when_all_vec()`].
pub use join::WhenAllVec;
/// Run two futures concurrently, resolving once after both complete.
pub use join::when_all;
/// Run three futures concurrently, resolving once after all complete.
pub use join::when_all3;
/// Homogeneous-list form of [`when_all()`].
pub use join::when_all_vec;
/// Result of [`when_any()`] — which branch completed first.
pub use select::Either;
/// Result of [`when_any3()`] — which of three branches completed first.
pub use select::Either3;
/// Future returned by [`when_any()`].
pub use select::WhenAny;
/// Future returned by [`when_any3()`].
pub use select::WhenAny3;
/// Future returned by [`when_any_vec()`].
pub use select::WhenAnyVec;
/// Run two futures concurrently, resolving to whichever completes first.
pub use select::when_any;
/// Run three futures concurrently, resolving to whichever completes first.
pub use select::when_any3;
/// Homogeneous-list form of [`when_any()`].
pub use select::when_any_vec;

// ── Re-exports: fds, sockets, streams ───────────────────────────────────

/// An owned non-blocking file descriptor.
pub use fd::AsyncFd;
/// Outcome of a best-effort read or write (value plus hang-up flag).
pub use fd::IoOutcome;
/// Non-blocking duplicate of standard error.
pub use fd::dup_stderr;
/// Non-blocking duplicate of standard input.
pub use fd::dup_stdin;
/// Non-blocking duplicate of standard output.
pub use fd::dup_stdout;
/// Read whatever the fd has to offer right now.
pub use fd::read_available;
/// Best-effort read: one syscall's worth of bytes.
pub use fd::read_file;
/// Best-effort write: one syscall's worth of bytes.
pub use fd::write_file;
/// A listening TCP socket.
pub use net::TcpListener;
/// A connected TCP socket.
pub use net::TcpStream;
/// A bound UDP socket.
pub use net::UdpSocket;
/// Buffered, delimiter-aware input stream.
pub use stream::BufReader;
/// Buffered output stream with a direct path for bulk writes.
pub use stream::BufWriter;
/// Default buffer capacity for both stream sides.
pub use stream::DEFAULT_BUF_CAPACITY;
/// Per-stream syscall accounting.
pub use stream::StreamStats;
