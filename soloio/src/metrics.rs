//! soloio runtime metrics.
//!
//! Process-wide counters for connections, bytes, and scheduler
//! activity. The runtime is single-threaded, so plain counters suffice;
//! they are registered with metriken and can be read by any exposition
//! layer the embedding application wires up.

use metriken::{Counter, metric};

#[metric(
    name = "soloio/connections/accepted",
    description = "Total inbound connections accepted"
)]
pub static CONNECTIONS_ACCEPTED: Counter = Counter::new();

#[metric(
    name = "soloio/connections/connected",
    description = "Total outbound connections established"
)]
pub static CONNECTIONS_CONNECTED: Counter = Counter::new();

#[metric(
    name = "soloio/bytes/received",
    description = "Total bytes read from runtime-owned fds"
)]
pub static BYTES_RECEIVED: Counter = Counter::new();

#[metric(
    name = "soloio/bytes/sent",
    description = "Total bytes written to runtime-owned fds"
)]
pub static BYTES_SENT: Counter = Counter::new();

#[metric(
    name = "soloio/timers/fired",
    description = "Total timer entries drained at or past their deadline"
)]
pub static TIMERS_FIRED: Counter = Counter::new();

#[metric(
    name = "soloio/reactor/polls",
    description = "Total epoll_wait calls made by the event loop"
)]
pub static REACTOR_POLLS: Counter = Counter::new();
