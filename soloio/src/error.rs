use std::io;
use std::os::fd::RawFd;

use thiserror::Error;

/// Errors returned by the soloio runtime.
#[derive(Debug, Error)]
pub enum Error {
    /// A syscall failed with something other than EAGAIN.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The fd already has a live reactor registration. A task that needs
    /// both read and write readiness on one fd must combine the interest
    /// bits into a single wait.
    #[error("fd {fd} is already registered with the reactor")]
    AlreadyRegistered { fd: RawFd },
    /// Every port in the requested bind range was taken.
    #[error("no free port in {lo}..={hi}")]
    PortRangeExhausted { lo: u16, hi: u16 },
    /// The root task is unfinished but neither scheduler holds any work,
    /// so the loop can never make progress again.
    #[error("event loop stalled: root task pending with no timers or I/O registered")]
    Deadlock,
}

pub type Result<T> = std::result::Result<T, Error>;
