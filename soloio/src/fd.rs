//! Owning file-descriptor wrapper and best-effort non-blocking I/O.

use std::io;
use std::os::fd::RawFd;

use crate::error::Result;
use crate::metrics;
use crate::reactor::{Interest, ReactorHandle, wait_event};

/// Outcome of a best-effort read or write: how much moved, and whether
/// the other end hung up. Hang-up is not an error — the caller decides
/// what a short message means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IoOutcome<T> {
    pub value: T,
    pub hup: bool,
}

/// An owned non-blocking file descriptor.
///
/// Closes on drop unless constructed in borrow mode; move-only. Every
/// fd adopted by the runtime is switched to O_NONBLOCK up front, so a
/// stray blocking syscall can never stall the loop.
#[derive(Debug)]
pub struct AsyncFd {
    fd: RawFd,
    borrowed: bool,
}

impl AsyncFd {
    /// Take ownership of `fd`, setting it non-blocking. The fd is
    /// closed when the value drops.
    pub fn adopt(fd: RawFd) -> Result<AsyncFd> {
        set_nonblock(fd)?;
        Ok(AsyncFd { fd, borrowed: false })
    }

    /// Wrap a foreign-owned fd without closing it on drop. Still sets
    /// non-blocking — the owner shares the open file description.
    pub fn borrow_raw(fd: RawFd) -> Result<AsyncFd> {
        set_nonblock(fd)?;
        Ok(AsyncFd { fd, borrowed: true })
    }

    pub fn raw(&self) -> RawFd {
        self.fd
    }

    /// Give up ownership without closing.
    pub fn release(mut self) -> RawFd {
        let fd = self.fd;
        self.fd = -1;
        fd
    }

    /// One read syscall. EAGAIN comes back as `WouldBlock`; zero means
    /// end-of-stream.
    pub fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        let rc = unsafe { libc::read(self.fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
        if rc < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(rc as usize)
        }
    }

    /// One write syscall; short counts are returned as-is.
    pub fn write(&self, buf: &[u8]) -> io::Result<usize> {
        let rc = unsafe { libc::write(self.fd, buf.as_ptr() as *const libc::c_void, buf.len()) };
        if rc < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(rc as usize)
        }
    }
}

impl Drop for AsyncFd {
    fn drop(&mut self) {
        if self.fd >= 0 && !self.borrowed {
            unsafe {
                libc::close(self.fd);
            }
        }
    }
}

fn set_nonblock(fd: RawFd) -> Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL, 0) };
    if flags < 0 {
        return Err(io::Error::last_os_error().into());
    }
    let rc = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
    if rc < 0 {
        return Err(io::Error::last_os_error().into());
    }
    Ok(())
}

fn dup_std(fd: RawFd) -> Result<AsyncFd> {
    // Duplicate first: setting O_NONBLOCK directly on fd 0/1/2 would
    // alter the open file description the parent shell still uses.
    let duped = unsafe { libc::dup(fd) };
    if duped < 0 {
        return Err(io::Error::last_os_error().into());
    }
    AsyncFd::adopt(duped)
}

/// Non-blocking duplicate of standard input.
pub fn dup_stdin() -> Result<AsyncFd> {
    dup_std(libc::STDIN_FILENO)
}

/// Non-blocking duplicate of standard output.
pub fn dup_stdout() -> Result<AsyncFd> {
    dup_std(libc::STDOUT_FILENO)
}

/// Non-blocking duplicate of standard error.
pub fn dup_stderr() -> Result<AsyncFd> {
    dup_std(libc::STDERR_FILENO)
}

/// Best-effort read: one syscall's worth of bytes, suspending on EAGAIN
/// until the fd is readable. Never loops toward a full buffer.
pub async fn read_file(
    reactor: &ReactorHandle,
    file: &AsyncFd,
    buf: &mut [u8],
) -> Result<IoOutcome<usize>> {
    loop {
        match file.read(buf) {
            Ok(0) => return Ok(IoOutcome { value: 0, hup: true }),
            Ok(n) => {
                metrics::BYTES_RECEIVED.add(n as u64);
                return Ok(IoOutcome { value: n, hup: false });
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                let readiness = wait_event(reactor, file.raw(), Interest::READABLE).await?;
                if !readiness.is_readable() && readiness.is_hup() {
                    return Ok(IoOutcome { value: 0, hup: true });
                }
            }
            Err(err) => return Err(err.into()),
        }
    }
}

/// Best-effort write: one syscall's worth of bytes, suspending on
/// EAGAIN until the fd is writable. Short counts are returned as-is.
pub async fn write_file(
    reactor: &ReactorHandle,
    file: &AsyncFd,
    buf: &[u8],
) -> Result<IoOutcome<usize>> {
    loop {
        match file.write(buf) {
            Ok(n) => {
                metrics::BYTES_SENT.add(n as u64);
                return Ok(IoOutcome { value: n, hup: false });
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                let readiness = wait_event(reactor, file.raw(), Interest::WRITABLE).await?;
                if !readiness.is_writable() && readiness.is_hup() {
                    return Ok(IoOutcome { value: 0, hup: true });
                }
            }
            Err(err) => return Err(err.into()),
        }
    }
}

/// Read whatever the fd has to offer right now: wait until readable,
/// then drain in growing chunks until a read comes back short or
/// EAGAIN. The hup flag reports end-of-stream.
pub async fn read_available(reactor: &ReactorHandle, file: &AsyncFd) -> Result<IoOutcome<Vec<u8>>> {
    let readiness = wait_event(reactor, file.raw(), Interest::READABLE).await?;
    if !readiness.is_readable() && readiness.is_hup() {
        return Ok(IoOutcome {
            value: Vec::new(),
            hup: true,
        });
    }

    let mut out = Vec::new();
    let mut chunk = 64usize;
    let mut hup = false;
    loop {
        let existing = out.len();
        out.resize(existing + chunk, 0);
        match file.read(&mut out[existing..]) {
            Ok(0) => {
                out.truncate(existing);
                hup = true;
                break;
            }
            Ok(n) => {
                metrics::BYTES_RECEIVED.add(n as u64);
                out.truncate(existing + n);
                if n < chunk {
                    break;
                }
                if chunk < 65536 {
                    chunk *= 4;
                }
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                out.truncate(existing);
                break;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(IoOutcome { value: out, hup })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipe_pair() -> (AsyncFd, AsyncFd) {
        let mut fds = [0 as RawFd; 2];
        let rc = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) };
        assert_eq!(rc, 0);
        (AsyncFd::adopt(fds[0]).unwrap(), AsyncFd::adopt(fds[1]).unwrap())
    }

    #[test]
    fn adopt_sets_nonblock() {
        let (r, _w) = pipe_pair();
        let flags = unsafe { libc::fcntl(r.raw(), libc::F_GETFL, 0) };
        assert_ne!(flags & libc::O_NONBLOCK, 0);
    }

    #[test]
    fn read_empty_pipe_would_block() {
        let (r, _w) = pipe_pair();
        let mut buf = [0u8; 8];
        let err = r.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }

    #[test]
    fn write_then_read() {
        let (r, w) = pipe_pair();
        assert_eq!(w.write(b"abc").unwrap(), 3);
        let mut buf = [0u8; 8];
        assert_eq!(r.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], b"abc");
    }

    #[test]
    fn read_closed_pipe_is_eof() {
        let (r, w) = pipe_pair();
        drop(w);
        let mut buf = [0u8; 8];
        assert_eq!(r.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn borrow_mode_does_not_close() {
        let (r, w) = pipe_pair();
        let raw = w.raw();
        {
            let _borrow = AsyncFd::borrow_raw(raw).unwrap();
        }
        // The fd must still be open and usable after the borrow drops.
        assert_eq!(w.write(b"x").unwrap(), 1);
        let mut buf = [0u8; 1];
        assert_eq!(r.read(&mut buf).unwrap(), 1);
    }

    #[test]
    fn release_transfers_ownership() {
        let (_r, w) = pipe_pair();
        let raw = w.release();
        // Now we own it; close by re-adopting and dropping.
        let readopted = AsyncFd::adopt(raw).unwrap();
        drop(readopted);
    }
}
