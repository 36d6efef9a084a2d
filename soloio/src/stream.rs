//! Buffered input/output streams over a non-blocking fd.
//!
//! Each side wraps an fd with one fixed-capacity buffer. The reader
//! keeps start/end cursors over an owned byte array; the writer fills a
//! `BytesMut` and drains it on flush. Bulk writes that would overflow
//! the buffer flush it and go to the fd directly — one syscall for the
//! payload instead of capacity-sized slices through the buffer. Both
//! sides count their syscalls, so that behavior is observable.

use bytes::BytesMut;
use std::io;

use crate::error::Result;
use crate::fd::{AsyncFd, IoOutcome};
use crate::metrics;
use crate::reactor::{Interest, ReactorHandle, wait_event};

/// Default buffer capacity for both stream sides.
pub const DEFAULT_BUF_CAPACITY: usize = 8 * 1024;

/// Per-stream syscall accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// read()/write() syscalls issued, including ones that returned
    /// EAGAIN.
    pub syscalls: u64,
    /// Payload bytes that actually crossed the fd.
    pub bytes: u64,
}

/// Buffered, delimiter-aware input stream.
pub struct BufReader<'a> {
    reactor: ReactorHandle,
    fd: &'a AsyncFd,
    buf: Vec<u8>,
    start: usize,
    end: usize,
    eof: bool,
    stats: StreamStats,
}

impl<'a> BufReader<'a> {
    pub fn new(reactor: &ReactorHandle, fd: &'a AsyncFd) -> BufReader<'a> {
        Self::with_capacity(reactor, fd, DEFAULT_BUF_CAPACITY)
    }

    pub fn with_capacity(reactor: &ReactorHandle, fd: &'a AsyncFd, capacity: usize) -> BufReader<'a> {
        assert!(capacity > 0);
        BufReader {
            reactor: reactor.clone(),
            fd,
            buf: vec![0; capacity],
            start: 0,
            end: 0,
            eof: false,
            stats: StreamStats::default(),
        }
    }

    pub fn stats(&self) -> StreamStats {
        self.stats
    }

    /// Whether end-of-stream has been observed.
    pub fn saw_eof(&self) -> bool {
        self.eof
    }

    /// Refill the buffer with one best-effort read. Returns the byte
    /// count, with 0 meaning end-of-stream.
    async fn fill(&mut self) -> Result<usize> {
        debug_assert!(self.start <= self.end && self.end <= self.buf.len());
        if self.start == self.end {
            self.start = 0;
            self.end = 0;
        }
        loop {
            self.stats.syscalls += 1;
            match self.fd.read(&mut self.buf[self.end..]) {
                Ok(0) => {
                    self.eof = true;
                    return Ok(0);
                }
                Ok(n) => {
                    self.stats.bytes += n as u64;
                    metrics::BYTES_RECEIVED.add(n as u64);
                    self.end += n;
                    return Ok(n);
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    let readiness =
                        wait_event(&self.reactor, self.fd.raw(), Interest::READABLE).await?;
                    if !readiness.is_readable() && readiness.is_hup() {
                        self.eof = true;
                        return Ok(0);
                    }
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Next byte, or None at end-of-stream.
    pub async fn get_char(&mut self) -> Result<Option<u8>> {
        if self.start == self.end {
            if self.eof || self.fill().await? == 0 {
                return Ok(None);
            }
        }
        let byte = self.buf[self.start];
        self.start += 1;
        Ok(Some(byte))
    }

    /// Exactly `n` bytes, or whatever was left before end-of-stream
    /// with the hup flag set.
    pub async fn get_n(&mut self, n: usize) -> Result<IoOutcome<Vec<u8>>> {
        let mut out = Vec::with_capacity(n);
        while out.len() < n {
            if self.start == self.end && (self.eof || self.fill().await? == 0) {
                return Ok(IoOutcome { value: out, hup: true });
            }
            let take = (n - out.len()).min(self.end - self.start);
            out.extend_from_slice(&self.buf[self.start..self.start + take]);
            self.start += take;
        }
        Ok(IoOutcome { value: out, hup: false })
    }

    /// Bytes up to (and not including) the multi-byte delimiter. At
    /// end-of-stream before the delimiter, returns what was buffered
    /// with the hup flag set.
    pub async fn get_line(&mut self, delim: &[u8]) -> Result<IoOutcome<Vec<u8>>> {
        debug_assert!(!delim.is_empty());
        let mut out = Vec::new();
        loop {
            if out.ends_with(delim) {
                out.truncate(out.len() - delim.len());
                return Ok(IoOutcome { value: out, hup: false });
            }
            if self.start == self.end && (self.eof || self.fill().await? == 0) {
                return Ok(IoOutcome { value: out, hup: true });
            }
            out.push(self.buf[self.start]);
            self.start += 1;
        }
    }
}

/// Buffered output stream with a direct path for bulk writes.
pub struct BufWriter<'a> {
    reactor: ReactorHandle,
    fd: &'a AsyncFd,
    buf: BytesMut,
    capacity: usize,
    stats: StreamStats,
}

impl<'a> BufWriter<'a> {
    pub fn new(reactor: &ReactorHandle, fd: &'a AsyncFd) -> BufWriter<'a> {
        Self::with_capacity(reactor, fd, DEFAULT_BUF_CAPACITY)
    }

    pub fn with_capacity(reactor: &ReactorHandle, fd: &'a AsyncFd, capacity: usize) -> BufWriter<'a> {
        assert!(capacity > 0);
        BufWriter {
            reactor: reactor.clone(),
            fd,
            buf: BytesMut::with_capacity(capacity),
            capacity,
            stats: StreamStats::default(),
        }
    }

    pub fn stats(&self) -> StreamStats {
        self.stats
    }

    /// Bytes currently buffered and not yet flushed.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Append one byte, flushing first if the buffer is full.
    pub async fn put_char(&mut self, byte: u8) -> Result<IoOutcome<()>> {
        if self.buf.len() == self.capacity {
            let flushed = self.flush().await?;
            if flushed.hup {
                return Ok(flushed);
            }
        }
        self.buf.extend_from_slice(&[byte]);
        Ok(IoOutcome { value: (), hup: false })
    }

    /// Append a payload. When the buffered bytes plus the payload would
    /// exceed capacity, the buffer is flushed and the payload goes to
    /// the fd in one direct write instead of being sliced through the
    /// buffer.
    pub async fn write(&mut self, data: &[u8]) -> Result<IoOutcome<usize>> {
        if self.buf.len() + data.len() > self.capacity {
            let flushed = self.flush().await?;
            if flushed.hup {
                return Ok(IoOutcome { value: 0, hup: true });
            }
            return self.write_direct(data).await;
        }
        self.buf.extend_from_slice(data);
        Ok(IoOutcome {
            value: data.len(),
            hup: false,
        })
    }

    /// Drain the buffer to the fd.
    pub async fn flush(&mut self) -> Result<IoOutcome<()>> {
        if self.buf.is_empty() {
            return Ok(IoOutcome { value: (), hup: false });
        }
        let pending = self.buf.split().freeze();
        let outcome = self.write_direct(&pending).await?;
        Ok(IoOutcome {
            value: (),
            hup: outcome.hup,
        })
    }

    /// Write `data` to the fd until done, suspending on EAGAIN. The
    /// happy path is a single syscall; short writes retry with the
    /// remainder.
    async fn write_direct(&mut self, data: &[u8]) -> Result<IoOutcome<usize>> {
        let mut written = 0;
        while written < data.len() {
            self.stats.syscalls += 1;
            match self.fd.write(&data[written..]) {
                Ok(n) => {
                    self.stats.bytes += n as u64;
                    metrics::BYTES_SENT.add(n as u64);
                    written += n;
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    let readiness =
                        wait_event(&self.reactor, self.fd.raw(), Interest::WRITABLE).await?;
                    if !readiness.is_writable() && readiness.is_hup() {
                        return Ok(IoOutcome {
                            value: written,
                            hup: true,
                        });
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {
                    return Ok(IoOutcome {
                        value: written,
                        hup: true,
                    });
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(IoOutcome {
            value: written,
            hup: false,
        })
    }
}
