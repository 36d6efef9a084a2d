//! I/O readiness reactor: epoll plus the registration table.
//!
//! Each wait is one registration. The table slot holds the parked
//! task's waker and the observed event mask; epoll userdata carries
//! `(slot, generation)` so a stale event for a recycled slot is
//! ignored rather than waking the wrong task. Deregistration lives on
//! the [`WaitEvent`] future's drop path — dropping a parked wait (task
//! cancellation) removes the fd from epoll on the spot.

use std::cell::RefCell;
use std::future::Future;
use std::io;
use std::ops::BitOr;
use std::os::fd::RawFd;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::metrics;

/// Events a wait asks for. Readable interest always includes peer
/// hang-up (RDHUP); hang-up and error bits are reported by the kernel
/// regardless of what was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interest(u32);

impl Interest {
    pub const READABLE: Interest = Interest((libc::EPOLLIN | libc::EPOLLRDHUP) as u32);
    pub const WRITABLE: Interest = Interest(libc::EPOLLOUT as u32);

    fn bits(self) -> u32 {
        self.0
    }
}

impl BitOr for Interest {
    type Output = Interest;

    fn bitor(self, rhs: Interest) -> Interest {
        Interest(self.0 | rhs.0)
    }
}

/// The event mask a completed wait observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness(u32);

impl Readiness {
    pub fn is_readable(self) -> bool {
        self.0 & libc::EPOLLIN as u32 != 0
    }

    pub fn is_writable(self) -> bool {
        self.0 & libc::EPOLLOUT as u32 != 0
    }

    /// Peer hung up (HUP or RDHUP). The stream layer reads this as
    /// end-of-stream.
    pub fn is_hup(self) -> bool {
        self.0 & (libc::EPOLLHUP | libc::EPOLLRDHUP) as u32 != 0
    }

    pub fn is_error(self) -> bool {
        self.0 & libc::EPOLLERR as u32 != 0
    }
}

/// Key of a live registration: slot index plus the generation it was
/// allocated under.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RegKey {
    index: u32,
    generation: u32,
}

struct RegSlot {
    fd: RawFd,
    waker: Option<Waker>,
    readiness: u32,
    generation: u32,
    active: bool,
}

impl RegSlot {
    fn vacant() -> Self {
        RegSlot {
            fd: -1,
            waker: None,
            readiness: 0,
            generation: 0,
            active: false,
        }
    }
}

fn encode_userdata(index: u32, generation: u32) -> u64 {
    (generation as u64) << 32 | index as u64
}

fn decode_userdata(data: u64) -> (u32, u32) {
    (data as u32, (data >> 32) as u32)
}

const EVENT_BATCH: usize = 64;

/// epoll instance plus the registration table.
pub(crate) struct Reactor {
    epfd: RawFd,
    slots: Vec<RegSlot>,
    free_list: Vec<u32>,
    registered: usize,
}

impl Reactor {
    pub(crate) fn new() -> Result<Self> {
        let epfd = unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) };
        if epfd < 0 {
            return Err(io::Error::last_os_error().into());
        }
        Ok(Reactor {
            epfd,
            slots: Vec::new(),
            free_list: Vec::new(),
            registered: 0,
        })
    }

    /// Register `fd` for the requested events, parking `waker`.
    ///
    /// The kernel rejects a second registration of the same fd (EEXIST);
    /// that is surfaced as [`Error::AlreadyRegistered`] — combine
    /// interest bits into one wait instead.
    pub(crate) fn register(&mut self, fd: RawFd, interest: Interest, waker: Waker) -> Result<RegKey> {
        let index = match self.free_list.pop() {
            Some(index) => index,
            None => {
                self.slots.push(RegSlot::vacant());
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        let generation = slot.generation;
        slot.fd = fd;
        slot.waker = Some(waker);
        slot.readiness = 0;
        slot.active = true;

        let mut event = libc::epoll_event {
            events: interest.bits(),
            u64: encode_userdata(index, generation),
        };
        let rc = unsafe { libc::epoll_ctl(self.epfd, libc::EPOLL_CTL_ADD, fd, &mut event) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            let slot = &mut self.slots[index as usize];
            slot.active = false;
            slot.waker = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free_list.push(index);
            if err.raw_os_error() == Some(libc::EEXIST) {
                return Err(Error::AlreadyRegistered { fd });
            }
            return Err(err.into());
        }
        self.registered += 1;
        Ok(RegKey { index, generation })
    }

    /// Refresh the waker of a live registration.
    pub(crate) fn update_waker(&mut self, key: RegKey, waker: Waker) {
        if let Some(slot) = self.slots.get_mut(key.index as usize)
            && slot.active
            && slot.generation == key.generation
        {
            slot.waker = Some(waker);
        }
    }

    /// Take the observed event mask, if any event arrived yet.
    pub(crate) fn take_readiness(&mut self, key: RegKey) -> Option<Readiness> {
        let slot = self.slots.get_mut(key.index as usize)?;
        if !slot.active || slot.generation != key.generation || slot.readiness == 0 {
            return None;
        }
        Some(Readiness(std::mem::take(&mut slot.readiness)))
    }

    /// Remove a registration. Idempotent — a stale key is a no-op.
    pub(crate) fn deregister(&mut self, key: RegKey) {
        let Some(slot) = self.slots.get_mut(key.index as usize) else {
            return;
        };
        if !slot.active || slot.generation != key.generation {
            return;
        }
        // EPOLL_CTL_DEL fails with EBADF/ENOENT when the fd was closed
        // first — the kernel already dropped the registration then.
        unsafe {
            libc::epoll_ctl(self.epfd, libc::EPOLL_CTL_DEL, slot.fd, std::ptr::null_mut());
        }
        slot.active = false;
        slot.waker = None;
        slot.readiness = 0;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(key.index);
        self.registered -= 1;
    }

    /// Number of live registrations. The event loop blocks in
    /// `epoll_wait` only when this is non-zero.
    pub(crate) fn registered_count(&self) -> usize {
        self.registered
    }

    /// Block up to `timeout` (indefinitely for None) and wake the owner
    /// of every ready fd.
    ///
    /// No user code runs during the batch: waking only queues the task,
    /// so a resumed task cannot invalidate a later event of the same
    /// batch. Registrations stay in place until their owner consumes
    /// the readiness (or is dropped).
    pub(crate) fn poll(&mut self, timeout: Option<Duration>) -> Result<usize> {
        let timeout_ms: i32 = match timeout {
            None => -1,
            // Round up so a 100µs wait does not become a busy loop.
            Some(d) => d
                .as_nanos()
                .div_ceil(1_000_000)
                .min(i32::MAX as u128) as i32,
        };
        let mut events: [libc::epoll_event; EVENT_BATCH] = unsafe { std::mem::zeroed() };
        let count = loop {
            let rc = unsafe {
                libc::epoll_wait(self.epfd, events.as_mut_ptr(), EVENT_BATCH as i32, timeout_ms)
            };
            if rc >= 0 {
                break rc as usize;
            }
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EINTR) {
                break 0;
            }
            return Err(err.into());
        };
        metrics::REACTOR_POLLS.increment();

        for event in &events[..count] {
            let (index, generation) = decode_userdata(event.u64);
            let Some(slot) = self.slots.get_mut(index as usize) else {
                continue;
            };
            if !slot.active || slot.generation != generation {
                continue;
            }
            slot.readiness |= event.events;
            if let Some(waker) = slot.waker.take() {
                waker.wake();
            }
        }
        Ok(count)
    }
}

impl Drop for Reactor {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.epfd);
        }
    }
}

/// Cloneable handle to the runtime's reactor. Suspending operations
/// take this handle explicitly.
#[derive(Clone)]
pub struct ReactorHandle {
    pub(crate) inner: Rc<RefCell<Reactor>>,
}

impl ReactorHandle {
    pub(crate) fn new() -> Result<Self> {
        Ok(ReactorHandle {
            inner: Rc::new(RefCell::new(Reactor::new()?)),
        })
    }

    /// Number of fds currently registered.
    pub fn registered_count(&self) -> usize {
        self.inner.borrow().registered_count()
    }
}

/// Future returned by [`wait_event()`]: resolves to the observed event
/// mask once the fd is ready.
///
/// First poll registers the fd; the registration is removed when the
/// wait resolves, and on the drop path when it does not — so a wait
/// abandoned mid-flight (task cancelled, `when_any` lost) leaves no
/// trace in the table.
pub struct WaitEvent {
    reactor: ReactorHandle,
    fd: RawFd,
    interest: Interest,
    key: Option<RegKey>,
}

impl Future for WaitEvent {
    type Output = Result<Readiness>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let mut reactor = this.reactor.inner.borrow_mut();
        match this.key {
            Some(key) => {
                if let Some(readiness) = reactor.take_readiness(key) {
                    reactor.deregister(key);
                    this.key = None;
                    return Poll::Ready(Ok(readiness));
                }
                reactor.update_waker(key, cx.waker().clone());
                Poll::Pending
            }
            None => match reactor.register(this.fd, this.interest, cx.waker().clone()) {
                Ok(key) => {
                    this.key = Some(key);
                    Poll::Pending
                }
                Err(err) => Poll::Ready(Err(err)),
            },
        }
    }
}

impl Drop for WaitEvent {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.reactor.inner.borrow_mut().deregister(key);
        }
    }
}

/// Suspend until `fd` reports one of the requested events, yielding the
/// observed mask (which may additionally carry HUP/ERR bits).
pub fn wait_event(reactor: &ReactorHandle, fd: RawFd, interest: Interest) -> WaitEvent {
    WaitEvent {
        reactor: reactor.clone(),
        fd,
        interest,
        key: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::task::Waker;

    fn pipe_pair() -> (RawFd, RawFd) {
        let mut fds = [0 as RawFd; 2];
        let rc = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_NONBLOCK | libc::O_CLOEXEC) };
        assert_eq!(rc, 0);
        (fds[0], fds[1])
    }

    fn close(fd: RawFd) {
        unsafe {
            libc::close(fd);
        }
    }

    #[test]
    fn register_deregister_counts() {
        let mut reactor = Reactor::new().unwrap();
        let (r, w) = pipe_pair();

        let key = reactor
            .register(r, Interest::READABLE, Waker::noop().clone())
            .unwrap();
        assert_eq!(reactor.registered_count(), 1);

        reactor.deregister(key);
        assert_eq!(reactor.registered_count(), 0);

        // Idempotent: the key is stale now.
        reactor.deregister(key);
        assert_eq!(reactor.registered_count(), 0);

        close(r);
        close(w);
    }

    #[test]
    fn double_registration_is_rejected() {
        let mut reactor = Reactor::new().unwrap();
        let (r, w) = pipe_pair();

        let key = reactor
            .register(r, Interest::READABLE, Waker::noop().clone())
            .unwrap();
        let err = reactor
            .register(r, Interest::WRITABLE, Waker::noop().clone())
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyRegistered { .. }));
        // The failed attempt must not leak a slot.
        assert_eq!(reactor.registered_count(), 1);

        reactor.deregister(key);
        close(r);
        close(w);
    }

    #[test]
    fn poll_observes_readable() {
        let mut reactor = Reactor::new().unwrap();
        let (r, w) = pipe_pair();

        let key = reactor
            .register(r, Interest::READABLE, Waker::noop().clone())
            .unwrap();

        // Nothing to read yet.
        let n = reactor.poll(Some(Duration::from_millis(0))).unwrap();
        assert_eq!(n, 0);
        assert!(reactor.take_readiness(key).is_none());

        let buf = [7u8; 3];
        let rc = unsafe { libc::write(w, buf.as_ptr() as *const libc::c_void, buf.len()) };
        assert_eq!(rc, 3);

        let n = reactor.poll(Some(Duration::from_millis(100))).unwrap();
        assert_eq!(n, 1);
        let readiness = reactor.take_readiness(key).unwrap();
        assert!(readiness.is_readable());
        assert!(!readiness.is_hup());

        reactor.deregister(key);
        close(r);
        close(w);
    }

    #[test]
    fn poll_surfaces_hup() {
        let mut reactor = Reactor::new().unwrap();
        let (r, w) = pipe_pair();

        let key = reactor
            .register(r, Interest::READABLE, Waker::noop().clone())
            .unwrap();
        close(w);

        reactor.poll(Some(Duration::from_millis(100))).unwrap();
        let readiness = reactor.take_readiness(key).unwrap();
        assert!(readiness.is_hup());

        reactor.deregister(key);
        close(r);
    }

    #[test]
    fn stale_generation_event_is_ignored() {
        let mut reactor = Reactor::new().unwrap();
        let (r, w) = pipe_pair();

        let key = reactor
            .register(r, Interest::READABLE, Waker::noop().clone())
            .unwrap();
        reactor.deregister(key);

        // A stale key must observe nothing even after the slot recycles.
        let key2 = reactor
            .register(r, Interest::READABLE, Waker::noop().clone())
            .unwrap();
        let buf = [1u8];
        unsafe { libc::write(w, buf.as_ptr() as *const libc::c_void, 1) };
        reactor.poll(Some(Duration::from_millis(100))).unwrap();

        assert!(reactor.take_readiness(key).is_none());
        assert!(reactor.take_readiness(key2).is_some());

        reactor.deregister(key2);
        close(r);
        close(w);
    }
}
