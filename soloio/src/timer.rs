//! Earliest-deadline timer queue and the futures that park on it.
//!
//! Entries are keyed `(deadline, sequence)` in an ordered map, so two
//! timers with the same deadline stay distinct and fire in a
//! deterministic order. The queue never owns a task — it holds the
//! parked task's waker, and the owning [`Sleep`] future erases its own
//! entry when it is dropped (cancellation-by-drop).

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

use crate::metrics;
use crate::select::{Either, when_any};

/// Ordered set of pending timers.
pub(crate) struct TimerQueue {
    entries: BTreeMap<(Instant, u64), Waker>,
    /// Monotonic sequence for deterministic tie-break of equal deadlines.
    next_seq: u64,
}

impl TimerQueue {
    pub(crate) fn new() -> Self {
        TimerQueue {
            entries: BTreeMap::new(),
            next_seq: 0,
        }
    }

    /// Insert an entry, returning the sequence half of its key.
    pub(crate) fn insert(&mut self, deadline: Instant, waker: Waker) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert((deadline, seq), waker);
        seq
    }

    /// Refresh the waker of a pending entry. A missing entry (already
    /// fired) is a no-op.
    pub(crate) fn update_waker(&mut self, deadline: Instant, seq: u64, waker: Waker) {
        if let Some(slot) = self.entries.get_mut(&(deadline, seq)) {
            *slot = waker;
        }
    }

    /// Erase an entry without firing it. Idempotent.
    pub(crate) fn remove(&mut self, deadline: Instant, seq: u64) {
        self.entries.remove(&(deadline, seq));
    }

    /// Wake every entry whose deadline is at or before `now`.
    ///
    /// Entries are extracted *before* their wakers fire, so a resumed
    /// task may re-enter the queue (insert a new timer, drop a pending
    /// one) without invalidating the drain. Returns the wait until the
    /// first future entry, or None when the queue is empty.
    pub(crate) fn drain(&mut self, now: Instant) -> Option<Duration> {
        loop {
            match self.entries.first_key_value() {
                None => return None,
                Some((&(deadline, _), _)) if deadline > now => return Some(deadline - now),
                Some(_) => {}
            }
            let (_, waker) = self.entries.pop_first().unwrap();
            waker.wake();
            metrics::TIMERS_FIRED.increment();
        }
    }

    /// Number of pending entries.
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Cloneable handle to the runtime's timer queue. Suspending operations
/// take this handle explicitly; there is no process-wide timer.
#[derive(Clone)]
pub struct TimerHandle {
    pub(crate) inner: Rc<RefCell<TimerQueue>>,
}

impl TimerHandle {
    pub(crate) fn new() -> Self {
        TimerHandle {
            inner: Rc::new(RefCell::new(TimerQueue::new())),
        }
    }

    /// Number of timers currently parked in the queue.
    pub fn pending(&self) -> usize {
        self.inner.borrow().len()
    }
}

/// Future returned by [`sleep_for()`] and [`sleep_until()`].
///
/// First poll inserts the entry; drop erases it, so a `Sleep` lost in a
/// [`when_any()`](crate::when_any) race leaves nothing behind.
pub struct Sleep {
    timer: TimerHandle,
    deadline: Instant,
    /// Sequence half of the queue key; None until first poll.
    seq: Option<u64>,
}

impl Future for Sleep {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        if Instant::now() >= this.deadline {
            // The drain that woke us already removed the entry; this
            // remove only matters when the deadline passed before the
            // first poll or between polls.
            if let Some(seq) = this.seq.take() {
                this.timer.inner.borrow_mut().remove(this.deadline, seq);
            }
            return Poll::Ready(());
        }
        let mut queue = this.timer.inner.borrow_mut();
        match this.seq {
            Some(seq) => queue.update_waker(this.deadline, seq, cx.waker().clone()),
            None => this.seq = Some(queue.insert(this.deadline, cx.waker().clone())),
        }
        Poll::Pending
    }
}

impl Drop for Sleep {
    fn drop(&mut self) {
        if let Some(seq) = self.seq.take() {
            self.timer.inner.borrow_mut().remove(self.deadline, seq);
        }
    }
}

/// Create a future that completes at an absolute instant.
pub fn sleep_until(timer: &TimerHandle, deadline: Instant) -> Sleep {
    Sleep {
        timer: timer.clone(),
        deadline,
        seq: None,
    }
}

/// Create a future that completes after a duration.
pub fn sleep_for(timer: &TimerHandle, duration: Duration) -> Sleep {
    sleep_until(timer, Instant::now() + duration)
}

/// Error returned when a [`timeout()`] expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elapsed;

impl std::fmt::Display for Elapsed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("deadline elapsed")
    }
}

impl std::error::Error for Elapsed {}

/// Race a future against a deadline.
///
/// Built on [`when_any()`](crate::when_any): if the sleep wins, the
/// operation future is dropped, which cancels it — any timer or reactor
/// registration it held is erased on the spot.
///
/// Biased toward the operation: if both are ready on the same poll, the
/// operation wins.
pub async fn timeout<F: Future>(
    timer: &TimerHandle,
    duration: Duration,
    future: F,
) -> Result<F::Output, Elapsed> {
    match when_any(future, sleep_for(timer, duration)).await {
        Either::Left(value) => Ok(value),
        Either::Right(()) => Err(Elapsed),
    }
}
