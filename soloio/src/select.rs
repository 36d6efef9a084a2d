//! First-wins combinators.
//!
//! Children are boxed into the combinator (the executor treats its own
//! tasks the same way). The losing children are dropped when the
//! combinator is consumed by the await that observed the winner; their
//! drop paths erase any timer or reactor registration they held, which
//! is how timeouts cancel the operation they raced.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Which branch of a [`when_any()`] race finished first, carrying its
/// output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Either<A, B> {
    /// The first (left) future completed.
    Left(A),
    /// The second (right) future completed.
    Right(B),
}

impl<T> Either<T, T> {
    /// Collapse to the inner value when both branches carry the same
    /// type.
    pub fn into_inner(self) -> T {
        match self {
            Either::Left(value) | Either::Right(value) => value,
        }
    }
}

/// Future returned by [`when_any()`].
pub struct WhenAny<A: Future, B: Future> {
    a: Pin<Box<A>>,
    b: Pin<Box<B>>,
}

impl<A: Future, B: Future> Future for WhenAny<A, B> {
    type Output = Either<A::Output, B::Output>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if let Poll::Ready(value) = this.a.as_mut().poll(cx) {
            return Poll::Ready(Either::Left(value));
        }
        if let Poll::Ready(value) = this.b.as_mut().poll(cx) {
            return Poll::Ready(Either::Right(value));
        }
        Poll::Pending
    }
}

/// Run two futures concurrently, resolving to whichever completes
/// first.
///
/// Polling order is fixed: `a` is tried first on every turn, so `a`
/// wins a tie. The loser dies with the consumed combinator — a lost
/// sleep leaves the timer queue, a lost I/O wait deregisters its fd.
/// An error from a fallible child is a completion like any other: the
/// `Either` carries the `Result`.
pub fn when_any<A: Future, B: Future>(a: A, b: B) -> WhenAny<A, B> {
    WhenAny {
        a: Box::pin(a),
        b: Box::pin(b),
    }
}

/// Which of a [`when_any3()`] race's three branches finished first,
/// carrying its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Either3<A, B, C> {
    /// The first future completed.
    First(A),
    /// The second future completed.
    Second(B),
    /// The third future completed.
    Third(C),
}

impl<T> Either3<T, T, T> {
    /// Collapse to the inner value when all branches carry the same
    /// type.
    pub fn into_inner(self) -> T {
        match self {
            Either3::First(value) | Either3::Second(value) | Either3::Third(value) => value,
        }
    }
}

/// Future returned by [`when_any3()`].
pub struct WhenAny3<A: Future, B: Future, C: Future> {
    a: Pin<Box<A>>,
    b: Pin<Box<B>>,
    c: Pin<Box<C>>,
}

impl<A: Future, B: Future, C: Future> Future for WhenAny3<A, B, C> {
    type Output = Either3<A::Output, B::Output, C::Output>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if let Poll::Ready(value) = this.a.as_mut().poll(cx) {
            return Poll::Ready(Either3::First(value));
        }
        if let Poll::Ready(value) = this.b.as_mut().poll(cx) {
            return Poll::Ready(Either3::Second(value));
        }
        if let Poll::Ready(value) = this.c.as_mut().poll(cx) {
            return Poll::Ready(Either3::Third(value));
        }
        Poll::Pending
    }
}

/// Run three futures concurrently, resolving to whichever completes
/// first. Polling order is fixed (`a`, `b`, `c`), so earlier arguments
/// win ties; the losers die with the consumed combinator.
pub fn when_any3<A: Future, B: Future, C: Future>(a: A, b: B, c: C) -> WhenAny3<A, B, C> {
    WhenAny3 {
        a: Box::pin(a),
        b: Box::pin(b),
        c: Box::pin(c),
    }
}

/// Future returned by [`when_any_vec()`].
pub struct WhenAnyVec<F: Future> {
    futures: Vec<Pin<Box<F>>>,
}

impl<F: Future> Future for WhenAnyVec<F> {
    type Output = (usize, F::Output);

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        for (index, future) in this.futures.iter_mut().enumerate() {
            if let Poll::Ready(value) = future.as_mut().poll(cx) {
                return Poll::Ready((index, value));
            }
        }
        Poll::Pending
    }
}

/// Homogeneous-list form of [`when_any()`]: resolves to the index and
/// output of whichever future completes first; the rest die with the
/// consumed combinator. Lower indices win ties.
///
/// # Panics
///
/// Panics on an empty list — there would be nothing to resolve to.
pub fn when_any_vec<F: Future>(futures: Vec<F>) -> WhenAnyVec<F> {
    assert!(!futures.is_empty(), "when_any_vec of no futures");
    WhenAnyVec {
        futures: futures.into_iter().map(Box::pin).collect(),
    }
}
