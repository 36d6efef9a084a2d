//! Wait-for-all combinators.
//!
//! Children are boxed into the combinator the same way the executor
//! boxes its tasks, which keeps the combinators `Unpin` and lets a
//! still-pending child be handed off whole. Dropping a pending
//! combinator (parent cancelled, `when_any` lost) drops the children
//! in place — and with them any timer or reactor registration they
//! held. The fail-fast variant is different on purpose: when a child
//! errors, its still-running sibling is moved to the runtime's
//! background set and runs to completion there, its result discarded.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::runtime::Spawner;

/// A child future, or the output it finished with, parked until every
/// sibling is accounted for.
enum Child<F: Future> {
    Pending(Pin<Box<F>>),
    Finished(F::Output),
    Claimed,
}

// `Pending` only ever holds an already-pinned `Pin<Box<F>>`; the `F`/
// `F::Output` type parameters are never pinned in place inside `Child`
// itself, so it's sound to be `Unpin` regardless of them.
impl<F: Future> Unpin for Child<F> {}

impl<F: Future> Child<F> {
    fn new(future: F) -> Self {
        Child::Pending(Box::pin(future))
    }

    /// Drive the child one step if it is still pending. True once its
    /// output is on hand (or already claimed).
    fn advance(&mut self, cx: &mut Context<'_>) -> bool {
        if let Child::Pending(future) = self {
            match future.as_mut().poll(cx) {
                Poll::Ready(output) => *self = Child::Finished(output),
                Poll::Pending => return false,
            }
        }
        true
    }

    /// Move the output out. Only called once every sibling reported
    /// finished, so a pending or re-claimed child is a combinator bug.
    fn claim(&mut self) -> F::Output {
        match std::mem::replace(self, Child::Claimed) {
            Child::Finished(output) => output,
            _ => panic!("child output claimed before it finished"),
        }
    }
}

impl<F: Future + 'static> Child<F> {
    /// Give a still-pending child its own life: park it in the
    /// background set, where it runs to completion with its output
    /// discarded. Finished children are simply forgotten.
    fn detach(&mut self, spawner: &Spawner) {
        if let Child::Pending(future) = std::mem::replace(self, Child::Claimed) {
            spawner.spawn(async move {
                let _ = future.await;
            });
        }
    }
}

impl<T, E, F> Child<F>
where
    F: Future<Output = Result<T, E>>,
{
    /// Pull the error out of a finished fallible child. An `Ok` output
    /// stays put for [`claim`](Child::claim).
    fn claim_err(&mut self) -> Option<E> {
        match self {
            Child::Finished(Err(_)) => {
                let Child::Finished(Err(err)) = std::mem::replace(self, Child::Claimed) else {
                    unreachable!()
                };
                Some(err)
            }
            _ => None,
        }
    }
}

/// Future returned by [`when_all()`].
pub struct WhenAll<A: Future, B: Future> {
    a: Child<A>,
    b: Child<B>,
}

impl<A: Future, B: Future> Future for WhenAll<A, B> {
    type Output = (A::Output, B::Output);

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let a_done = this.a.advance(cx);
        let b_done = this.b.advance(cx);
        if a_done && b_done {
            Poll::Ready((this.a.claim(), this.b.claim()))
        } else {
            Poll::Pending
        }
    }
}

/// Run two futures concurrently, resolving exactly once — after both
/// complete — to their outputs in positional order.
///
/// The children are advanced in order (a, then b) on each turn; an
/// early finisher's output is parked until the straggler is done.
pub fn when_all<A: Future, B: Future>(a: A, b: B) -> WhenAll<A, B> {
    WhenAll {
        a: Child::new(a),
        b: Child::new(b),
    }
}

/// Future returned by [`when_all3()`].
pub struct WhenAll3<A: Future, B: Future, C: Future> {
    a: Child<A>,
    b: Child<B>,
    c: Child<C>,
}

impl<A: Future, B: Future, C: Future> Future for WhenAll3<A, B, C> {
    type Output = (A::Output, B::Output, C::Output);

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let a_done = this.a.advance(cx);
        let b_done = this.b.advance(cx);
        let c_done = this.c.advance(cx);
        if a_done && b_done && c_done {
            Poll::Ready((this.a.claim(), this.b.claim(), this.c.claim()))
        } else {
            Poll::Pending
        }
    }
}

/// Run three futures concurrently, resolving after all of them to the
/// positional tuple of outputs.
pub fn when_all3<A: Future, B: Future, C: Future>(a: A, b: B, c: C) -> WhenAll3<A, B, C> {
    WhenAll3 {
        a: Child::new(a),
        b: Child::new(b),
        c: Child::new(c),
    }
}

/// Future returned by [`try_when_all()`].
pub struct TryWhenAll<A: Future, B: Future> {
    spawner: Spawner,
    a: Child<A>,
    b: Child<B>,
}

impl<AO, BO, E, A, B> Future for TryWhenAll<A, B>
where
    A: Future<Output = Result<AO, E>> + 'static,
    B: Future<Output = Result<BO, E>> + 'static,
{
    type Output = Result<(AO, BO), E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        let a_done = this.a.advance(cx);
        if let Some(err) = this.a.claim_err() {
            this.b.detach(&this.spawner);
            return Poll::Ready(Err(err));
        }
        let b_done = this.b.advance(cx);
        if let Some(err) = this.b.claim_err() {
            this.a.detach(&this.spawner);
            return Poll::Ready(Err(err));
        }

        if a_done && b_done {
            let (Ok(a_out), Ok(b_out)) = (this.a.claim(), this.b.claim()) else {
                unreachable!()
            };
            Poll::Ready(Ok((a_out, b_out)))
        } else {
            Poll::Pending
        }
    }
}

/// Run two fallible futures concurrently. Resolves to both outputs
/// once both complete, or to the first error as soon as the erring
/// child completes.
///
/// Fail-fast is on observation only: a sibling still running when the
/// error surfaces is handed to the background set and runs to
/// completion there, its result discarded. Dropping the combinator
/// *before* it resolves still cancels both children, like any other
/// combinator.
pub fn try_when_all<AO, BO, E, A, B>(spawner: &Spawner, a: A, b: B) -> TryWhenAll<A, B>
where
    A: Future<Output = Result<AO, E>> + 'static,
    B: Future<Output = Result<BO, E>> + 'static,
{
    TryWhenAll {
        spawner: spawner.clone(),
        a: Child::new(a),
        b: Child::new(b),
    }
}

/// Future returned by [`when_all_vec()`].
pub struct WhenAllVec<F: Future> {
    children: Vec<Child<F>>,
}

impl<F: Future> Future for WhenAllVec<F> {
    type Output = Vec<F::Output>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let mut all_done = true;
        for child in &mut this.children {
            if !child.advance(cx) {
                all_done = false;
            }
        }
        if all_done {
            Poll::Ready(this.children.iter_mut().map(Child::claim).collect())
        } else {
            Poll::Pending
        }
    }
}

/// Homogeneous-list form of [`when_all()`]: resolves once, after every
/// future in the list completes, to the outputs in list order. An
/// empty list resolves immediately to an empty vec.
pub fn when_all_vec<F: Future>(futures: Vec<F>) -> WhenAllVec<F> {
    WhenAllVec {
        children: futures.into_iter().map(Child::new).collect(),
    }
}
