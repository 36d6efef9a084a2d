//! The event loop and the spawn surface.
//!
//! One thread, two schedulers: the loop polls every ready task, drains
//! due timers, then blocks in the reactor no longer than the next
//! deadline. When no fd is registered it sleeps plainly; when neither
//! scheduler holds work while the root future is unfinished, it bails
//! with [`Error::Deadlock`] instead of hanging.
//!
//! Scheduler access is by explicit handle ([`TimerHandle`],
//! [`ReactorHandle`], [`Spawner`]) — there is no process-wide runtime.
//! The handles are `Rc`-based and `!Send`, which pins everything to the
//! constructing thread.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use crate::error::{Error, Result};
use crate::reactor::ReactorHandle;
use crate::task::{TaskId, TaskSlab};
use crate::timer::TimerHandle;
use crate::waker::{self, ROOT_TASK, task_waker};

/// The single-threaded runtime: timer queue, epoll reactor, and the
/// background task slab.
pub struct Runtime {
    timer: TimerHandle,
    reactor: ReactorHandle,
    tasks: Rc<RefCell<TaskSlab>>,
}

impl Runtime {
    pub fn new() -> Result<Runtime> {
        Ok(Runtime {
            timer: TimerHandle::new(),
            reactor: ReactorHandle::new()?,
            tasks: Rc::new(RefCell::new(TaskSlab::new())),
        })
    }

    /// Handle to the timer queue, for `sleep_for`/`sleep_until`/`timeout`.
    pub fn timer(&self) -> TimerHandle {
        self.timer.clone()
    }

    /// Handle to the reactor, for `wait_event` and the socket adapters.
    pub fn reactor(&self) -> ReactorHandle {
        self.reactor.clone()
    }

    /// Handle for spawning background tasks onto this runtime.
    pub fn spawner(&self) -> Spawner {
        Spawner {
            tasks: self.tasks.clone(),
        }
    }

    /// Drive `future` to completion, running background tasks, timers,
    /// and I/O as they become ready.
    ///
    /// Returns when the root future completes; background tasks that
    /// are still pending at that point stay in the slab and are dropped
    /// with the runtime. Fails with [`Error::Deadlock`] if the root is
    /// pending while no timer is set and no fd is registered.
    pub fn block_on<F: Future>(&self, future: F) -> Result<F::Output> {
        let mut future = std::pin::pin!(future);
        let root_waker = task_waker(ROOT_TASK);
        let mut ready: VecDeque<u32> = VecDeque::new();
        ready.push_back(ROOT_TASK);

        loop {
            // Poll everything that is ready, picking up wakes produced
            // by the polls themselves as we go.
            while let Some(id) = ready.pop_front() {
                if id == ROOT_TASK {
                    let mut cx = Context::from_waker(&root_waker);
                    if let Poll::Ready(output) = future.as_mut().poll(&mut cx) {
                        return Ok(output);
                    }
                } else {
                    self.poll_task(id);
                }
                self.collect_wakeups(&mut ready);
            }

            // Due timers run before this iteration's I/O wakeups.
            let next_deadline = self
                .timer
                .inner
                .borrow_mut()
                .drain(std::time::Instant::now());
            self.collect_wakeups(&mut ready);
            if !ready.is_empty() {
                continue;
            }

            if self.reactor.registered_count() > 0 {
                self.reactor.inner.borrow_mut().poll(next_deadline)?;
                self.collect_wakeups(&mut ready);
            } else if let Some(wait) = next_deadline {
                std::thread::sleep(wait);
            } else {
                return Err(Error::Deadlock);
            }
        }
    }

    /// Take one background task out of the slab, poll it, and park it
    /// back (or release its slot on completion). The slab is never
    /// borrowed while the future runs, so the task may spawn or cancel
    /// freely.
    fn poll_task(&self, id: u32) {
        let Some(mut future) = self.tasks.borrow_mut().take_ready(id) else {
            return;
        };
        let task_waker = task_waker(id);
        let mut cx = Context::from_waker(&task_waker);
        match future.as_mut().poll(&mut cx) {
            Poll::Ready(()) => self.tasks.borrow_mut().release(id),
            Poll::Pending => self.tasks.borrow_mut().park(id, future),
        }
    }

    /// Swap out the thread-local wake list and promote the named
    /// parked tasks to ready. Root wakes pass straight through;
    /// duplicate wakes of an already-queued task are dropped here.
    fn collect_wakeups(&self, ready: &mut VecDeque<u32>) {
        let woken = waker::take_woken();
        if woken.is_empty() {
            return;
        }
        let mut tasks = self.tasks.borrow_mut();
        for id in woken {
            if id == ROOT_TASK || tasks.wake(id) {
                ready.push_back(id);
            }
        }
    }
}

/// Cloneable handle for attaching tasks to the runtime's background set.
#[derive(Clone)]
pub struct Spawner {
    tasks: Rc<RefCell<TaskSlab>>,
}

impl Spawner {
    /// Spawn a detached background task. It completes (or not)
    /// independently of any await; its slot is recycled when it
    /// finishes.
    pub fn spawn<F>(&self, future: F) -> TaskId
    where
        F: Future<Output = ()> + 'static,
    {
        let id = self.tasks.borrow_mut().spawn(Box::pin(future));
        waker::schedule(id.index);
        id
    }

    /// Spawn a task and return a handle that resolves to its output.
    ///
    /// The handle is the awaiting side of the task's result slot: the
    /// task writes its output once, the first await after completion
    /// consumes it. Dropping the handle detaches the task;
    /// [`JoinHandle::cancel`] destroys it mid-flight.
    pub fn spawn_handle<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + 'static,
        F::Output: 'static,
    {
        let state = Rc::new(RefCell::new(JoinState {
            result: None,
            waker: None,
        }));
        let task_state = state.clone();
        let id = self.spawn(async move {
            let output = future.await;
            let waker = {
                let mut slot = task_state.borrow_mut();
                slot.result = Some(output);
                slot.waker.take()
            };
            if let Some(waker) = waker {
                waker.wake();
            }
        });
        JoinHandle {
            id,
            state,
            tasks: self.tasks.clone(),
        }
    }

    /// Cancel a spawned task: its future is dropped where it stands,
    /// which erases any timer or reactor registration it held. Stale
    /// ids (completed tasks, recycled slots) are no-ops.
    pub fn cancel(&self, id: TaskId) -> bool {
        self.tasks.borrow_mut().cancel(id)
    }

    /// Number of live background tasks.
    pub fn live_tasks(&self) -> usize {
        self.tasks.borrow().live_count()
    }
}

struct JoinState<T> {
    result: Option<T>,
    waker: Option<Waker>,
}

/// Completion handle for a task spawned with
/// [`Spawner::spawn_handle`]. Awaiting it yields the task's output.
///
/// Awaiting goes through the scheduler (store waker, get woken on
/// completion) rather than polling the task inline, so a chain of
/// handle awaits thousands deep costs constant native stack per
/// event-loop turn.
pub struct JoinHandle<T> {
    id: TaskId,
    state: Rc<RefCell<JoinState<T>>>,
    tasks: Rc<RefCell<TaskSlab>>,
}

impl<T> JoinHandle<T> {
    /// Id of the underlying task.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Destroy the task mid-flight. Returns true if it was still live.
    pub fn cancel(self) -> bool {
        self.tasks.borrow_mut().cancel(self.id)
    }
}

impl<T> Future for JoinHandle<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        let mut state = self.state.borrow_mut();
        match state.result.take() {
            Some(output) => Poll::Ready(output),
            None => {
                state.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}
