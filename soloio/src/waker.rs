//! Task wakers.
//!
//! A waker carries nothing but the id of the task it belongs to.
//! Firing one appends that id to a thread-local wake list; the event
//! loop swaps the whole list out between polls and promotes the named
//! tasks to ready. Built on [`std::task::Wake`] — one small allocation
//! per waker buys us out of the raw-vtable business entirely.

use std::cell::RefCell;
use std::sync::Arc;
use std::task::{Wake, Waker};

/// Id the loop reserves for the future driven by `block_on` itself.
/// Slab ids count up from zero, so the root can never collide.
pub(crate) const ROOT_TASK: u32 = u32::MAX;

thread_local! {
    /// Ids woken since the loop last looked. Swapped out wholesale by
    /// [`take_woken`], so producers never contend with the drain.
    static WAKE_LIST: RefCell<Vec<u32>> = const { RefCell::new(Vec::new()) };
}

/// Append a task id to this thread's wake list (what a waker does when
/// fired; `spawn` also calls this to get a first poll scheduled).
pub(crate) fn schedule(task_id: u32) {
    WAKE_LIST.with(|list| list.borrow_mut().push(task_id));
}

/// Swap the wake list out, leaving it empty. Ids come back in the
/// order they were woken.
pub(crate) fn take_woken() -> Vec<u32> {
    WAKE_LIST.with(|list| std::mem::take(&mut *list.borrow_mut()))
}

struct TaskWaker {
    task_id: u32,
}

impl Wake for TaskWaker {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        schedule(self.task_id);
    }
}

/// A [`Waker`] that marks `task_id` ready when fired.
///
/// The wake list is thread-local, so a wake only means something on
/// the thread the event loop runs on. The runtime's handles are all
/// `Rc`-based and `!Send`, which keeps every waker on that thread to
/// begin with.
pub(crate) fn task_waker(task_id: u32) -> Waker {
    Waker::from(Arc::new(TaskWaker { task_id }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn woken_ids_come_back_in_order() {
        take_woken();

        task_waker(4).wake();
        task_waker(9).wake_by_ref();
        schedule(ROOT_TASK);

        assert_eq!(take_woken(), [4, 9, ROOT_TASK]);
        assert!(take_woken().is_empty());
    }

    #[test]
    fn cloned_waker_names_the_same_task() {
        take_woken();

        let original = task_waker(11);
        let duplicate = original.clone();
        duplicate.wake();
        original.wake();

        assert_eq!(take_woken(), [11, 11]);
    }

    #[test]
    fn repeated_wakes_are_not_deduplicated_here() {
        // Dedup is the slab's job (a Ready task ignores further wakes);
        // the list itself records every firing.
        take_woken();

        let waker = task_waker(2);
        waker.wake_by_ref();
        waker.wake_by_ref();
        waker.wake();

        assert_eq!(take_woken(), [2, 2, 2]);
    }
}
