//! The shared FIFO wait list (spec §4.3: "all three primitives share...
//! a FIFO wait list of bounded capacity"), reused verbatim by the
//! semaphore, mutex, and condition variable — mirroring how
//! `r3_kernel::wait::WaitQueue` backs `r3_kernel::{semaphore, mutex,
//! event_group}`.
use crate::config::MAX_WAITERS;
use crate::error::{Error, Result};
use crate::port::Port;
use crate::task::readyqueue::TaskQueue;
use crate::task::{TaskId, TaskTable};

/// A bounded FIFO of blocked task ids. Built on [`TaskQueue`] but never
/// calls [`TaskQueue::advance`] — waiters always wake head-first, in
/// arrival order (spec §8 "FIFO ordering").
#[derive(Default)]
pub(crate) struct WaitQueue {
    queue: TaskQueue,
}

impl WaitQueue {
    pub const fn new() -> Self {
        Self {
            queue: TaskQueue::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Enqueue `id`. Callers (semaphore `wait`) are responsible for the
    /// `panic(SEM_OPERATION)` overflow behavior spec §4.3.1 mandates;
    /// other primitives treat a full wait list as a configuration error
    /// too unlikely in a single-core embedded target to need a distinct
    /// error path, so this just reports [`Error::TaskBusy`].
    pub fn push_back<P: Port>(&mut self, table: &mut TaskTable<P>, id: TaskId) -> Result<()> {
        if self.queue.len() >= MAX_WAITERS {
            return Err(Error::TaskBusy);
        }
        self.queue.push_back(table, id);
        Ok(())
    }

    pub fn pop_front<P: Port>(&mut self, table: &mut TaskTable<P>) -> Option<TaskId> {
        self.queue.pop_front(table)
    }

    pub fn remove<P: Port>(&mut self, table: &mut TaskTable<P>, id: TaskId) -> bool {
        self.queue.remove(table, id)
    }

    /// A type-erased pointer to this queue's underlying [`TaskQueue`], for
    /// [`TaskCb::blocked_on`](crate::task::TaskCb) — lets
    /// [`crate::state::Kernel::cancel`] detach a task from this wait list
    /// without knowing which sync primitive owns it.
    pub(crate) fn as_ptr_mut(&mut self) -> *mut TaskQueue {
        &mut self.queue as *mut TaskQueue
    }
}
