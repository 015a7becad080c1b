//! The fixed task pool and the per-level ready/wait queue shape (spec §3
//! KCB, §4.2 C2).
//!
//! This replaces an earlier generic `IdFifo<K>` sketch (a closure-indexed
//! intrusive list reusable across owners) with a queue type that reaches
//! into [`TaskTable`] directly. The generic version would have needed
//! `FnMut(TaskId) -> Option<TaskId>` accessor closures re-borrowing the
//! table on every link traversal — exactly the shape of borrow that is
//! easy to get subtly wrong when it can't be compiled and checked. A
//! queue that takes `&mut TaskTable<P>` as an explicit parameter on every
//! call gives the same reuse (this one type serves both the per-level
//! ready queues and, via [`crate::wait::WaitQueue`], every blocking
//! primitive's wait list) without the indirection.
use crate::config::MAX_TASKS;
use crate::error::{Error, Result};
use crate::port::Port;
use crate::task::{TaskCb, TaskId, TaskState};

/// The fixed-capacity task pool (part of the KCB, spec §3). `TCB_ALLOC`
/// failure (spec §7) means this pool is full — a fixed-size slot array
/// rather than `r3_kernel`'s `'static` task set, needed because this
/// engine's `spawn` creates tasks at runtime (§6) instead of at
/// compile-time via a const-eval builder.
pub(crate) struct TaskTable<P: Port> {
    slots: [Option<TaskCb<P>>; MAX_TASKS],
    count: usize,
}

impl<P: Port> TaskTable<P> {
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| None),
            count: 0,
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Reserve the first free slot for a new task, returning its id.
    pub fn alloc(
        &mut self,
        stack_base: *mut u8,
        stack_size: usize,
        entry: crate::task::TaskEntry,
    ) -> Result<TaskId> {
        let index = self
            .slots
            .iter()
            .position(|slot| slot.is_none())
            .ok_or(Error::TcbAlloc)?;
        let id = TaskId::new((index + 1) as u16).ok_or(Error::TcbAlloc)?;
        self.slots[index] = Some(TaskCb::new(id, stack_base, stack_size, entry));
        self.count += 1;
        Ok(id)
    }

    /// Release `id`'s slot, returning the evicted TCB so the caller can
    /// free its stack outside the lock if desired.
    pub fn free(&mut self, id: TaskId) -> Option<TaskCb<P>> {
        let slot = self.slots.get_mut(id.index())?.take();
        if slot.is_some() {
            self.count -= 1;
        }
        slot
    }

    pub fn get(&self, id: TaskId) -> Option<&TaskCb<P>> {
        self.slots.get(id.index())?.as_ref()
    }

    pub fn get_mut(&mut self, id: TaskId) -> Option<&mut TaskCb<P>> {
        self.slots.get_mut(id.index())?.as_mut()
    }

    /// Iterate every live TCB, for the tick handler's delay-expiry scan
    /// (spec §4.2 tick step 2).
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut TaskCb<P>> {
        self.slots.iter_mut().filter_map(|slot| slot.as_mut())
    }

    /// Iterate every live TCB read-only, for lookups like `idref` (spec
    /// §4.1) that scan by entry point rather than by id.
    pub fn iter(&self) -> impl Iterator<Item = &TaskCb<P>> {
        self.slots.iter().filter_map(|slot| slot.as_ref())
    }
}

/// A FIFO queue of task ids threaded through [`TaskCb::queue_link`], used
/// both as a per-priority-level ready queue (spec §4.2) and, reused
/// verbatim, as the wait list shared by every blocking primitive
/// (spec §4.3's "all three primitives share... a FIFO wait list").
///
/// Represented as a circular singly-linked list: `tail.link` always points
/// at the head, so `push_back` is O(1) without a separate head field. A
/// `cursor` picks out "the next candidate to run" for round-robin levels
/// (spec §3 KCB "round robin cursor nodes"); wait-list uses of this type
/// never call [`TaskQueue::advance`] and so never move it off the head.
#[derive(Default)]
pub(crate) struct TaskQueue {
    tail: Option<TaskId>,
    cursor: Option<TaskId>,
    len: usize,
}

impl TaskQueue {
    pub const fn new() -> Self {
        Self {
            tail: None,
            cursor: None,
            len: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn head<P: Port>(&self, table: &TaskTable<P>) -> Option<TaskId> {
        let tail = self.tail?;
        table.get(tail).and_then(|tcb| tcb.queue_link)
    }

    /// The task the RR cursor currently points at (I3).
    pub fn cursor(&self) -> Option<TaskId> {
        self.cursor
    }

    /// Append `id` at the tail (spec §4.2 "strict FIFO on insertion at the
    /// tail").
    pub fn push_back<P: Port>(&mut self, table: &mut TaskTable<P>, id: TaskId) {
        match self.tail {
            None => {
                if let Some(tcb) = table.get_mut(id) {
                    tcb.queue_link = Some(id);
                }
                self.tail = Some(id);
                self.cursor = Some(id);
            }
            Some(tail) => {
                let head = table.get(tail).and_then(|tcb| tcb.queue_link);
                if let Some(tcb) = table.get_mut(id) {
                    tcb.queue_link = head;
                }
                if let Some(tcb) = table.get_mut(tail) {
                    tcb.queue_link = Some(id);
                }
                self.tail = Some(id);
            }
        }
        self.len += 1;
        self.restore_cursor_invariant(table);
    }

    /// Remove and return the head of the queue (spec §4.2 "selection at the
    /// head").
    pub fn pop_front<P: Port>(&mut self, table: &mut TaskTable<P>) -> Option<TaskId> {
        let head = self.head(table)?;
        self.remove(table, head);
        Some(head)
    }

    /// Unlink `id` from wherever it sits in the queue (cancel, suspend,
    /// priority change, or a sync object removing a timed-out waiter).
    /// Returns whether `id` was actually present.
    pub fn remove<P: Port>(&mut self, table: &mut TaskTable<P>, id: TaskId) -> bool {
        let Some(tail) = self.tail else {
            return false;
        };
        // Find the predecessor of `id` by walking the cycle.
        let mut pred = tail;
        let mut found = false;
        for _ in 0..self.len {
            let next = match table.get(pred).and_then(|tcb| tcb.queue_link) {
                Some(n) => n,
                None => break,
            };
            if next == id {
                found = true;
                break;
            }
            pred = next;
        }
        if !found {
            return false;
        }
        let next_of_id = table.get(id).and_then(|tcb| tcb.queue_link);
        if pred == id {
            // Sole member of the queue.
            self.tail = None;
        } else {
            if let Some(tcb) = table.get_mut(pred) {
                tcb.queue_link = next_of_id;
            }
            if self.tail == Some(id) {
                self.tail = Some(pred);
            }
        }
        if let Some(tcb) = table.get_mut(id) {
            tcb.queue_link = None;
        }
        self.len -= 1;
        if self.cursor == Some(id) {
            self.cursor = if self.len == 0 { None } else { next_of_id };
        }
        self.restore_cursor_invariant(table);
        true
    }

    /// Advance the RR cursor to the next node in the circular queue,
    /// skipping nothing but the invariant-restoring step below (spec §4.2
    /// step 3: "advance the cursor to the next node... skipping
    /// sentinels"). Only ready queues call this; wait lists never do.
    pub fn advance<P: Port>(&mut self, table: &mut TaskTable<P>) {
        if let Some(cursor) = self.cursor {
            self.cursor = table.get(cursor).and_then(|tcb| tcb.queue_link);
        }
        self.restore_cursor_invariant(table);
    }

    /// Re-establish I3: NULL iff empty; the sole node iff `len == 1`;
    /// otherwise pointing at a task that is not the one currently
    /// `Running` (so the next selection actually advances).
    fn restore_cursor_invariant<P: Port>(&mut self, table: &mut TaskTable<P>) {
        if self.len == 0 {
            self.cursor = None;
            return;
        }
        if self.len == 1 {
            self.cursor = self.tail;
            return;
        }
        if let Some(cursor) = self.cursor {
            if table.get(cursor).map(|tcb| tcb.state) == Some(TaskState::Running) {
                self.cursor = table.get(cursor).and_then(|tcb| tcb.queue_link);
            }
        } else {
            self.cursor = self.tail.and_then(|tail| table.get(tail).and_then(|tcb| tcb.queue_link));
        }
    }
}
