//! The Kernel Control Block and the scheduler built on top of it (spec §3
//! KCB, §4.2 C2).
//!
//! `Kernel<P>` is this crate's realization of spec §9's design note: "model
//! it as a state object owned by a kernel session... do not model it as
//! ambient process state." Every operation takes `&self` — interior
//! mutability through [`SchedLock`] plays the role the teacher's
//! `CpuLockCell`/`CpuLockToken` pair plays in `r3_kernel`, simplified to a
//! single concrete session per `Port` (see `klock.rs`, DESIGN.md).
use core::cell::UnsafeCell;

use crate::config::{F_TIMER, TIMER_TICK_BATCH};
use crate::error::{Error, Result};
use crate::klock::SchedLock;
use crate::port::Port;
use crate::task::readyqueue::TaskQueue;
use crate::task::{Priority, RtOpaque, TaskCb, TaskEntry, TaskId, TaskState, TaskTable, WakeReason};
use crate::timer::{TimerCallback, TimerId, TimerMode, TimerWheel};
use crate::wait::WaitQueue;

/// `app_main` (spec §6): spawns the initial task set and chooses
/// preemptive (`true`) or cooperative (`false`) mode.
pub trait Application {
    fn main(&self) -> bool;
}

/// An installed real-time scheduler hook (spec §4.2 "RT hook contract").
/// Returns a task id to run, or `-1` to defer to the default scheduler.
/// Gated behind the `rt_hook` feature; the default scheduler alone
/// satisfies every mandatory behavior in spec §4.2.
#[cfg(feature = "rt_hook")]
pub type RtHook = fn() -> i32;

/// The Kernel Control Block (spec §3). Everything the scheduler and task
/// core touch lives here, behind [`SchedLock`].
pub(crate) struct Inner<P: Port> {
    pub tasks: TaskTable<P>,
    pub ready: [TaskQueue; 8],
    pub ready_bitmap: crate::utils::ReadyBitmap,
    pub current: Option<TaskId>,
    pub preemptive: bool,
    #[cfg(feature = "rt_hook")]
    pub rt_hook: Option<RtHook>,
    pub tick: u32,
    pub timers: TimerWheel,
}

impl<P: Port> Inner<P> {
    fn new() -> Self {
        Self {
            tasks: TaskTable::new(),
            ready: core::array::from_fn(|_| TaskQueue::new()),
            ready_bitmap: crate::utils::ReadyBitmap::new(),
            current: None,
            preemptive: true,
            #[cfg(feature = "rt_hook")]
            rt_hook: None,
            tick: 0,
            timers: TimerWheel::new(),
        }
    }
}

/// One kernel session (spec §9). Integrators own exactly one `Kernel<P>`
/// per `Port` and hand a `'static` reference back through
/// [`Port::kernel`].
pub struct Kernel<P: Port> {
    inner: UnsafeCell<Inner<P>>,
}

// Safety: every field of `Inner` is touched only while a `SchedLock<P>` (or,
// during the one-time `start` call, before any interrupt source is live) is
// held, which on this single-core target serializes every access.
unsafe impl<P: Port> Sync for Kernel<P> {}

impl<P: Port> Kernel<P> {
    pub fn new() -> Self {
        Self {
            inner: UnsafeCell::new(Inner::new()),
        }
    }

    /// Safety: caller must hold a [`SchedLock`] (or be inside `start`,
    /// before interrupts are enabled).
    #[allow(clippy::mut_from_ref)]
    fn inner_mut(&self) -> &mut Inner<P> {
        unsafe { &mut *self.inner.get() }
    }

    // ---- startup -------------------------------------------------------

    /// Bring up the port, run `app.main()`, and dispatch the first task.
    /// Never returns (spec §6: "after it returns the kernel dispatches the
    /// first task").
    pub fn start(&self, app: &dyn Application) -> ! {
        P::hardware_init();
        let preemptive = app.main();
        let to_id = {
            let inner = self.inner_mut();
            inner.preemptive = preemptive;
            match self.pick_next(inner) {
                Some(id) => id,
                None => P::panic(Error::NoTasks),
            }
        };
        let to_ctx = {
            let inner = self.inner_mut();
            inner.current = Some(to_id);
            inner.tasks.get_mut(to_id).unwrap().state = TaskState::Running;
            inner.tasks.get(to_id).unwrap().ctx.get() as *const P::Context
        };
        // Safety: `to_ctx` was initialized by `context_init` at spawn time.
        unsafe { P::dispatch_first(to_ctx) }
    }

    // ---- scheduler (spec §4.2) -----------------------------------------

    /// `pick_next` (spec §4.2 steps 1-3).
    fn pick_next(&self, inner: &mut Inner<P>) -> Option<TaskId> {
        #[cfg(feature = "rt_hook")]
        if let Some(hook) = inner.rt_hook {
            let r = hook();
            if r >= 0 {
                if let Some(id) = TaskId::new(r as u16) {
                    if inner.tasks.get(id).is_some() {
                        return Some(id);
                    }
                }
            }
        }
        let level = inner.ready_bitmap.find_set()?;
        let candidate = inner.ready[level].cursor()?;
        inner.ready[level].advance(&mut inner.tasks);
        Some(candidate)
    }

    /// Pick a new current task and context-switch to it if it differs
    /// from the one that was running. The caller must already have moved
    /// the outgoing task out of `Running` (into `Ready`, `Blocked`, or
    /// `Suspended`) before calling this.
    fn reschedule(&self, inner: &mut Inner<P>) {
        let from_id = inner.current.expect("reschedule called with no current task");
        let to_id = match self.pick_next(inner) {
            Some(id) => id,
            None => P::panic(Error::NoTasks),
        };
        if to_id == from_id {
            inner.tasks.get_mut(to_id).unwrap().state = TaskState::Running;
            return;
        }
        inner.current = Some(to_id);
        inner.tasks.get_mut(to_id).unwrap().state = TaskState::Running;
        let from_ctx = inner.tasks.get(from_id).unwrap().ctx.get();
        let to_ctx = inner.tasks.get(to_id).unwrap().ctx.get() as *const P::Context;
        // Safety: called with the scheduler lock held; both contexts are
        // initialized (either by `context_init` or a prior save here).
        unsafe { P::context_switch(from_ctx, to_ctx) };
    }

    /// Move `id` to `Ready`, clear its delay, and enqueue it at the tail of
    /// its level's ready queue, restoring I2 (spec §4.2's "request a
    /// reschedule" paths all funnel through here).
    fn ready_up(&self, inner: &mut Inner<P>, id: TaskId, reason: WakeReason) {
        let level = inner.tasks.get(id).unwrap().base_priority.level();
        {
            let tcb = inner.tasks.get_mut(id).unwrap();
            tcb.state = TaskState::Ready;
            tcb.wake_reason = reason;
            tcb.delay = 0;
            tcb.blocked_on = None;
        }
        inner.ready[level].push_back(&mut inner.tasks, id);
        inner.ready_bitmap.set(level);
    }

    /// Detach `id` from its level's ready queue, restoring I2 if the level
    /// becomes empty.
    fn ready_down(&self, inner: &mut Inner<P>, id: TaskId) {
        let level = inner.tasks.get(id).unwrap().base_priority.level();
        inner.ready[level].remove(&mut inner.tasks, id);
        if inner.ready[level].is_empty() {
            inner.ready_bitmap.clear(level);
        }
    }

    /// Wake the head of `wq` (spec §4.3's token-passing signal, shared by
    /// semaphore/mutex/condvar).
    pub(crate) fn wake_one(&self, inner: &mut Inner<P>, wq: &mut WaitQueue) -> Option<TaskId> {
        let id = wq.pop_front(&mut inner.tasks)?;
        self.ready_up(inner, id, WakeReason::Signaled);
        Some(id)
    }

    /// Move the current task (if any) from `Running` back to `Ready`
    /// without touching its position in its level's queue — it's still
    /// linked there (a running task is never unlinked except via
    /// `ready_down`), this just makes its `TaskCb::state` honest again
    /// before `pick_next` may hand `Running` to someone else entirely.
    fn demote_current_to_ready(&self, inner: &mut Inner<P>) {
        if let Some(current) = inner.current {
            inner.tasks.get_mut(current).unwrap().state = TaskState::Ready;
        }
    }

    /// The second half of a wake that may require an immediate preemption
    /// (spec §4.2: a wake that makes a higher-priority task ready must
    /// reschedule immediately). Every wake-then-maybe-reschedule call site
    /// outside of `block_current_on`'s own caller (which already leaves
    /// `current` as `Blocked`, not `Running`, before rescheduling) must
    /// route through this rather than calling `reschedule` directly, or
    /// the outgoing task is left claiming `Running` while no longer
    /// `inner.current` (spec invariant I4).
    pub(crate) fn reschedule_after_wake(&self, inner: &mut Inner<P>) {
        self.demote_current_to_ready(inner);
        self.reschedule(inner);
    }

    /// Wake the head of `wq` and, if that woke anyone, reschedule via
    /// [`Kernel::reschedule_after_wake`]. The common case for
    /// semaphore/mutex/condvar `signal`.
    pub(crate) fn wake_one_and_reschedule(&self, inner: &mut Inner<P>, wq: &mut WaitQueue) -> Option<TaskId> {
        let woken = self.wake_one(inner, wq);
        if woken.is_some() {
            self.reschedule_after_wake(inner);
        }
        woken
    }

    /// Enqueue the current task on `wq` and mark it `Blocked`, without
    /// switching away yet — the first half of spec §9's "block the current
    /// task inside the scheduler lock; release the lock implicitly via the
    /// context switch" idiom. Most callers want [`Kernel::block_current_on`]
    /// instead; this split exists for condvar `wait`/`timedwait`, which
    /// must unlock the caller's mutex *between* enqueuing and yielding
    /// (spec §4.3.3).
    pub(crate) fn enqueue_current_blocked(
        &self,
        inner: &mut Inner<P>,
        wq: &mut WaitQueue,
        delay: Option<u32>,
    ) -> Result<TaskId> {
        let id = inner.current.expect("enqueue_current_blocked outside task context");
        self.ready_down(inner, id);
        wq.push_back(&mut inner.tasks, id)?;
        let tcb = inner.tasks.get_mut(id).unwrap();
        tcb.state = TaskState::Blocked;
        tcb.wake_reason = WakeReason::Pending;
        tcb.delay = delay.unwrap_or(0);
        tcb.blocked_on = Some(wq.as_ptr_mut());
        Ok(id)
    }

    /// Block the current task on `wq` and yield immediately (spec §9
    /// "block the current task inside the scheduler lock; release the
    /// lock implicitly via the context switch"). `delay` seeds the
    /// timeout counter for `timedlock`/`timedwait`; `None` blocks
    /// indefinitely.
    pub(crate) fn block_current_on(
        &self,
        inner: &mut Inner<P>,
        wq: &mut WaitQueue,
        delay: Option<u32>,
    ) -> Result<()> {
        self.enqueue_current_blocked(inner, wq, delay)?;
        self.reschedule(inner);
        Ok(())
    }

    /// The current task's [`WakeReason`] from its most recent block/wake
    /// cycle — how `timedlock`/`timedwait` distinguish a genuine signal
    /// from a timeout after re-entering (spec §4.3.2/§4.3.3).
    pub(crate) fn current_wake_reason(&self) -> WakeReason {
        self.with_inner(|inner| {
            let id = inner.current.expect("current_wake_reason outside task context");
            inner.tasks.get(id).unwrap().wake_reason
        })
    }

    /// Wake `id` by timeout expiry (tick handler step 2, and mutex/condvar
    /// `timed*` deadline handling): detach from whatever wait list it's
    /// on, then ready it up with [`WakeReason::TimedOut`].
    fn wake_by_timeout(&self, inner: &mut Inner<P>, id: TaskId) {
        let blocked_on = inner.tasks.get_mut(id).and_then(|tcb| tcb.blocked_on.take());
        if let Some(wq) = blocked_on {
            // Safety: the pointed-to queue is a sync object's wait list or
            // (never, for timeouts) a ready queue; it outlives any task
            // blocked on it by construction (see `TaskCb::blocked_on`).
            unsafe { (*wq).remove(&mut inner.tasks, id) };
        }
        self.ready_up(inner, id, WakeReason::TimedOut);
    }

    // ---- tick (spec §4.2 "Tick handler") --------------------------------

    /// The periodic tick entry point (spec §6 item 9). Called from the
    /// port's ISR; never called reentrantly on a single core.
    pub fn on_tick(&self) {
        let _g = SchedLock::<P>::enter();
        let inner = self.inner_mut();
        inner.tick = inner.tick.wrapping_add(1);
        let now = inner.tick;

        // Step 2: decrement delay of every BLOCKED task, waking expirees.
        let mut expired: arrayvec::ArrayVec<TaskId, { crate::config::MAX_TASKS }> =
            arrayvec::ArrayVec::new();
        for tcb in inner.tasks.iter_mut() {
            if tcb.state == TaskState::Blocked && tcb.delay > 0 {
                tcb.delay -= 1;
                if tcb.delay == 0 {
                    let _ = expired.try_push(tcb.id);
                }
            }
        }
        for id in expired {
            self.wake_by_timeout(inner, id);
        }

        // Step 3: run the timer wheel.
        inner.timers.process_tick(now, F_TIMER, TIMER_TICK_BATCH);

        // Step 4: decrement the running task's time slice.
        let mut need_reschedule = false;
        if inner.preemptive {
            if let Some(current) = inner.current {
                let expired_slice = {
                    let tcb = inner.tasks.get_mut(current).unwrap();
                    tcb.time_slice = tcb.time_slice.saturating_sub(1);
                    tcb.time_slice == 0
                };
                if expired_slice {
                    let base = inner.tasks.get(current).unwrap().base_priority;
                    inner.tasks.get_mut(current).unwrap().time_slice = base.time_slice();
                    self.ready_down(inner, current);
                    self.ready_up(inner, current, WakeReason::Pending);
                    need_reschedule = true;
                }
            }
        }

        // Step 5: reschedule if requested, or if a higher-priority task
        // just became ready. The slice-expiry path above already moved
        // `current` to `Ready` via `ready_down`/`ready_up`; the
        // higher-priority-only path hasn't touched it yet.
        if need_reschedule {
            self.reschedule(inner);
        } else if self.higher_priority_ready(inner) {
            self.reschedule_after_wake(inner);
        }
    }

    fn higher_priority_ready(&self, inner: &Inner<P>) -> bool {
        let Some(current) = inner.current else {
            return false;
        };
        let current_level = inner.tasks.get(current).unwrap().base_priority.level();
        match inner.ready_bitmap.find_set() {
            Some(top) => top < current_level,
            None => false,
        }
    }

    // ---- task core (spec §4.1 C1) --------------------------------------

    /// `spawn(entry, stack_size) -> id` (spec §4.1).
    pub fn spawn(&self, entry: TaskEntry, stack_size: usize) -> Result<TaskId> {
        let stack_size = stack_size.max(crate::config::MIN_TASK_STACK_SIZE);
        let stack_base = crate::alloc_util::alloc_stack(stack_size, crate::config::STACK_ALIGN)?;
        let _g = SchedLock::<P>::enter();
        let inner = self.inner_mut();
        let id = match inner.tasks.alloc(stack_base, stack_size, entry) {
            Ok(id) => id,
            Err(e) => {
                // Safety: just allocated above with the same size/align.
                unsafe {
                    crate::alloc_util::dealloc_stack(stack_base, stack_size, crate::config::STACK_ALIGN)
                };
                return Err(e);
            }
        };
        {
            let tcb = inner.tasks.get_mut(id).unwrap();
            // Safety: `ctx` was just default-initialized; nothing else can
            // observe it until `context_init` completes.
            unsafe { P::context_init(&mut *tcb.ctx.get(), stack_base, stack_size, entry) };
            tcb.state = TaskState::Ready;
        }
        inner.ready[Priority::DEFAULT.level()].push_back(&mut inner.tasks, id);
        inner.ready_bitmap.set(Priority::DEFAULT.level());
        Ok(id)
    }

    /// `cancel(id)` (spec §4.1). Forbidden for self.
    pub fn cancel(&self, id: TaskId) -> Result<()> {
        let _g = SchedLock::<P>::enter();
        let inner = self.inner_mut();
        if inner.current == Some(id) {
            return Err(Error::TaskCantRemove);
        }
        let tcb = inner.tasks.get(id).ok_or(Error::TaskNotFound)?;
        match tcb.state {
            TaskState::Ready => self.ready_down(inner, id),
            TaskState::Blocked => {
                if let Some(wq) = inner.tasks.get_mut(id).unwrap().blocked_on.take() {
                    // Safety: see `TaskCb::blocked_on`.
                    unsafe { (*wq).remove(&mut inner.tasks, id) };
                }
            }
            TaskState::Suspended | TaskState::Stopped => {}
            TaskState::Running => unreachable!("excluded above"),
        }
        let evicted = inner.tasks.free(id).ok_or(Error::TaskNotFound)?;
        // Safety: `stack_base`/`stack_size` match the allocation made in
        // `spawn`; the task is fully detached above.
        unsafe {
            crate::alloc_util::dealloc_stack(
                evicted.stack_base,
                evicted.stack_size,
                crate::config::STACK_ALIGN,
            )
        };
        Ok(())
    }

    /// `yield()` (spec §4.1): re-enqueue at the tail of the current level,
    /// then invoke the scheduler.
    pub fn yield_now(&self) {
        let _g = SchedLock::<P>::enter();
        let inner = self.inner_mut();
        let id = inner.current.expect("yield_now outside task context");
        self.ready_down(inner, id);
        self.ready_up(inner, id, WakeReason::Pending);
        self.reschedule(inner);
    }

    /// `delay(ticks)` (spec §4.1).
    pub fn delay(&self, ticks: u32) {
        let _g = SchedLock::<P>::enter();
        let inner = self.inner_mut();
        let id = inner.current.expect("delay outside task context");
        self.ready_down(inner, id);
        {
            let tcb = inner.tasks.get_mut(id).unwrap();
            tcb.state = TaskState::Blocked;
            tcb.delay = ticks;
            tcb.blocked_on = None;
        }
        self.reschedule(inner);
    }

    /// `wfi()` (spec §4.1): wait for the next tick in low-power idle.
    /// Implemented as a one-tick delay, mirroring the teacher's treatment
    /// of "wait for interrupt" as a scheduling primitive rather than a
    /// direct `Port::cpu_idle` call (which would bypass the scheduler).
    pub fn wfi(&self) {
        self.delay(1);
    }

    /// `suspend(id)` (spec §4.1).
    pub fn suspend(&self, id: TaskId) -> Result<()> {
        let _g = SchedLock::<P>::enter();
        let inner = self.inner_mut();
        let state = inner.tasks.get(id).ok_or(Error::TaskNotFound)?.state;
        match state {
            TaskState::Suspended | TaskState::Stopped => return Err(Error::TaskCantSuspend),
            TaskState::Ready | TaskState::Running => self.ready_down(inner, id),
            TaskState::Blocked => {
                if let Some(wq) = inner.tasks.get_mut(id).unwrap().blocked_on.take() {
                    // Safety: see `TaskCb::blocked_on`.
                    unsafe { (*wq).remove(&mut inner.tasks, id) };
                }
            }
        }
        inner.tasks.get_mut(id).unwrap().state = TaskState::Suspended;
        if inner.current == Some(id) {
            self.reschedule(inner);
        }
        Ok(())
    }

    /// `resume(id)` (spec §4.1, lifecycle "SUSPENDED -> READY").
    pub fn resume(&self, id: TaskId) -> Result<()> {
        let _g = SchedLock::<P>::enter();
        let inner = self.inner_mut();
        let state = inner.tasks.get(id).ok_or(Error::TaskNotFound)?.state;
        if state != TaskState::Suspended {
            return Err(Error::TaskCantResume);
        }
        self.ready_up(inner, id, WakeReason::Signaled);
        Ok(())
    }

    /// `priority(id, prio)` (spec §4.1): change base priority, migrating
    /// between level queues if the task is currently `Ready`.
    pub fn set_priority(&self, id: TaskId, prio: Priority) -> Result<()> {
        let _g = SchedLock::<P>::enter();
        let inner = self.inner_mut();
        let tcb = inner.tasks.get(id).ok_or(Error::TaskNotFound)?;
        let was_ready = tcb.state == TaskState::Ready;
        if was_ready {
            self.ready_down(inner, id);
        }
        let tcb = inner.tasks.get_mut(id).unwrap();
        tcb.base_priority = prio;
        tcb.time_slice = prio.time_slice();
        if was_ready {
            inner.ready[prio.level()].push_back(&mut inner.tasks, id);
            inner.ready_bitmap.set(prio.level());
        }
        Ok(())
    }

    /// `rt_priority(id, opaque)` (spec §4.1). The default scheduler never
    /// interprets this value; it exists for an installed RT hook.
    pub fn set_rt_priority(&self, id: TaskId, opaque: RtOpaque) -> Result<()> {
        let _g = SchedLock::<P>::enter();
        let inner = self.inner_mut();
        inner.tasks.get_mut(id).ok_or(Error::TaskNotFound)?.rt_prio = opaque;
        Ok(())
    }

    /// Install or clear the real-time scheduler hook (spec §4.2 "RT hook
    /// contract"). Only available with the `rt_hook` feature enabled.
    #[cfg(feature = "rt_hook")]
    pub fn set_rt_hook(&self, hook: Option<RtHook>) {
        let _g = SchedLock::<P>::enter();
        self.inner_mut().rt_hook = hook;
    }

    /// `id()`: the currently running task's id.
    pub fn current_id(&self) -> Option<TaskId> {
        let _g = SchedLock::<P>::enter();
        self.inner_mut().current
    }

    /// `count()`: number of live tasks.
    pub fn count(&self) -> usize {
        let _g = SchedLock::<P>::enter();
        self.inner_mut().tasks.count()
    }

    /// `idref(entry)` (spec §4.1): the id of the live task spawned with
    /// `entry` as its body, if any. Entry points are not required to be
    /// unique across `spawn` calls; this returns the first match found by
    /// table-slot order.
    pub fn idref(&self, entry: TaskEntry) -> Option<TaskId> {
        let _g = SchedLock::<P>::enter();
        self.inner_mut().tasks.iter().find(|tcb| tcb.entry == entry).map(|tcb| tcb.id)
    }

    /// Current value of the tick counter (the KCB's canonical copy).
    pub fn ticks(&self) -> u32 {
        let _g = SchedLock::<P>::enter();
        self.inner_mut().tick
    }

    /// `timer_create(callback, period_ms, arg)` (spec §4.6): allocates
    /// from the fixed timer pool in `DISABLED` state.
    pub fn timer_create(&self, callback: TimerCallback, period_ms: u32, arg: usize) -> Result<TimerId> {
        let _g = SchedLock::<P>::enter();
        self.inner_mut().timers.create(callback, period_ms, arg)
    }

    /// `timer_start(id, mode)` (spec §4.6): computes the deadline from the
    /// current tick and enters the running list in deadline order.
    pub fn timer_start(&self, id: TimerId, mode: TimerMode) -> Result<()> {
        let _g = SchedLock::<P>::enter();
        let inner = self.inner_mut();
        let now = inner.tick;
        inner.timers.start(id, mode, now, F_TIMER)
    }

    /// `timer_cancel(id)` (spec §4.6): removes from the running list,
    /// returning to `DISABLED` without freeing the pool slot.
    pub fn timer_cancel(&self, id: TimerId) -> Result<()> {
        let _g = SchedLock::<P>::enter();
        self.inner_mut().timers.cancel(id)
    }

    /// `timer_destroy(id)` (spec §4.6): removes from every list and
    /// returns the pool slot.
    pub fn timer_destroy(&self, id: TimerId) -> Result<()> {
        let _g = SchedLock::<P>::enter();
        self.inner_mut().timers.destroy(id)
    }

    /// Access the KCB's inner state under the scheduler lock, for the
    /// sync/IPC modules built on top of the task core.
    pub(crate) fn with_inner<R>(&self, f: impl FnOnce(&mut Inner<P>) -> R) -> R {
        let _g = SchedLock::<P>::enter();
        f(self.inner_mut())
    }

    pub(crate) fn reschedule_pub(&self, inner: &mut Inner<P>) {
        self.reschedule(inner);
    }
}
