//! The task model (spec §3 TCB, §4.1 C1).
//!
//! Field-for-field this mirrors `r3_kernel::task::TaskCb`, but where the
//! teacher parameterizes over a `Traits: KernelTraits` bound and stores
//! cross-references as `&'static` pointers guarded by `CpuLockCell`, this
//! crate (per spec §9's "implement using indices or handles... keep raw
//! pointers only inside list nodes" design note) stores only a `TaskId`
//! handle on every cross-reference and keeps the one raw pointer the
//! hardware actually needs — the stack base — as a bare `*mut u8` owned
//! exclusively by the task's slot.
pub(crate) mod readyqueue;

pub(crate) use readyqueue::TaskTable;

use core::cell::UnsafeCell;
use core::num::NonZeroU16;

use crate::config::TIME_SLICE_TICKS;
use crate::port::{Context, Port};

/// A task's 16-bit identifier (spec §3: "a unique 16-bit identifier").
/// `NonZeroU16` so `Option<TaskId>` costs nothing extra, mirroring
/// `r3_core::Id`'s own `NonZeroUsize` newtype narrowed to the spec's width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(NonZeroU16);

impl TaskId {
    pub(crate) fn new(raw: u16) -> Option<Self> {
        NonZeroU16::new(raw).map(Self)
    }

    pub(crate) fn get(self) -> u16 {
        self.0.get()
    }

    /// Zero-based index into the fixed task table.
    pub(crate) fn index(self) -> usize {
        (self.0.get() - 1) as usize
    }
}

impl core::fmt::Display for TaskId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "#{}", self.0.get())
    }
}

/// Lifecycle state (spec §3: `{STOPPED, READY, RUNNING, BLOCKED,
/// SUSPENDED}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Stopped,
    Ready,
    Running,
    Blocked,
    Suspended,
}

/// The eight static priorities (spec §3), `CRIT` most urgent, `IDLE` least.
/// The discriminant *is* the priority level (0..7) used to index
/// `ready_queues`/`TIME_SLICE_TICKS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Priority {
    Crit = 0,
    Realtime = 1,
    High = 2,
    Above = 3,
    Normal = 4,
    Below = 5,
    Low = 6,
    Idle = 7,
}

impl Priority {
    pub const DEFAULT: Priority = Priority::Normal;

    #[inline]
    pub const fn level(self) -> usize {
        self as u8 as usize
    }

    #[inline]
    pub const fn time_slice(self) -> u8 {
        TIME_SLICE_TICKS[self.level()]
    }

    /// Recover a `Priority` from its level, as used when restoring a task
    /// from a serialized level (e.g. `priority(id, level)` syscall args).
    pub const fn from_level(level: usize) -> Option<Self> {
        match level {
            0 => Some(Priority::Crit),
            1 => Some(Priority::Realtime),
            2 => Some(Priority::High),
            3 => Some(Priority::Above),
            4 => Some(Priority::Normal),
            5 => Some(Priority::Below),
            6 => Some(Priority::Low),
            7 => Some(Priority::Idle),
            _ => None,
        }
    }
}

/// `task_entry` — a task body. Zero-argument, per spec §3/§6; a task that
/// needs kernel operations reaches them through [`Port::kernel`], exactly
/// as it would reach a hardware register through the port in a real
/// embedded target.
pub type TaskEntry = fn();

/// Opaque slot for an installed real-time scheduler hook (spec §3, §4.1
/// `rt_priority`). The default scheduler never interprets this value.
pub type RtOpaque = usize;

/// Why a blocked task was last woken, distinguishing a genuine event from
/// a timeout (spec §4.3.2/§4.3.3's "distinguish signalled from timed out").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeReason {
    /// Still waiting; no wake has happened yet.
    Pending,
    /// Woken by `signal`/`broadcast`/mutex unlock token transfer.
    Signaled,
    /// Woken by the tick handler's delay-expiry scan.
    TimedOut,
}

/// The Task Control Block (spec §3).
pub(crate) struct TaskCb<P: Port> {
    pub id: TaskId,
    pub state: TaskState,
    /// Static base priority (spec §3's "upper byte"); never changes except
    /// via [`crate::state::Kernel::set_priority`].
    pub base_priority: Priority,
    /// Time-slice counter remaining this dispatch (spec §3's "lower byte").
    pub time_slice: u8,
    /// Ticks remaining until a delayed/timed-blocked task is woken.
    /// Meaningful only while `state == Blocked`.
    pub delay: u32,
    pub rt_prio: RtOpaque,
    /// Membership in exactly one ready or wait queue at a time (I1). `None`
    /// when the task is `Running` or not queued anywhere.
    pub queue_link: Option<TaskId>,
    /// The queue `queue_link` threads through — a ready level's queue or a
    /// sync primitive's wait list, both the same [`readyqueue::TaskQueue`]
    /// shape. Lets [`crate::state::Kernel::cancel`] detach a task from
    /// whichever one currently holds it without the task core needing to
    /// know the sync object's concrete type (spec §9: no trait/interface
    /// hierarchy beyond the RT hook). Sound as long as the pointed-to queue
    /// outlives any task blocked on it, which every sync primitive and the
    /// KCB's own ready queues guarantee by construction.
    pub blocked_on: Option<*mut readyqueue::TaskQueue>,
    pub wake_reason: WakeReason,
    pub stack_base: *mut u8,
    pub stack_size: usize,
    pub entry: TaskEntry,
    pub ctx: UnsafeCell<P::Context>,
}

impl<P: Port> TaskCb<P> {
    pub(crate) fn new(
        id: TaskId,
        stack_base: *mut u8,
        stack_size: usize,
        entry: TaskEntry,
    ) -> Self {
        Self {
            id,
            state: TaskState::Stopped,
            base_priority: Priority::DEFAULT,
            time_slice: Priority::DEFAULT.time_slice(),
            delay: 0,
            rt_prio: 0,
            queue_link: None,
            blocked_on: None,
            wake_reason: WakeReason::Pending,
            stack_base,
            stack_size,
            entry,
            ctx: UnsafeCell::new(P::Context::UNINIT),
        }
    }
}

// Safety: every field access happens with the scheduler lock held (or, for
// `ctx`, only by the port's own `context_switch`/`context_init`, themselves
// only called under the scheduler lock). `*mut u8` stack pointers are never
// aliased outside this guarantee.
unsafe impl<P: Port> Send for TaskCb<P> {}
unsafe impl<P: Port> Sync for TaskCb<P> {}
