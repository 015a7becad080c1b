//! Build-time configuration constants.
//!
//! The engine has no runtime configuration file (spec §6); every knob here is
//! a `const` an integrator overrides by wrapping the crate or, for the ones
//! marked below, by enabling a Cargo feature. This mirrors the teacher's use
//! of Cargo features plus plain `const`s instead of a config-file parser.

/// CPU clock frequency, Hz (spec §6 Configuration). Informational for the
/// core engine; consumed by a port's `hardware_init`.
pub const F_CPU: u32 = 16_000_000;

/// System tick frequency, Hz (spec §6 Configuration, `F_TIMER`). Every
/// millisecond-denominated timer period (§4.6) is converted to ticks
/// against this rate.
pub const F_TIMER: u32 = 100;

/// Number of distinct priority levels (`CRIT` .. `IDLE`).
pub const NUM_PRIORITY_LEVELS: usize = 8;

/// Per-level time slice, in ticks. Indexed by [`crate::task::Priority`] level.
pub const TIME_SLICE_TICKS: [u8; NUM_PRIORITY_LEVELS] = [1, 2, 3, 4, 5, 7, 10, 15];

/// Minimum stack size accepted by [`crate::task::spawn`], in bytes.
pub const MIN_TASK_STACK_SIZE: usize = 256;

/// Default stack size used by demo/self-test callers that don't specify one.
pub const DEFAULT_TASK_STACK_SIZE: usize = 1024;

/// Upper bound on the number of waiters a single semaphore/mutex/condvar
/// wait queue may hold. Chosen generously for a small embedded system;
/// exceeding it for a semaphore is a configuration error the spec requires
/// us to `panic(SEM_OPERATION)` on (§4.3.1), other primitives simply refuse
/// further blocking callers are not expected in practice on a single core.
pub const MAX_WAITERS: usize = 32;

/// Maximum number of software timers the pool in [`crate::timer`] holds.
pub const TIMER_POOL_SIZE: usize = 16;

/// Batch size: number of expired timers processed per tick before yielding
/// back to the rest of the tick handler, bounding interrupt latency (§4.6).
pub const TIMER_TICK_BATCH: usize = 4;

/// Size of the timer id lookup LRU cache (§4.6).
pub const TIMER_LRU_SIZE: usize = 4;

/// Scheduler safety iteration limit: an upper bound the scheduler's internal
/// loops (e.g. ready-queue scans) use to detect a corrupted list rather than
/// spin forever (spec §6 Configuration, `SCHED_IMAX`).
pub const SCHED_IMAX: usize = 500;

/// Default number of entries in the deferred logger ring (spec §4.5).
pub const LOG_RING_ENTRIES: usize = 8;

/// Maximum length, in bytes, of one formatted logger entry (spec §4.5).
pub const LOG_ENTRY_SIZE: usize = 128;

/// Maximum number of bytes a single [`crate::pipe::Pipe`] may buffer.
pub const PIPE_MAX_CAPACITY: usize = 32_768;

/// Upper bound on the number of tasks the engine tracks concurrently.
/// Bounds the syscall table and the worst-case iteration cost of a tick's
/// delay scan (§4.2 step 2); not part of the original spec's explicit
/// configuration list, but required to give the task table a fixed shape
/// suitable for `no_std` without a general-purpose allocator for the table
/// itself (individual TCBs and stacks are still heap-allocated, see
/// DESIGN.md).
pub const MAX_TASKS: usize = 64;

/// Upper saturation bound for a counting semaphore's count (spec §3
/// invariant I5).
pub const SEM_MAX_COUNT: u32 = 65_535;

/// Alignment used for task stack allocations. 16 bytes satisfies every
/// common 32-bit embedded ABI's stack alignment requirement.
pub const STACK_ALIGN: usize = 16;
