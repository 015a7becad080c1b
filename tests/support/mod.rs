//! A simulated [`Port`] for this crate's own end-to-end tests (spec §8),
//! analogous in purpose to `r3_port_std` (not in implementation: no
//! `ucontext`/signal-based user-mode scheduling, just enough to drive the
//! scheduler under `std`).
//!
//! Each task gets a real OS thread and a one-shot "gate" (mutex + condvar).
//! `context_switch(from, to)` signals `to`'s gate and blocks on `from`'s —
//! exactly one gate is ever open at a time, so only one task thread is ever
//! actually running, matching the single-core model the engine assumes.
//!
//! A tick ISR can't be simulated the same way: there is no hardware to
//! interrupt a task thread mid-flight without unwinding it onto a different
//! stack. Instead an ordinary `IDLE`-priority task (`tick_pump`) calls
//! `on_tick()` itself, in a sleep loop. Because it is the *current* task
//! whenever it does so, `on_tick`'s own `reschedule` call behaves exactly as
//! it would from a real ISR return path — it blocks the calling thread (the
//! pump's) and wakes whichever thread the scheduler picked instead. Tests
//! that need tick-driven behavior (timeouts, timers, slice rotation) must
//! make sure every higher-priority task blocks or delays sometimes, or the
//! pump never gets a turn and no ticks are ever observed — the same
//! starvation a real strict-priority scheduler would exhibit.
use std::cell::UnsafeCell;
use std::sync::{Condvar, Mutex, OnceLock};
use std::sync::Arc;
use std::time::Duration;

use rt_engine::{Context, Error, Kernel, Port, TaskEntry};

/// A cell shared across the simulated task threads with no runtime
/// exclusion of its own. Sound only because the gate protocol below
/// guarantees exactly one task thread is ever unparked (i.e. actually
/// executing) at a time — the same single-core assumption the engine
/// itself is built on, just enforced by OS-thread parking here instead of
/// real interrupt masking.
pub struct ExclusiveCell<T>(UnsafeCell<T>);

unsafe impl<T> Sync for ExclusiveCell<T> {}

impl<T> ExclusiveCell<T> {
    pub const fn new(value: T) -> Self {
        Self(UnsafeCell::new(value))
    }

    /// Safety: caller must only call this from simulated task code running
    /// under [`TestPort`], never concurrently with another live borrow.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn get(&self) -> &mut T {
        unsafe { &mut *self.0.get() }
    }
}

struct Gate {
    ready: Mutex<bool>,
    cv: Condvar,
}

impl Gate {
    fn new() -> Self {
        Self {
            ready: Mutex::new(false),
            cv: Condvar::new(),
        }
    }

    fn signal(&self) {
        let mut g = self.ready.lock().unwrap();
        *g = true;
        self.cv.notify_one();
    }

    fn wait(&self) {
        let mut g = self.ready.lock().unwrap();
        while !*g {
            g = self.cv.wait(g).unwrap();
        }
        *g = false;
    }
}

pub struct TestContext {
    gate: OnceLock<Arc<Gate>>,
}

impl Context for TestContext {
    const UNINIT: Self = TestContext {
        gate: OnceLock::new(),
    };
}

pub struct TestPort;

static KERNEL: OnceLock<Kernel<TestPort>> = OnceLock::new();

unsafe impl Port for TestPort {
    type Context = TestContext;

    fn hardware_init() {}

    // No real interrupt source competes with task code in this harness —
    // the simulated tick is delivered by `tick_pump`, an ordinary task
    // bound by the same gate protocol as everything else — so these are
    // no-ops, same as `tests_support::SimPort`.
    unsafe fn mask_all() -> bool {
        true
    }

    unsafe fn unmask_all(_was_enabled: bool) {}

    unsafe fn mask_sched() -> bool {
        true
    }

    unsafe fn unmask_sched(_was_enabled: bool) {}

    unsafe fn context_init(
        ctx: &mut Self::Context,
        _stack_base: *mut u8,
        stack_size: usize,
        entry: TaskEntry,
    ) {
        let gate = Arc::new(Gate::new());
        ctx.gate
            .set(gate.clone())
            .unwrap_or_else(|_| panic!("context_init called twice on the same slot"));
        std::thread::Builder::new()
            .stack_size(stack_size)
            .spawn(move || {
                gate.wait();
                entry();
                // `TaskEntry` isn't expected to return on a real target
                // either; park rather than let the OS thread exit out from
                // under a kernel that still thinks the task is live.
                loop {
                    std::thread::park();
                }
            })
            .expect("failed to spawn simulated task thread");
    }

    unsafe fn context_switch(from: *mut Self::Context, to: *const Self::Context) {
        let to_gate = (*to)
            .gate
            .get()
            .expect("context_switch: `to` context not initialized")
            .clone();
        let from_gate = (*from)
            .gate
            .get()
            .expect("context_switch: `from` context not initialized")
            .clone();
        to_gate.signal();
        from_gate.wait();
    }

    unsafe fn dispatch_first(to: *const Self::Context) -> ! {
        let to_gate = (*to)
            .gate
            .get()
            .expect("dispatch_first: context not initialized")
            .clone();
        to_gate.signal();
        loop {
            std::thread::park();
        }
    }

    fn cpu_idle() {
        std::thread::yield_now();
    }

    fn console_write_byte(byte: u8) {
        eprint!("{}", byte as char);
    }

    fn panic(code: Error) -> ! {
        panic!("kernel panic: {code}");
    }

    fn ticks() -> u32 {
        KERNEL.get().map(|k| k.ticks()).unwrap_or(0)
    }

    fn kernel() -> &'static Kernel<Self> {
        KERNEL.get_or_init(Kernel::new)
    }
}

/// The `IDLE`-priority task every test must spawn exactly once: it is the
/// only thing that ever calls `on_tick`, at roughly 1ms real-time
/// intervals.
pub fn tick_pump() {
    loop {
        std::thread::sleep(Duration::from_millis(1));
        TestPort::kernel().on_tick();
    }
}

/// This harness's kernel session.
pub fn kernel() -> &'static Kernel<TestPort> {
    <TestPort as Port>::kernel()
}

/// Spawn the dedicated OS thread that calls `Kernel::start`, which never
/// returns. Must be called from a thread other than the test's own, so the
/// test can keep making assertions while the simulated kernel runs.
pub fn start_kernel(app: &'static dyn rt_engine::Application) {
    std::thread::Builder::new()
        .name("kernel-driver".into())
        .spawn(move || kernel().start(app))
        .expect("failed to spawn the kernel driver thread");
}
