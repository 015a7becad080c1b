//! A minimal, non-blocking [`Port`] used only by this crate's own
//! `#[cfg(test)]` unit tests that exercise sync/IPC primitives without
//! driving a real scheduler loop (fast paths, construction validation,
//! data-structure invariants). End-to-end scenarios that need genuine
//! blocking and context switches (spec §8) live under `tests/` with a
//! fuller simulated port backed by OS threads — see `tests/support`.
use crate::error::Error;
use crate::port::{Context, Port};
use crate::state::Kernel;
use crate::task::TaskEntry;

pub(crate) struct SimContext;

impl Context for SimContext {
    const UNINIT: Self = SimContext;
}

pub(crate) struct SimPort;

unsafe impl Port for SimPort {
    type Context = SimContext;

    fn hardware_init() {}

    unsafe fn mask_all() -> bool {
        true
    }

    unsafe fn unmask_all(_was_enabled: bool) {}

    unsafe fn mask_sched() -> bool {
        true
    }

    unsafe fn unmask_sched(_was_enabled: bool) {}

    unsafe fn context_init(
        _ctx: &mut Self::Context,
        _stack_base: *mut u8,
        _stack_size: usize,
        _entry: TaskEntry,
    ) {
    }

    unsafe fn context_switch(_from: *mut Self::Context, _to: *const Self::Context) {
        panic!("SimPort cannot actually switch contexts; use tests/support for blocking scenarios");
    }

    unsafe fn dispatch_first(_to: *const Self::Context) -> ! {
        panic!("SimPort cannot dispatch; use tests/support for blocking scenarios");
    }

    fn cpu_idle() {}

    fn console_write_byte(_byte: u8) {}

    fn panic(code: Error) -> ! {
        panic!("kernel panic: {code}");
    }

    fn ticks() -> u32 {
        0
    }

    fn kernel() -> &'static Kernel<Self> {
        panic!("SimPort has no static kernel; pass one explicitly in tests");
    }
}
