//! The HAL contract (spec §6). Every item here is a boundary the engine
//! calls into but never implements — the architecture trampoline, the
//! console driver, and the allocator all live on the other side of this
//! trait, exactly as spec §1 scopes them out of the core.
//!
//! An architecture crate (not part of this repository — see DESIGN.md)
//! implements [`Port`] and links it against this engine, mirroring how
//! `r3_port_arm_m`/`r3_port_riscv`/`r3_port_std` implement `r3_kernel::Port`
//! for the teacher.

/// A type capable of resuming a previously saved task context. Opaque to the
/// engine; only the port knows its layout (callee-saved registers, stack
/// pointer, program counter, processor status word — spec §3 TCB).
pub trait Context: Sized {
    /// A context value with no meaningful saved state, used to fill newly
    /// allocated task control blocks before [`Port::context_init`] runs.
    const UNINIT: Self;
}

/// The architecture/board support package the engine is generic over.
///
/// # Safety
///
/// Implementations must uphold the concurrency model of spec §5: while a
/// [`Port::mask_sched`]/[`Port::mask_all`] section is active, the
/// corresponding interrupt source must not fire on this core, and
/// `context_switch` must not return to the caller — control resumes only by
/// a later restore of the *outgoing* context.
pub unsafe trait Port {
    /// Opaque saved-context type (spec §3, §6 item 4–5).
    type Context: Context;

    /// `hal_hardware_init` (§6 item 1): bring up the console and the system
    /// tick at `F_TIMER` Hz. Called once before [`Port::dispatch_first`].
    fn hardware_init();

    /// `hal_interrupt_set` (§6 item 3): mask or unmask *all* maskable
    /// interrupts, returning the prior enabled state. This is the "full
    /// interrupt mask" / `CRITICAL` primitive of spec §5.
    ///
    /// # Safety
    /// Must be paired with a matching [`Port::unmask_all`] using the
    /// returned token; never call while already inside a `CRITICAL` section
    /// on the same core without restoring in between.
    unsafe fn mask_all() -> bool;

    /// Restore the interrupt-enabled state previously returned by
    /// [`Port::mask_all`].
    ///
    /// # Safety
    /// `was_enabled` must be the value returned by the matching
    /// [`Port::mask_all`] call.
    unsafe fn unmask_all(was_enabled: bool);

    /// `hal_timer_enable`/`hal_timer_disable` (§6 item 2): mask or unmask
    /// only the scheduler's periodic tick interrupt. This is the `NOSCHED` /
    /// scheduler-lock primitive of spec §5 — non-scheduler interrupts stay
    /// enabled.
    ///
    /// # Safety
    /// Must be paired with a matching [`Port::unmask_sched`].
    unsafe fn mask_sched() -> bool;

    /// Restore the scheduler-tick-enabled state previously returned by
    /// [`Port::mask_sched`].
    ///
    /// # Safety
    /// `was_enabled` must be the value returned by the matching
    /// [`Port::mask_sched`] call.
    unsafe fn unmask_sched(was_enabled: bool);

    /// `hal_context_init` (§6 item 4): build an initial saved context so a
    /// subsequent restore begins executing `entry` with a stack spanning
    /// `[stack_base, stack_base + stack_size)`.
    ///
    /// # Safety
    /// `stack_base` must point to a valid, exclusively-owned region of at
    /// least `stack_size` bytes that outlives the task.
    unsafe fn context_init(
        ctx: &mut Self::Context,
        stack_base: *mut u8,
        stack_size: usize,
        entry: crate::task::TaskEntry,
    );

    /// `hal_context_save`/`hal_context_restore` (§6 item 5): save the
    /// currently-running context into `from` and resume `to`. Returns to the
    /// caller only when some other call eventually switches back to `from`.
    ///
    /// # Safety
    /// Both contexts must be valid and not concurrently switched-to from
    /// another call; the engine only ever calls this with the scheduler
    /// lock held.
    unsafe fn context_switch(from: *mut Self::Context, to: *const Self::Context);

    /// `hal_dispatch_init` (§6 item 6): begin running the first task and
    /// never return.
    ///
    /// # Safety
    /// `to` must be a fully-initialized context (via [`Port::context_init`]).
    unsafe fn dispatch_first(to: *const Self::Context) -> !;

    /// `hal_cpu_idle` (§6 item 7): low-power wait for the next interrupt.
    fn cpu_idle();

    /// `hal_panic` (§6 item 8): print `code` via the direct-mode I/O path
    /// and halt. Never returns.
    fn panic(code: crate::error::Error) -> !;

    /// `hal_console_putc` (§6 item 1, §4.5): emit one byte to the console,
    /// blocking if the underlying UART/semihosting channel is momentarily
    /// full. Used both by the direct-mode fallback and by the logger
    /// drain task's normal output path (spec §4.5).
    fn console_write_byte(byte: u8);

    /// Current value of the free-running tick counter, for callers that
    /// only need a monotonic read (e.g. `uptime`); the canonical counter
    /// lives in the KCB and is advanced by [`crate::scheduler::on_tick`].
    fn ticks() -> u32;

    /// Returns the kernel session this port drives.
    ///
    /// Spec §9's design note asks that the KCB be "a state object owned by
    /// a kernel session... not ambient process state" rather than a global
    /// the engine reaches for on its own. Since [`crate::task::TaskEntry`]
    /// is a bare `fn()` with no parameter slot to thread a session reference
    /// through, something still has to own that `'static` reference — we
    /// push that ownership out to the port, same as the integrator owning
    /// `static mut CURRENT_TASK`-style globals in a concrete arch crate.
    /// This engine never constructs the static itself; it only ever reads
    /// it back through this one accessor, and every read happens with the
    /// scheduler lock already held by the caller.
    fn kernel() -> &'static crate::state::Kernel<Self>
    where
        Self: Sized;
}
