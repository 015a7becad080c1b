//! The two critical-section primitives of spec §5, as scoped RAII guards.
//!
//! This is the concrete, non-generic-token realization of the teacher's
//! `CpuLockCell`/`CpuLockToken` pattern (`r3_kernel::klock`). The teacher
//! makes the lock a compile-time *type* (a zero-sized singleton token
//! bound to a `Traits` parameter) so that `UnsyncTokenLock` cells can be
//! read without a runtime check. Per spec §9's design note ("model it as a
//! state object owned by a kernel session... do not model it as ambient
//! process state"), this crate has exactly one kernel session per `Port`,
//! so a plain scoped guard — acquired by masking interrupts, released by
//! `Drop` restoring them — gives the same "only reachable while the
//! matching interrupt source is masked" guarantee without the generic
//! token machinery. See DESIGN.md for the tradeoff.
use core::marker::PhantomData;

use crate::port::Port;

/// RAII guard for the "full interrupt mask" section (`CRITICAL`, spec §5).
/// Disables every maskable interrupt for its lifetime; used only where a
/// structure is shared with an interrupt handler other than the scheduler
/// tick (the console input ring read by the logger bridge, spec §4.5).
pub struct CriticalSection<P: Port> {
    was_enabled: bool,
    _port: PhantomData<P>,
}

impl<P: Port> CriticalSection<P> {
    /// Enter the section, masking all interrupts.
    #[inline]
    pub fn enter() -> Self {
        // Safety: paired with `unmask_all` in `Drop`.
        let was_enabled = unsafe { P::mask_all() };
        Self {
            was_enabled,
            _port: PhantomData,
        }
    }
}

impl<P: Port> Drop for CriticalSection<P> {
    #[inline]
    fn drop(&mut self) {
        // Safety: `was_enabled` came from the matching `mask_all` call.
        unsafe { P::unmask_all(self.was_enabled) };
    }
}

/// RAII guard for the scheduler lock (`NOSCHED`, spec §5). Masks only the
/// scheduler's tick interrupt, leaving every other interrupt source enabled.
/// Every scheduler state transition and every synchronization primitive in
/// this crate is performed while holding one of these.
pub struct SchedLock<P: Port> {
    was_enabled: bool,
    _port: PhantomData<P>,
}

impl<P: Port> SchedLock<P> {
    /// Enter the section, masking the scheduler tick interrupt.
    #[inline]
    pub fn enter() -> Self {
        // Safety: paired with `unmask_sched` in `Drop`.
        let was_enabled = unsafe { P::mask_sched() };
        Self {
            was_enabled,
            _port: PhantomData,
        }
    }
}

impl<P: Port> Drop for SchedLock<P> {
    #[inline]
    fn drop(&mut self) {
        // Safety: `was_enabled` came from the matching `mask_sched` call.
        unsafe { P::unmask_sched(self.was_enabled) };
    }
}
