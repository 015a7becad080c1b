//! Condition variable (spec §4.3.3). Not present in the teacher
//! (`r3_kernel` offers event groups instead); grounded on the teacher's
//! wait-queue/token-passing idiom plus the classic "unlock, block, yield,
//! re-lock" shape.
use core::marker::PhantomData;

use crate::error::{Error, Result};
use crate::mutex::Mutex;
use crate::port::Port;
use crate::state::Kernel;
use crate::task::WakeReason;
use crate::wait::WaitQueue;

const MAGIC: u32 = 0x43564130;
const MAGIC_DEAD: u32 = 0xDEAD_5E33;

/// A condition variable always used together with a caller-supplied
/// [`Mutex`] (spec §3, §4.3.3).
pub struct Cvar<P: Port> {
    magic: u32,
    waiters: WaitQueue,
    _port: PhantomData<P>,
}

impl<P: Port> Cvar<P> {
    pub fn new() -> Self {
        Self {
            magic: MAGIC,
            waiters: WaitQueue::new(),
            _port: PhantomData,
        }
    }

    fn check_tag(&self) -> Result<()> {
        if self.magic != MAGIC {
            Err(Error::Unknown)
        } else {
            Ok(())
        }
    }

    /// `wait(c, m)` (spec §4.3.3): push, block, unlock `m`, yield; on
    /// wake, re-acquire `m`. Spurious wakes are not modeled — callers
    /// must re-test their predicate in a loop, as the spec mandates.
    pub fn wait(&mut self, kernel: &Kernel<P>, m: &mut Mutex<P>) -> Result<()> {
        self.check_tag()?;
        let cur = kernel.current_id().ok_or(Error::Unknown)?;
        if m.owner() != Some(cur) {
            return Err(Error::NotOwner);
        }
        kernel.with_inner(|inner| kernel.enqueue_current_blocked(inner, &mut self.waiters, None))?;
        m.unlock_inner(kernel, false)?;
        kernel.with_inner(|inner| kernel.reschedule_pub(inner));
        m.lock(kernel)
    }

    /// `timedwait(c, m, ticks)` (spec §4.3.3): as `wait`, additionally
    /// distinguishing a timeout from a genuine signal via
    /// [`WakeReason`] on re-entry; re-acquires `m` in either case.
    pub fn timedwait(&mut self, kernel: &Kernel<P>, m: &mut Mutex<P>, ticks: u32) -> Result<()> {
        self.check_tag()?;
        let cur = kernel.current_id().ok_or(Error::Unknown)?;
        if m.owner() != Some(cur) {
            return Err(Error::NotOwner);
        }
        kernel
            .with_inner(|inner| kernel.enqueue_current_blocked(inner, &mut self.waiters, Some(ticks)))?;
        m.unlock_inner(kernel, false)?;
        kernel.with_inner(|inner| kernel.reschedule_pub(inner));
        let timed_out = kernel.current_wake_reason() == WakeReason::TimedOut;
        m.lock(kernel)?;
        if timed_out {
            Err(Error::Timeout)
        } else {
            Ok(())
        }
    }

    /// `signal` (spec §4.3.3): wakes the head waiter only; does not touch
    /// the associated mutex.
    pub fn signal(&mut self, kernel: &Kernel<P>) -> Result<()> {
        self.check_tag()?;
        kernel.with_inner(|inner| {
            kernel.wake_one_and_reschedule(inner, &mut self.waiters);
        });
        Ok(())
    }

    /// `broadcast` (spec §4.3.3): wakes every waiter, then reschedules
    /// once (not per-waiter) now that the whole batch is `Ready`.
    pub fn broadcast(&mut self, kernel: &Kernel<P>) -> Result<()> {
        self.check_tag()?;
        kernel.with_inner(|inner| {
            let mut woke_any = false;
            while kernel.wake_one(inner, &mut self.waiters).is_some() {
                woke_any = true;
            }
            if woke_any {
                kernel.reschedule_after_wake(inner);
            }
        });
        Ok(())
    }

    /// `destroy` (spec §4.3.3): refuses if waiters exist.
    pub fn destroy(&mut self) -> Result<()> {
        self.check_tag()?;
        if !self.waiters.is_empty() {
            return Err(Error::TaskBusy);
        }
        self.magic = MAGIC_DEAD;
        Ok(())
    }
}

impl<P: Port> Default for Cvar<P> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_support::SimPort;

    #[test]
    fn fresh_cvar_has_no_waiters_and_is_destroyable() {
        let mut c: Cvar<SimPort> = Cvar::new();
        assert_eq!(c.destroy(), Ok(()));
    }
}
