//! Non-recursive mutex (spec §4.3.2).
use core::marker::PhantomData;

use crate::error::{Error, Result};
use crate::port::Port;
use crate::state::Kernel;
use crate::task::TaskId;
use crate::wait::WaitQueue;

const MAGIC: u32 = 0x4D555831;
const MAGIC_DEAD: u32 = 0xDEAD_5E32;

/// A non-recursive mutex with FIFO wait ordering (spec §3, §4.3.2). No
/// priority inheritance or ceiling protocol (spec §1 non-goals).
pub struct Mutex<P: Port> {
    magic: u32,
    owner: Option<TaskId>,
    waiters: WaitQueue,
    _port: PhantomData<P>,
}

impl<P: Port> Mutex<P> {
    pub fn new() -> Self {
        Self {
            magic: MAGIC,
            owner: None,
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

    pub fn owner(&self) -> Option<TaskId> {
        self.owner
    }

    /// `lock` (spec §4.3.2): `TASK_BUSY` on self-relock, otherwise acquire
    /// if free or block on the wait list.
    pub fn lock(&mut self, kernel: &Kernel<P>) -> Result<()> {
        self.check_tag()?;
        let cur = kernel.current_id().ok_or(Error::Unknown)?;
        if self.owner == Some(cur) {
            return Err(Error::TaskBusy);
        }
        kernel.with_inner(|inner| {
            if self.owner.is_none() {
                self.owner = Some(cur);
                return Ok(());
            }
            kernel.block_current_on(inner, &mut self.waiters, None)
        })
    }

    /// `trylock` (spec §4.3.2): same rules, non-blocking.
    pub fn trylock(&mut self, kernel: &Kernel<P>) -> Result<()> {
        self.check_tag()?;
        let cur = kernel.current_id().ok_or(Error::Unknown)?;
        if self.owner == Some(cur) {
            return Err(Error::TaskBusy);
        }
        if self.owner.is_none() {
            self.owner = Some(cur);
            Ok(())
        } else {
            Err(Error::Fail)
        }
    }

    /// `timedlock(ticks)` (spec §4.3.2). Zero ticks behaves as `trylock`.
    /// Races between a timeout and a racing `unlock` are resolved by
    /// checking `owner` after the wake (spec: "Races... resolved by
    /// checking the current owner_tid").
    pub fn timedlock(&mut self, kernel: &Kernel<P>, ticks: u32) -> Result<()> {
        if ticks == 0 {
            return self.trylock(kernel);
        }
        self.check_tag()?;
        let cur = kernel.current_id().ok_or(Error::Unknown)?;
        if self.owner == Some(cur) {
            return Err(Error::TaskBusy);
        }
        kernel.with_inner(|inner| {
            if self.owner.is_none() {
                self.owner = Some(cur);
                return Ok(());
            }
            kernel.block_current_on(inner, &mut self.waiters, Some(ticks))
        })?;
        if self.owner == Some(cur) {
            Ok(())
        } else {
            Err(Error::Timeout)
        }
    }

    /// `unlock` (spec §4.3.2): `NOT_OWNER` if the caller doesn't hold it;
    /// otherwise clear ownership or transfer it to the head waiter.
    pub fn unlock(&mut self, kernel: &Kernel<P>) -> Result<()> {
        self.unlock_inner(kernel, true)
    }

    /// Same as [`Mutex::unlock`] but the caller controls whether the
    /// resulting wake is allowed to reschedule immediately — condvar
    /// `wait`/`timedwait` unlock the mutex *before* yielding themselves
    /// (spec §4.3.3), so they pass `reschedule = false` and switch away
    /// on their own terms afterward.
    pub(crate) fn unlock_inner(&mut self, kernel: &Kernel<P>, reschedule: bool) -> Result<()> {
        self.check_tag()?;
        let cur = kernel.current_id().ok_or(Error::Unknown)?;
        if self.owner != Some(cur) {
            return Err(Error::NotOwner);
        }
        kernel.with_inner(|inner| {
            let woken = if reschedule {
                kernel.wake_one_and_reschedule(inner, &mut self.waiters)
            } else {
                kernel.wake_one(inner, &mut self.waiters)
            };
            self.owner = woken;
        });
        Ok(())
    }

    /// `destroy` (spec §4.3.2): refuses if owned or has waiters.
    pub fn destroy(&mut self) -> Result<()> {
        self.check_tag()?;
        if self.owner.is_some() || !self.waiters.is_empty() {
            return Err(Error::TaskBusy);
        }
        self.magic = MAGIC_DEAD;
        Ok(())
    }
}

impl<P: Port> Default for Mutex<P> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_support::SimPort;

    #[test]
    fn fresh_mutex_is_unowned_and_destroyable() {
        let mut m: Mutex<SimPort> = Mutex::new();
        assert!(m.owner().is_none());
        assert_eq!(m.destroy(), Ok(()));
    }

    #[test]
    fn destroyed_mutex_rejects_further_ops() {
        let mut m: Mutex<SimPort> = Mutex::new();
        m.destroy().unwrap();
        assert_eq!(m.destroy(), Err(Error::Unknown));
    }
}
