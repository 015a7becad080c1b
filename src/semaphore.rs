//! Counting semaphore (spec §4.3.1).
use core::marker::PhantomData;

use crate::config::MAX_WAITERS;
use crate::error::{Error, Result};
use crate::port::Port;
use crate::state::Kernel;
use crate::wait::WaitQueue;

const MAGIC: u32 = 0x53454D30;
const MAGIC_DEAD: u32 = 0xDEAD_5E31;

/// A FIFO counting semaphore (spec §3, §4.3.1).
pub struct Semaphore<P: Port> {
    magic: u32,
    count: u32,
    max_waiters: usize,
    waiters: WaitQueue,
    _port: PhantomData<P>,
}

impl<P: Port> Semaphore<P> {
    /// Construct with `max_waiters > 0` and `initial_count` in
    /// `[0, SEM_MAX_COUNT]` (spec §4.3.1).
    pub fn new(max_waiters: usize, initial_count: u32) -> Result<Self> {
        if max_waiters == 0 {
            return Err(Error::SemAlloc);
        }
        Ok(Self {
            magic: MAGIC,
            count: initial_count.min(crate::config::SEM_MAX_COUNT),
            max_waiters: max_waiters.min(MAX_WAITERS),
            waiters: WaitQueue::new(),
            _port: PhantomData,
        })
    }

    fn check_tag(&self) -> Result<()> {
        if self.magic != MAGIC {
            Err(Error::Unknown)
        } else {
            Ok(())
        }
    }

    /// `wait` (spec §4.3.1): fast path if `count > 0` and the wait queue
    /// is empty; otherwise block, or `panic(SEM_OPERATION)` if the wait
    /// queue is already at capacity.
    pub fn wait(&mut self, kernel: &Kernel<P>) -> Result<()> {
        self.check_tag()?;
        kernel.with_inner(|inner| {
            if self.count > 0 && self.waiters.is_empty() {
                self.count -= 1;
                return Ok(());
            }
            if self.waiters.len() >= self.max_waiters {
                P::panic(Error::SemOperation);
            }
            kernel.block_current_on(inner, &mut self.waiters, None)
        })
    }

    /// `trywait` (spec §4.3.1): same fast path, `FAIL` otherwise.
    pub fn trywait(&mut self) -> Result<()> {
        self.check_tag()?;
        if self.count > 0 && self.waiters.is_empty() {
            self.count -= 1;
            Ok(())
        } else {
            Err(Error::Fail)
        }
    }

    /// `signal` (spec §4.3.1): token-pass to the head waiter if any,
    /// otherwise increment the count (saturating at `SEM_MAX_COUNT`).
    pub fn signal(&mut self, kernel: &Kernel<P>) -> Result<()> {
        self.check_tag()?;
        kernel.with_inner(|inner| {
            if kernel.wake_one_and_reschedule(inner, &mut self.waiters).is_none()
                && self.count < crate::config::SEM_MAX_COUNT
            {
                self.count += 1;
            }
        });
        Ok(())
    }

    pub fn getvalue(&self) -> Result<u32> {
        self.check_tag()?;
        Ok(self.count)
    }

    pub fn waiting_count(&self) -> Result<usize> {
        self.check_tag()?;
        Ok(self.waiters.len())
    }

    /// `destroy` (spec §4.3.1): refuses with `TASK_BUSY` if waiters remain.
    pub fn destroy(&mut self) -> Result<()> {
        self.check_tag()?;
        if !self.waiters.is_empty() {
            return Err(Error::TaskBusy);
        }
        self.magic = MAGIC_DEAD;
        Ok(())
    }
}
