//! Pointer message queue (spec §4.4.2). Not present in `r3_kernel`;
//! grounded on the spec's SPSC-ring description plus the teacher's ring
//! utility idiom. All operations run under the scheduler lock, which is
//! what lets a ring with SPSC-lock-free origins (spec's own framing)
//! safely support multiple producers/consumers here.
use core::marker::PhantomData;

use crate::error::{Error, Result};
use crate::klock::SchedLock;
use crate::port::Port;
use crate::utils::ring::{round_up_pow2, PtrRing};

/// One message queue entry: a pointer to a caller-allocated payload plus a
/// type tag and size (spec §3). The queue never reads or frees the
/// pointee — ownership stays with the sending/receiving protocol.
#[derive(Debug, Clone, Copy)]
pub struct Message {
    pub payload: *mut u8,
    pub type_tag: u16,
    pub size: u16,
}

const MAGIC: u32 = 0x4D515130;
const MAGIC_DEAD: u32 = 0xDEAD_5E35;

/// A bounded pointer FIFO (spec §3, §4.4.2).
pub struct Mq<P: Port> {
    magic: u32,
    ring: PtrRing<Message>,
    _port: PhantomData<P>,
}

impl<P: Port> Mq<P> {
    /// Capacity is rounded up to the next power of two.
    pub fn new(capacity: usize) -> Self {
        let capacity = round_up_pow2(capacity, 2, usize::MAX / 2);
        Self {
            magic: MAGIC,
            ring: PtrRing::new(capacity),
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

    /// `enqueue` (spec §4.4.2): `FAIL` on full.
    pub fn enqueue(&mut self, msg: Message) -> Result<()> {
        self.check_tag()?;
        let _g = SchedLock::<P>::enter();
        if self.ring.push(msg) {
            Ok(())
        } else {
            Err(Error::Fail)
        }
    }

    /// `dequeue` (spec §4.4.2): `None` on empty.
    pub fn dequeue(&mut self) -> Result<Option<Message>> {
        self.check_tag()?;
        let _g = SchedLock::<P>::enter();
        Ok(self.ring.pop())
    }

    pub fn len(&self) -> Result<usize> {
        self.check_tag()?;
        Ok(self.ring.used())
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.check_tag()?;
        Ok(self.ring.is_empty())
    }

    pub fn capacity(&self) -> Result<usize> {
        self.check_tag()?;
        Ok(self.ring.capacity())
    }

    /// `destroy` (spec §4.4.2): `MQ_NOTEMPTY` if messages remain.
    pub fn destroy(&mut self) -> Result<()> {
        self.check_tag()?;
        if !self.ring.is_empty() {
            return Err(Error::MqNotEmpty);
        }
        self.magic = MAGIC_DEAD;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_support::SimPort;

    fn msg(tag: u16) -> Message {
        Message {
            payload: core::ptr::null_mut(),
            type_tag: tag,
            size: 0,
        }
    }

    #[test]
    fn fifo_order_preserved() {
        let mut q: Mq<SimPort> = Mq::new(4);
        q.enqueue(msg(1)).unwrap();
        q.enqueue(msg(2)).unwrap();
        assert_eq!(q.dequeue().unwrap().unwrap().type_tag, 1);
        assert_eq!(q.dequeue().unwrap().unwrap().type_tag, 2);
        assert!(q.dequeue().unwrap().is_none());
    }

    #[test]
    fn destroy_refuses_when_nonempty() {
        let mut q: Mq<SimPort> = Mq::new(2);
        q.enqueue(msg(1)).unwrap();
        assert_eq!(q.destroy(), Err(Error::MqNotEmpty));
        q.dequeue().unwrap();
        assert_eq!(q.destroy(), Ok(()));
    }
}
