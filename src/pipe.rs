//! Byte pipe (spec §4.4.1). Not present in `r3_kernel` (which leaves
//! queuing disciplines to application code); grounded on the spec's own
//! ring-buffer description plus the teacher's utility-module idiom
//! (`r3_kernel::utils`).
use core::marker::PhantomData;

use crate::config::PIPE_MAX_CAPACITY;
use crate::error::{Error, Result};
use crate::port::Port;
use crate::state::Kernel;
use crate::utils::ring::{round_up_pow2, ByteRing};

const MAGIC: u32 = 0x50495030;
const MAGIC_DEAD: u32 = 0xDEAD_5E34;

/// A byte FIFO pipe (spec §3, §4.4.1). Blocking reads/writes use a tight
/// yield loop rather than a wait queue — a deliberate simplicity/latency
/// trade-off the spec calls out (§9 Open Questions) as the one place an
/// implementer might prefer to upgrade to a wait-queue design for heavy
/// fan-in/fan-out use.
pub struct Pipe<P: Port> {
    magic: u32,
    ring: ByteRing,
    _port: PhantomData<P>,
}

impl<P: Port> Pipe<P> {
    /// Capacity is rounded up to the next power of two (minimum 2, maximum
    /// `PIPE_MAX_CAPACITY`).
    pub fn new(capacity: usize) -> Self {
        let capacity = round_up_pow2(capacity, 2, PIPE_MAX_CAPACITY);
        Self {
            magic: MAGIC,
            ring: ByteRing::new(capacity),
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

    /// `write(data, n)` (spec §4.4.1): writes all of `data`, yielding to
    /// the scheduler whenever the buffer is full.
    pub fn write(&mut self, kernel: &Kernel<P>, data: &[u8]) -> Result<usize> {
        self.check_tag()?;
        let mut written = 0;
        while written < data.len() {
            written += self.ring.write(&data[written..]);
            if written < data.len() {
                kernel.yield_now();
            }
        }
        Ok(written)
    }

    /// `nbwrite(data, n)` (spec §4.4.1): writes `min(n, free)` and returns
    /// immediately.
    pub fn nbwrite(&mut self, data: &[u8]) -> Result<usize> {
        self.check_tag()?;
        Ok(self.ring.write(data))
    }

    /// `read` (spec §4.4.1): reads `out.len()` bytes, yielding while the
    /// pipe is empty.
    pub fn read(&mut self, kernel: &Kernel<P>, out: &mut [u8]) -> Result<usize> {
        self.check_tag()?;
        let mut got = 0;
        while got < out.len() {
            got += self.ring.read(&mut out[got..]);
            if got < out.len() {
                kernel.yield_now();
            }
        }
        Ok(got)
    }

    /// `nbread` (spec §4.4.1): reads as many bytes as available, up to
    /// `out.len()`, without blocking.
    pub fn nbread(&mut self, out: &mut [u8]) -> Result<usize> {
        self.check_tag()?;
        Ok(self.ring.read(out))
    }

    /// `flush` (spec §4.4.1): resets head, tail, and `used` to zero.
    pub fn flush(&mut self) -> Result<()> {
        self.check_tag()?;
        self.ring.flush();
        Ok(())
    }

    pub fn size(&self) -> Result<usize> {
        self.check_tag()?;
        Ok(self.ring.used())
    }

    pub fn capacity(&self) -> Result<usize> {
        self.check_tag()?;
        Ok(self.ring.capacity())
    }

    pub fn free_space(&self) -> Result<usize> {
        self.check_tag()?;
        Ok(self.ring.free())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_support::SimPort;

    #[test]
    fn capacity_rounds_up_to_power_of_two() {
        let p: Pipe<SimPort> = Pipe::new(100);
        assert_eq!(p.capacity(), Ok(128));
    }

    #[test]
    fn nonblocking_round_trip() {
        let mut p: Pipe<SimPort> = Pipe::new(8);
        assert_eq!(p.nbwrite(b"abcd").unwrap(), 4);
        let mut out = [0u8; 4];
        assert_eq!(p.nbread(&mut out).unwrap(), 4);
        assert_eq!(&out, b"abcd");
        assert_eq!(p.size(), Ok(0));
        assert_eq!(p.free_space(), p.capacity());
    }

    #[test]
    fn nbwrite_saturates_at_free_space() {
        let mut p: Pipe<SimPort> = Pipe::new(4);
        assert_eq!(p.nbwrite(b"abcdef").unwrap(), 4);
        assert_eq!(p.free_space(), Ok(0));
    }
}
