//! `ReadyBitmap`, the 8-bit ready-queue-occupancy bitmap of spec §3/§4.2.
//!
//! The teacher's `r3_kernel::utils::prio_bitmap::FixedPrioBitmap<LEN>` is a
//! generic, multi-level bit array supporting up to `WORD_LEN^3` priority
//! levels via const-generic specialization, because `r3_kernel` lets a port
//! configure an arbitrary number of priority levels at compile time. Spec §3
//! fixes the level count at exactly 8, so this is the teacher's base case
//! (`OneLevelPrioBitmapImpl<u8, 8>`) with the multi-level machinery dropped —
//! one `u8`, `trailing_zeros` finds the highest-priority non-empty level in
//! O(1).
use core::fmt;

/// Bit *i* is set iff ready queue level *i* is non-empty (spec invariant I2).
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadyBitmap(u8);

impl ReadyBitmap {
    /// An empty bitmap.
    pub const fn new() -> Self {
        Self(0)
    }

    #[inline]
    pub const fn get(&self, level: usize) -> bool {
        (self.0 >> level) & 1 != 0
    }

    #[inline]
    pub fn set(&mut self, level: usize) {
        self.0 |= 1 << level;
    }

    #[inline]
    pub fn clear(&mut self, level: usize) {
        self.0 &= !(1 << level);
    }

    /// Index of the lowest set bit (highest-priority non-empty level), if any.
    #[inline]
    pub fn find_set(&self) -> Option<usize> {
        if self.0 == 0 {
            None
        } else {
            Some(self.0.trailing_zeros() as usize)
        }
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for ReadyBitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries((0..8).filter(|&i| self.get(i)))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;
    use std::collections::BTreeSet;

    #[quickcheck]
    fn matches_reference_model(ops: Vec<(bool, u8)>) -> bool {
        let mut bitmap = ReadyBitmap::new();
        let mut reference = BTreeSet::new();
        for (set, level) in ops {
            let level = (level % 8) as usize;
            if set {
                bitmap.set(level);
                reference.insert(level);
            } else {
                bitmap.clear(level);
                reference.remove(&level);
            }
            if bitmap.find_set() != reference.iter().next().copied() {
                return false;
            }
            if bitmap.is_empty() != reference.is_empty() {
                return false;
            }
        }
        true
    }

    #[test]
    fn get_set_clear_round_trip() {
        let mut b = ReadyBitmap::new();
        assert!(b.is_empty());
        b.set(4);
        assert!(b.get(4));
        assert_eq!(b.find_set(), Some(4));
        b.set(0);
        assert_eq!(b.find_set(), Some(0));
        b.clear(0);
        assert_eq!(b.find_set(), Some(4));
        b.clear(4);
        assert!(b.is_empty());
    }
}
