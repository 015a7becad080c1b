//! Wrap-safe tick/deadline comparison (spec §5, §9 "Wrap-safe tick
//! comparisons"). The 32-bit tick counter wraps roughly every 497 days at
//! 100 Hz; every deadline check here uses signed-difference arithmetic
//! instead of a plain `<=`, mirroring `r3_kernel::timeout::Time32`'s own
//! wrapping-comparison idiom.

/// `true` once `deadline` has elapsed relative to `now`: `signed(deadline -
/// now) <= 0`.
#[inline]
pub(crate) fn has_elapsed(deadline: u32, now: u32) -> bool {
    (deadline.wrapping_sub(now) as i32) <= 0
}

/// Milliseconds to ticks at the configured tick rate, rounding up so a
/// timer never fires early.
#[inline]
pub(crate) fn ms_to_ticks(period_ms: u32, f_timer: u32) -> u32 {
    // ceil(period_ms * f_timer / 1000)
    let num = (period_ms as u64) * (f_timer as u64);
    ((num + 999) / 1000) as u32
}
