//! The software timer wheel (spec §4.6 C5).
//!
//! Grounded on `r3_kernel::{timeout, timer}`: two orderings over the same
//! fixed pool — an all-timers list kept sorted by id (for lookup) and a
//! running-timers list kept sorted by absolute deadline (for tick
//! processing) — plus drift-free auto-reload via `last_expected_fire_tick`
//! (spec §4.6, §9 "Drift-free reload"). The small LRU id-lookup cache is
//! this crate's own addition (the teacher looks timers up by direct
//! `Id`-indexed pool position; spec §4.6 explicitly asks for "O(n) lookup
//! aided by a small LRU cache of four entries", so timer ids here are a
//! free-running counter independent of pool slot position, making the
//! lookup genuinely list-shaped — see DESIGN.md).
use core::num::NonZeroU16;

use crate::config::{TIMER_LRU_SIZE, TIMER_POOL_SIZE};
use crate::error::{Error, Result};
use crate::timeout::{has_elapsed, ms_to_ticks};

/// A software timer's identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimerId(NonZeroU16);

/// One-shot vs. auto-reload vs. not running (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerMode {
    Disabled,
    OneShot,
    AutoReload,
}

/// `fn(arg)` invoked from tick/kernel context (spec §4.6: "callbacks run
/// in tick/kernel context and must not block").
pub type TimerCallback = fn(usize);

struct TimerRecord {
    id: TimerId,
    callback: TimerCallback,
    period_ms: u32,
    arg: usize,
    mode: TimerMode,
    deadline: u32,
    last_expected_fire_tick: u32,
    /// Next slot in the all-timers list, sorted by ascending id.
    all_link: Option<usize>,
    /// Next slot in the running-timers list, sorted by ascending deadline.
    run_link: Option<usize>,
}

/// The fixed pool of timer records plus its two orderings (spec §4.6).
pub(crate) struct TimerWheel {
    pool: [Option<TimerRecord>; TIMER_POOL_SIZE],
    all_head: Option<usize>,
    run_head: Option<usize>,
    next_id: u16,
    /// `(id, slot)` pairs, most-recently-used at index 0.
    lru: [Option<(TimerId, usize)>; TIMER_LRU_SIZE],
}

impl TimerWheel {
    pub fn new() -> Self {
        Self {
            pool: core::array::from_fn(|_| None),
            all_head: None,
            run_head: None,
            next_id: 1,
            lru: [None; TIMER_LRU_SIZE],
        }
    }

    fn alloc_id(&mut self) -> Result<TimerId> {
        for _ in 0..u16::MAX {
            let candidate = self.next_id;
            self.next_id = self.next_id.wrapping_add(1).max(1);
            if let Some(id) = NonZeroU16::new(candidate) {
                if self.find_slot(TimerId(id)).is_none() {
                    return Ok(TimerId(id));
                }
            }
        }
        Err(Error::Unknown)
    }

    /// `timer_create` (spec §4.6): allocate from the pool, link into the
    /// sorted all-timers list, start `DISABLED`.
    pub fn create(&mut self, callback: TimerCallback, period_ms: u32, arg: usize) -> Result<TimerId> {
        let slot = self
            .pool
            .iter()
            .position(|s| s.is_none())
            .ok_or(Error::Unknown)?;
        let id = self.alloc_id()?;
        self.pool[slot] = Some(TimerRecord {
            id,
            callback,
            period_ms,
            arg,
            mode: TimerMode::Disabled,
            deadline: 0,
            last_expected_fire_tick: 0,
            all_link: None,
            run_link: None,
        });
        self.insert_all_sorted(slot);
        Ok(id)
    }

    fn insert_all_sorted(&mut self, slot: usize) {
        let id = self.pool[slot].as_ref().unwrap().id;
        let mut prev: Option<usize> = None;
        let mut cur = self.all_head;
        while let Some(c) = cur {
            if self.pool[c].as_ref().unwrap().id > id {
                break;
            }
            prev = Some(c);
            cur = self.pool[c].as_ref().unwrap().all_link;
        }
        self.pool[slot].as_mut().unwrap().all_link = cur;
        match prev {
            Some(p) => self.pool[p].as_mut().unwrap().all_link = Some(slot),
            None => self.all_head = Some(slot),
        }
    }

    fn remove_all(&mut self, slot: usize) {
        let next = self.pool[slot].as_ref().unwrap().all_link;
        if self.all_head == Some(slot) {
            self.all_head = next;
        } else {
            let mut cur = self.all_head;
            while let Some(c) = cur {
                let link = self.pool[c].as_ref().unwrap().all_link;
                if link == Some(slot) {
                    self.pool[c].as_mut().unwrap().all_link = next;
                    break;
                }
                cur = link;
            }
        }
        self.lru.iter_mut().for_each(|e| {
            if matches!(e, Some((_, s)) if *s == slot) {
                *e = None;
            }
        });
    }

    fn insert_run_sorted(&mut self, slot: usize) {
        let deadline = self.pool[slot].as_ref().unwrap().deadline;
        let mut prev: Option<usize> = None;
        let mut cur = self.run_head;
        while let Some(c) = cur {
            // Strictly-greater keeps equal deadlines in insertion order
            // (spec §8 "timers with equal absolute deadlines fire in
            // insertion order").
            if self.pool[c].as_ref().unwrap().deadline.wrapping_sub(deadline) as i32 > 0 {
                break;
            }
            prev = Some(c);
            cur = self.pool[c].as_ref().unwrap().run_link;
        }
        self.pool[slot].as_mut().unwrap().run_link = cur;
        match prev {
            Some(p) => self.pool[p].as_mut().unwrap().run_link = Some(slot),
            None => self.run_head = Some(slot),
        }
    }

    fn remove_run(&mut self, slot: usize) {
        let next = self.pool[slot].as_ref().unwrap().run_link;
        if self.run_head == Some(slot) {
            self.run_head = next;
            self.pool[slot].as_mut().unwrap().run_link = None;
            return;
        }
        let mut cur = self.run_head;
        while let Some(c) = cur {
            let link = self.pool[c].as_ref().unwrap().run_link;
            if link == Some(slot) {
                self.pool[c].as_mut().unwrap().run_link = next;
                break;
            }
            cur = link;
        }
        self.pool[slot].as_mut().unwrap().run_link = None;
    }

    fn find_slot(&mut self, id: TimerId) -> Option<usize> {
        for entry in self.lru.iter() {
            if let Some((cached_id, slot)) = entry {
                if *cached_id == id {
                    return Some(*slot);
                }
            }
        }
        let mut cur = self.all_head;
        while let Some(c) = cur {
            let rec = self.pool[c].as_ref().unwrap();
            if rec.id == id {
                self.lru.rotate_right(1);
                self.lru[0] = Some((id, c));
                return Some(c);
            }
            if rec.id > id {
                break;
            }
            cur = rec.all_link;
        }
        None
    }

    /// `timer_start` (spec §4.6): compute `deadline = now +
    /// MS_TO_TICKS(period_ms)`, seed `last_expected_fire_tick`, and link
    /// into the running list in deadline order.
    pub fn start(&mut self, id: TimerId, mode: TimerMode, now: u32, f_timer: u32) -> Result<()> {
        let slot = self.find_slot(id).ok_or(Error::TaskNotFound)?;
        if self.pool[slot].as_ref().unwrap().run_link.is_some() || self.run_head == Some(slot) {
            self.remove_run(slot);
        }
        let period_ticks = ms_to_ticks(self.pool[slot].as_ref().unwrap().period_ms, f_timer);
        let deadline = now.wrapping_add(period_ticks);
        {
            let rec = self.pool[slot].as_mut().unwrap();
            rec.mode = mode;
            rec.deadline = deadline;
            rec.last_expected_fire_tick = deadline;
        }
        self.insert_run_sorted(slot);
        Ok(())
    }

    /// `timer_cancel` (spec §4.6): remove from the running list, mark
    /// `DISABLED`.
    pub fn cancel(&mut self, id: TimerId) -> Result<()> {
        let slot = self.find_slot(id).ok_or(Error::TaskNotFound)?;
        self.remove_run(slot);
        self.pool[slot].as_mut().unwrap().mode = TimerMode::Disabled;
        Ok(())
    }

    /// `timer_destroy`: cancel, unlink from the all-timers list, and
    /// return the record to the pool.
    pub fn destroy(&mut self, id: TimerId) -> Result<()> {
        let slot = self.find_slot(id).ok_or(Error::TaskNotFound)?;
        self.remove_run(slot);
        self.remove_all(slot);
        self.pool[slot] = None;
        Ok(())
    }

    /// Tick processing (spec §4.6): fire every timer whose deadline has
    /// elapsed, bounded by `batch` entries to cap interrupt latency.
    /// Auto-reload timers are recomputed drift-free from
    /// `last_expected_fire_tick`, never from `now`.
    pub fn process_tick(&mut self, now: u32, f_timer: u32, batch: usize) {
        for _ in 0..batch {
            let Some(slot) = self.run_head else { break };
            let deadline = self.pool[slot].as_ref().unwrap().deadline;
            if !has_elapsed(deadline, now) {
                break;
            }
            self.remove_run(slot);
            let (callback, arg, mode, period_ms, last_fire) = {
                let rec = self.pool[slot].as_ref().unwrap();
                (rec.callback, rec.arg, rec.mode, rec.period_ms, rec.last_expected_fire_tick)
            };
            callback(arg);
            match mode {
                TimerMode::AutoReload => {
                    let period_ticks = ms_to_ticks(period_ms, f_timer);
                    let next_fire = last_fire.wrapping_add(period_ticks);
                    let rec = self.pool[slot].as_mut().unwrap();
                    rec.last_expected_fire_tick = next_fire;
                    rec.deadline = next_fire;
                    self.insert_run_sorted(slot);
                }
                TimerMode::OneShot => {
                    self.pool[slot].as_mut().unwrap().mode = TimerMode::Disabled;
                }
                TimerMode::Disabled => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TIMER_TICK_BATCH;
    use core::sync::atomic::{AtomicUsize, Ordering};

    static FIRE_COUNT: AtomicUsize = AtomicUsize::new(0);

    fn count_fire(_arg: usize) {
        FIRE_COUNT.fetch_add(1, Ordering::Relaxed);
    }

    /// Auto-reload timers must fire at their nominal period on average, not
    /// just "eventually" — `last_expected_fire_tick` must advance from
    /// itself, never from the tick `process_tick` happened to observe late.
    #[test]
    fn auto_reload_stays_locked_to_nominal_period() {
        FIRE_COUNT.store(0, Ordering::Relaxed);
        let mut wheel = TimerWheel::new();
        let f_timer = 100; // 1 tick == 10ms
        let id = wheel.create(count_fire, 100, 0).unwrap(); // 100ms == 10 ticks
        wheel.start(id, TimerMode::AutoReload, 0, f_timer).unwrap();

        // Drive the wheel tick-by-tick, occasionally "losing" a tick's worth
        // of wall-clock progress the way a busy ISR might, by calling
        // process_tick with a `now` that has already advanced several ticks
        // in one jump instead of exactly one at a time.
        let mut now = 0u32;
        for jump in [3u32, 4, 3, 5, 2, 3] {
            now += jump;
            wheel.process_tick(now, f_timer, TIMER_TICK_BATCH);
        }
        // 20 ticks elapsed total; a timer locked to its nominal period fires
        // every 10 ticks regardless of how unevenly `process_tick` was
        // called, so exactly 2 fires are expected, not more or fewer.
        assert_eq!(FIRE_COUNT.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn one_shot_disarms_after_firing() {
        FIRE_COUNT.store(0, Ordering::Relaxed);
        let mut wheel = TimerWheel::new();
        let id = wheel.create(count_fire, 50, 0).unwrap();
        wheel.start(id, TimerMode::OneShot, 0, 100).unwrap();
        wheel.process_tick(10, 100, TIMER_TICK_BATCH);
        assert_eq!(FIRE_COUNT.load(Ordering::Relaxed), 1);
        wheel.process_tick(1000, 100, TIMER_TICK_BATCH);
        assert_eq!(FIRE_COUNT.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn cancel_prevents_firing_and_destroy_frees_the_slot() {
        FIRE_COUNT.store(0, Ordering::Relaxed);
        let mut wheel = TimerWheel::new();
        let id = wheel.create(count_fire, 10, 0).unwrap();
        wheel.start(id, TimerMode::AutoReload, 0, 100).unwrap();
        wheel.cancel(id).unwrap();
        wheel.process_tick(100, 100, TIMER_TICK_BATCH);
        assert_eq!(FIRE_COUNT.load(Ordering::Relaxed), 0);
        wheel.destroy(id).unwrap();
        assert_eq!(wheel.cancel(id), Err(Error::TaskNotFound));
    }

    #[test]
    fn equal_deadlines_fire_in_insertion_order() {
        static ORDER: core::sync::atomic::AtomicU32 = core::sync::atomic::AtomicU32::new(0);
        fn mark_first(_: usize) {
            ORDER.compare_exchange(0, 1, Ordering::Relaxed, Ordering::Relaxed).ok();
        }
        fn mark_second(_: usize) {
            ORDER.compare_exchange(1, 2, Ordering::Relaxed, Ordering::Relaxed).ok();
        }
        ORDER.store(0, Ordering::Relaxed);
        let mut wheel = TimerWheel::new();
        let a = wheel.create(mark_first, 10, 0).unwrap();
        let b = wheel.create(mark_second, 10, 0).unwrap();
        wheel.start(a, TimerMode::OneShot, 0, 100).unwrap();
        wheel.start(b, TimerMode::OneShot, 0, 100).unwrap();
        wheel.process_tick(10, 100, TIMER_TICK_BATCH);
        assert_eq!(ORDER.load(Ordering::Relaxed), 2);
    }
}
