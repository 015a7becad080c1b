//! End-to-end: `timedlock` against a mutex held forever must time out
//! after its tick budget and leave the wait list empty (spec §8
//! "`mutex_timedlock(m, 5)` on a held-forever mutex... `TIMEOUT` after 5
//! ticks with an empty wait list afterward").
mod support;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use rt_engine::{Application, Error, Mutex, Priority};
use support::{ExclusiveCell, TestPort};

const TIMEOUT_TICKS: u32 = 5;

static GUARD: OnceLock<ExclusiveCell<Mutex<TestPort>>> = OnceLock::new();

static HOLDER_LOCKED: AtomicBool = AtomicBool::new(false);
static WAITER_DONE: AtomicBool = AtomicBool::new(false);
static WAITER_RESULT: OnceLock<Result<(), Error>> = OnceLock::new();

/// Takes the mutex once and holds it for the test's whole duration. Uses
/// `delay`, not `yield_now`, between checks: a tick-driven `delay` actually
/// leaves the ready queue, which is what lets the `IDLE` tick pump ever
/// become the highest-priority ready task and get a turn — a task that
/// merely yields never truly vacates its ready level.
fn holder_task() {
    let k = support::kernel();
    let m = unsafe { GUARD.get().unwrap().get() };
    m.lock(k).unwrap();
    HOLDER_LOCKED.store(true, Ordering::Release);
    loop {
        k.delay(1);
    }
}

fn waiter_task() {
    let k = support::kernel();
    // Give the holder a chance to actually acquire the mutex first.
    while !HOLDER_LOCKED.load(Ordering::Acquire) {
        k.yield_now();
    }
    let m = unsafe { GUARD.get().unwrap().get() };
    let result = m.timedlock(k, TIMEOUT_TICKS);
    WAITER_RESULT.set(result).ok();
    WAITER_DONE.store(true, Ordering::Release);
    loop {
        k.yield_now();
    }
}

struct App;

impl Application for App {
    fn main(&self) -> bool {
        let k = support::kernel();
        k.spawn(holder_task, 64 * 1024).unwrap();
        k.spawn(waiter_task, 64 * 1024).unwrap();
        let pump = k.spawn(support::tick_pump, 64 * 1024).unwrap();
        k.set_priority(pump, Priority::Idle).unwrap();
        true
    }
}

static APP: App = App;

#[test]
fn timedlock_expires_and_clears_the_wait_list() {
    GUARD.set(ExclusiveCell::new(Mutex::new())).ok();

    support::start_kernel(&APP);

    let deadline = Instant::now() + Duration::from_secs(10);
    while !WAITER_DONE.load(Ordering::Acquire) {
        assert!(Instant::now() < deadline, "waiter never observed a timeout");
        std::thread::sleep(Duration::from_millis(5));
    }

    assert_eq!(WAITER_RESULT.get().copied(), Some(Err(Error::Timeout)));
    let m = unsafe { GUARD.get().unwrap().get() };
    assert_eq!(m.owner().is_some(), true, "holder is still expected to own the mutex");
}
