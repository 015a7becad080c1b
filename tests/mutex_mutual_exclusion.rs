//! End-to-end: two tasks contend on one mutex for 1000 iterations each,
//! incrementing a shared counter in a read-modify-write sequence designed
//! to expose any missed exclusion (spec §8 "mutex contention... a
//! violation counter that must stay 0").
mod support;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use rt_engine::{Application, Mutex, Priority};
use support::{ExclusiveCell, TestPort};

const ITERATIONS: u32 = 1000;

static GUARD: OnceLock<ExclusiveCell<Mutex<TestPort>>> = OnceLock::new();
static INSIDE: ExclusiveCell<bool> = ExclusiveCell::new(false);
static SHARED_COUNTER: ExclusiveCell<u32> = ExclusiveCell::new(0);

static VIOLATIONS: AtomicU32 = AtomicU32::new(0);
static DONE_A: AtomicU32 = AtomicU32::new(0);
static DONE_B: AtomicU32 = AtomicU32::new(0);

fn critical_section() {
    let inside = unsafe { INSIDE.get() };
    if *inside {
        VIOLATIONS.fetch_add(1, Ordering::AcqRel);
    }
    *inside = true;
    let counter = unsafe { SHARED_COUNTER.get() };
    let before = *counter;
    *counter = before + 1;
    *inside = false;
}

fn contender(done: &'static AtomicU32) {
    let k = support::kernel();
    for _ in 0..ITERATIONS {
        let m = unsafe { GUARD.get().unwrap().get() };
        m.lock(k).unwrap();
        critical_section();
        m.unlock(k).unwrap();
        done.fetch_add(1, Ordering::AcqRel);
    }
}

fn task_a() {
    contender(&DONE_A);
}

fn task_b() {
    contender(&DONE_B);
}

struct App;

impl Application for App {
    fn main(&self) -> bool {
        let k = support::kernel();
        k.spawn(task_a, 128 * 1024).unwrap();
        k.spawn(task_b, 128 * 1024).unwrap();
        let pump = k.spawn(support::tick_pump, 64 * 1024).unwrap();
        k.set_priority(pump, Priority::Idle).unwrap();
        true
    }
}

static APP: App = App;

#[test]
fn mutual_exclusion_holds_under_contention() {
    GUARD.set(ExclusiveCell::new(Mutex::new())).ok();

    support::start_kernel(&APP);

    let deadline = Instant::now() + Duration::from_secs(10);
    while DONE_A.load(Ordering::Acquire) < ITERATIONS || DONE_B.load(Ordering::Acquire) < ITERATIONS {
        assert!(
            Instant::now() < deadline,
            "contenders stalled: a={} b={}",
            DONE_A.load(Ordering::Relaxed),
            DONE_B.load(Ordering::Relaxed),
        );
        std::thread::sleep(Duration::from_millis(5));
    }

    assert_eq!(VIOLATIONS.load(Ordering::Acquire), 0);
    assert_eq!(unsafe { *SHARED_COUNTER.get() }, ITERATIONS * 2);
}
