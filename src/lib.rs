//! A preemptive, priority-based real-time task execution engine for
//! small single-core 32-bit embedded processors.
//!
//! This crate is the architecture-independent core: task model, ready
//! bitmap/round-robin scheduler, blocking primitives (semaphore, mutex,
//! condition variable), IPC (byte pipe, pointer message queue), a
//! software timer wheel, and an optional deferred logger. It has no
//! knowledge of any particular CPU, interrupt controller, or console —
//! an integrator supplies those by implementing [`Port`] and owning a
//! `'static` [`Kernel`], the same split `r3_kernel` draws between itself
//! and its `r3_port_*` crates.
//!
//! ```text
//! app_main() -> Kernel::spawn(...) for each initial task
//!            -> Kernel::start(&app) -> Port::dispatch_first(...)
//! ```
#![cfg_attr(not(test), no_std)]

extern crate alloc;

mod alloc_util;
pub mod config;
pub mod cond;
pub mod error;
pub mod klock;
#[cfg(feature = "logger")]
pub mod logger;
pub mod mqueue;
pub mod mutex;
pub mod pipe;
pub mod port;
pub mod semaphore;
pub mod state;
pub mod syscall;
pub mod task;
mod timeout;
pub mod timer;
mod utils;
mod wait;

#[cfg(test)]
pub(crate) mod tests_support;

pub use cond::Cvar;
pub use error::{Error, Result};
pub use klock::{CriticalSection, SchedLock};
pub use mqueue::{Message, Mq};
#[cfg(feature = "logger")]
pub use logger::Logger;
pub use mutex::Mutex;
pub use pipe::Pipe;
pub use port::{Context, Port};
pub use semaphore::Semaphore;
#[cfg(feature = "rt_hook")]
pub use state::RtHook;
pub use state::{Application, Kernel};
pub use task::{Priority, RtOpaque, TaskEntry, TaskId, TaskState, WakeReason};
pub use timer::{TimerCallback, TimerId, TimerMode};
