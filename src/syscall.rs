//! Numeric syscall table (spec §6), for targets whose architecture layer
//! supports two privilege levels. A user-mode task traps into the kernel
//! with a syscall number and up to four register-sized arguments; this
//! module is the table an architecture's trap handler dispatches into.
//! The calling convention itself — which registers, how the trap is
//! raised — is the architecture layer's concern, not this engine's; the
//! spec only requires "argument and return slots are passed by register".
//!
//! Not grounded on any single teacher file (`r3_kernel` has no syscall
//! layer of its own — its tasks always run in the same privilege level as
//! the kernel); grounded instead on spec §6's own description of the
//! table shape and on the POSIX errno stubs newlib-style embedded libc
//! shims commonly expose for `_read`/`_write`/`_open`/etc.
use crate::error::Error;
use crate::port::Port;
use crate::state::Kernel;
use crate::task::{Priority, TaskId};

/// The 43 syscall numbers (spec §6). The first dozen delegate 1:1 to a
/// kernel operation; the rest are POSIX-shaped stubs, since this engine
/// owns no filesystem, process model, or signal delivery.
pub mod nr {
    pub const SPAWN: u32 = 1;
    pub const CANCEL: u32 = 2;
    pub const YIELD: u32 = 3;
    pub const DELAY: u32 = 4;
    pub const SUSPEND: u32 = 5;
    pub const RESUME: u32 = 6;
    pub const SET_PRIORITY: u32 = 7;
    pub const GET_ID: u32 = 8;
    pub const WFI: u32 = 9;
    pub const COUNT: u32 = 10;
    pub const TICKS: u32 = 11;
    pub const UPTIME: u32 = 12;

    pub const READ: u32 = 13;
    pub const WRITE: u32 = 14;
    pub const OPEN: u32 = 15;
    pub const CLOSE: u32 = 16;
    pub const LSEEK: u32 = 17;
    pub const FSTAT: u32 = 18;
    pub const STAT: u32 = 19;
    pub const UNLINK: u32 = 20;
    pub const ISATTY: u32 = 21;
    pub const FORK: u32 = 22;
    pub const EXECVE: u32 = 23;
    pub const WAITPID: u32 = 24;
    pub const KILL: u32 = 25;
    pub const GETPID: u32 = 26;
    pub const BRK: u32 = 27;
    pub const SBRK: u32 = 28;
    pub const LINK: u32 = 29;
    pub const CHDIR: u32 = 30;
    pub const GETCWD: u32 = 31;
    pub const MKDIR: u32 = 32;
    pub const RMDIR: u32 = 33;
    pub const RENAME: u32 = 34;
    pub const DUP: u32 = 35;
    pub const DUP2: u32 = 36;
    pub const PIPE2: u32 = 37;
    pub const GETTIMEOFDAY: u32 = 38;
    pub const NANOSLEEP: u32 = 39;
    pub const SIGACTION: u32 = 40;
    pub const SIGPROCMASK: u32 = 41;
    pub const MMAP: u32 = 42;
    pub const MUNMAP: u32 = 43;
}

const ENOSYS: isize = -38;
const EPERM: isize = -1;
const ESRCH: isize = -3;
const ENOMEM: isize = -12;
const EINVAL: isize = -22;

/// Four register-sized argument slots, one register-sized return slot
/// (spec §6: "argument and return slots are passed by register").
pub type Args = [isize; 4];

fn task_id(raw: isize) -> Option<TaskId> {
    u16::try_from(raw).ok().and_then(TaskId::new)
}

fn priority(raw: isize) -> Option<Priority> {
    usize::try_from(raw).ok().and_then(Priority::from_level)
}

fn from_result(r: Result<(), Error>) -> isize {
    match r {
        Ok(()) => 0,
        Err(e) => e.to_errno() as isize,
    }
}

/// Dispatches syscall `num` with `args` against `kernel`, returning a
/// POSIX-style value: non-negative on success, a negative errno on
/// failure. Out-of-range or unassigned numbers return `-ENOSYS` (spec
/// §6: "The dispatcher rejects out-of-range or empty entries with
/// `-ENOSYS`").
pub fn dispatch<P: Port>(kernel: &Kernel<P>, num: u32, args: Args) -> isize {
    match num {
        nr::SPAWN => EINVAL, // spawn needs a `TaskEntry` fn pointer, not a
        // register-sized argument; the architecture layer's trap stub
        // must resolve the requested entry point before calling
        // `Kernel::spawn` directly rather than through this dispatcher.
        nr::CANCEL => match task_id(args[0]) {
            Some(id) => from_result(kernel.cancel(id)),
            None => ESRCH,
        },
        nr::YIELD => {
            kernel.yield_now();
            0
        }
        nr::DELAY => {
            kernel.delay(args[0].max(0) as u32);
            0
        }
        nr::SUSPEND => match task_id(args[0]) {
            Some(id) => from_result(kernel.suspend(id)),
            None => ESRCH,
        },
        nr::RESUME => match task_id(args[0]) {
            Some(id) => from_result(kernel.resume(id)),
            None => ESRCH,
        },
        nr::SET_PRIORITY => match (task_id(args[0]), priority(args[1])) {
            (Some(id), Some(prio)) => from_result(kernel.set_priority(id, prio)),
            (Some(_), None) => EINVAL,
            (None, _) => ESRCH,
        },
        nr::GET_ID => kernel.current_id().map_or(ESRCH, |id| id.get() as isize),
        nr::WFI => {
            kernel.wfi();
            0
        }
        nr::COUNT => kernel.count() as isize,
        nr::TICKS | nr::UPTIME => kernel.ticks() as isize,

        // POSIX-shaped subset: this engine has no filesystem, process
        // model, or signal delivery, so every one of these is a stub
        // returning its canonical errno.
        nr::READ | nr::WRITE | nr::LSEEK | nr::FSTAT | nr::STAT | nr::UNLINK | nr::ISATTY
        | nr::LINK | nr::CHDIR | nr::GETCWD | nr::MKDIR | nr::RMDIR | nr::RENAME | nr::DUP
        | nr::DUP2 | nr::PIPE2 | nr::GETTIMEOFDAY | nr::NANOSLEEP | nr::SIGACTION
        | nr::SIGPROCMASK | nr::MMAP | nr::MUNMAP => ENOSYS,
        nr::OPEN | nr::CLOSE => ENOSYS,
        nr::FORK | nr::EXECVE | nr::WAITPID | nr::KILL => EPERM,
        nr::GETPID => kernel.current_id().map_or(ESRCH, |id| id.get() as isize),
        nr::BRK | nr::SBRK => ENOMEM,

        _ => ENOSYS,
    }
}
