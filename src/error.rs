//! The kernel's flat error taxonomy (spec §7).
//!
//! Every public kernel operation returns [`Result<T>`]; none ever unwind.
//! Internal invariant violations (I1–I9) and "this cannot happen" states
//! call [`crate::port::Port::panic`] instead of returning an error — they are
//! programmer errors, not user errors, exactly as spec §7 specifies.
use core::fmt;

/// The engine's error code. Numeric values follow spec §7: `Ok` is `0`,
/// `Fail` is `-1`, and the rest occupy the negative range starting at
/// `-16383`, mirroring the C-style sentinel scheme the spec describes.
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    Fail = -1,
    NoTasks = -16383,
    KcbAlloc,
    TcbAlloc,
    StackAlloc,
    TaskCantRemove,
    TaskNotFound,
    TaskCantSuspend,
    TaskCantResume,
    TaskInvalidPrio,
    TaskInvalidEntry,
    TaskBusy,
    NotOwner,
    StackCheck,
    PipeAlloc,
    PipeDealloc,
    SemAlloc,
    SemDealloc,
    SemOperation,
    MqNotEmpty,
    Timeout,
    Unknown,
}

impl Error {
    /// Human-readable name, as spec §7 requires every error code to carry.
    pub const fn as_str(self) -> &'static str {
        match self {
            Error::Fail => "FAIL",
            Error::NoTasks => "NO_TASKS",
            Error::KcbAlloc => "KCB_ALLOC",
            Error::TcbAlloc => "TCB_ALLOC",
            Error::StackAlloc => "STACK_ALLOC",
            Error::TaskCantRemove => "TASK_CANT_REMOVE",
            Error::TaskNotFound => "TASK_NOT_FOUND",
            Error::TaskCantSuspend => "TASK_CANT_SUSPEND",
            Error::TaskCantResume => "TASK_CANT_RESUME",
            Error::TaskInvalidPrio => "TASK_INVALID_PRIO",
            Error::TaskInvalidEntry => "TASK_INVALID_ENTRY",
            Error::TaskBusy => "TASK_BUSY",
            Error::NotOwner => "NOT_OWNER",
            Error::StackCheck => "STACK_CHECK",
            Error::PipeAlloc => "PIPE_ALLOC",
            Error::PipeDealloc => "PIPE_DEALLOC",
            Error::SemAlloc => "SEM_ALLOC",
            Error::SemDealloc => "SEM_DEALLOC",
            Error::SemOperation => "SEM_OPERATION",
            Error::MqNotEmpty => "MQ_NOTEMPTY",
            Error::Timeout => "TIMEOUT",
            Error::Unknown => "UNKNOWN",
        }
    }

    /// Translate to a POSIX-style negative errno, for the syscall boundary
    /// (spec §6, "Syscalls translate kernel errors into POSIX errno
    /// negatives at the boundary").
    pub const fn to_errno(self) -> i32 {
        match self {
            Error::Fail | Error::Unknown => -1,
            Error::NoTasks | Error::KcbAlloc | Error::TcbAlloc | Error::StackAlloc => -12, // ENOMEM
            Error::TaskNotFound => -3,     // ESRCH
            Error::TaskBusy | Error::PipeAlloc | Error::PipeDealloc => -16, // EBUSY
            Error::NotOwner => -1,         // EPERM
            Error::Timeout => -110,        // ETIMEDOUT
            Error::MqNotEmpty => -39,      // ENOTEMPTY
            Error::SemOperation | Error::TaskInvalidPrio | Error::TaskInvalidEntry => -22, // EINVAL
            Error::TaskCantRemove | Error::TaskCantSuspend | Error::TaskCantResume => -1,
            Error::StackCheck => -75, // EOVERFLOW
            Error::SemAlloc | Error::SemDealloc => -12,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The result type returned by every public kernel operation.
pub type Result<T> = core::result::Result<T, Error>;
