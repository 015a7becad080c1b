//! The one place this crate touches the (external) heap allocator directly
//! (spec §1 lists the allocator itself as an out-of-scope collaborator).
//!
//! Task stacks are sized per [`crate::task::spawn`] call, so unlike the
//! fixed-capacity task control block pool (§4.1, "TCB_ALLOC" means the pool
//! is full), a stack genuinely needs a runtime allocation — and spec
//! explicitly wants that allocation's failure reported as `STACK_ALLOC`
//! rather than aborting, so we go through the raw `GlobalAlloc` entry points
//! instead of `Box`/`Vec` (which abort on allocation failure on stable Rust).
extern crate alloc;
use alloc::alloc::{alloc, dealloc, Layout};

use crate::error::{Error, Result};

/// Allocate `size` bytes aligned to `align` from the global allocator.
/// Returns `Err(Error::StackAlloc)` rather than aborting on exhaustion.
pub(crate) fn alloc_stack(size: usize, align: usize) -> Result<*mut u8> {
    let layout = Layout::from_size_align(size, align).map_err(|_| Error::StackAlloc)?;
    // Safety: `layout` has non-zero size (callers enforce `size >=
    // MIN_TASK_STACK_SIZE`).
    let ptr = unsafe { alloc(layout) };
    if ptr.is_null() {
        Err(Error::StackAlloc)
    } else {
        Ok(ptr)
    }
}

/// Free a stack previously returned by [`alloc_stack`] with the same `size`
/// and `align`.
///
/// # Safety
/// `ptr` must have been returned by [`alloc_stack`] with identical `size`
/// and `align`, and must not be used afterwards.
pub(crate) unsafe fn dealloc_stack(ptr: *mut u8, size: usize, align: usize) {
    if let Ok(layout) = Layout::from_size_align(size, align) {
        // Safety: forwarded from the caller's obligations.
        unsafe { dealloc(ptr, layout) };
    }
}
