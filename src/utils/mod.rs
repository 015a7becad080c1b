//! Small, dependency-light building blocks shared by the rest of the crate.
//!
//! **This module is exempt from any API stability guarantee**, mirroring
//! `r3_kernel::utils`'s own disclaimer — it exists to serve the public
//! modules, not as a standalone facility.

pub(crate) mod prio_bitmap;
pub(crate) mod ring;

pub use prio_bitmap::ReadyBitmap;
