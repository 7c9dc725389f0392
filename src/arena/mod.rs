//! Memory arena over a native module's linear memory.
//!
//! - [`LinearMemory`] - The growable byte array a module computes in
//! - [`Arena`] - Allocation, deferred free and compaction
//! - [`Handle`] - Stamped key to one allocation

#[allow(clippy::module_inception)]
mod arena;
mod handle;
mod memory;

pub use arena::{Arena, CompactionResult, ALIGNMENT};
pub use handle::{Handle, HandleInfo, HandleState};
pub use memory::{HostMemory, LinearMemory, MemoryIdentity, Region, PAGE_SIZE};
