//! Linear memory abstraction.
//!
//! A native codec module sees one contiguous, growable byte array and
//! addresses it with 32-bit offsets. Growing may move the array, so the
//! arena never keeps pointers into it across calls.

use tracing::debug;

use crate::util::{Error, Result};

/// Size of one linear memory page.
pub const PAGE_SIZE: usize = 64 * 1024;

/// A region of linear memory passed across the native boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Region {
    /// Offset within linear memory.
    pub offset: u32,
    /// Length in bytes.
    pub len: u32,
}

impl Region {
    pub const fn new(offset: u32, len: u32) -> Self {
        Self { offset, len }
    }

    /// End offset (offset + len).
    pub const fn end(&self) -> u32 {
        self.offset + self.len
    }

    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset as usize..self.end() as usize
    }
}

/// Identity of the backing storage: base address and length.
///
/// Any change means views taken earlier are stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryIdentity {
    pub base: usize,
    pub len: usize,
}

/// Growable byte memory shared with a native module.
pub trait LinearMemory {
    fn data(&self) -> &[u8];

    fn data_mut(&mut self) -> &mut [u8];

    /// Grow until at least `min_len` bytes are addressable.
    ///
    /// Returns `OutOfMemory` when the memory cannot grow that far.
    fn grow(&mut self, min_len: usize) -> Result<()>;

    /// First offset the arena may hand out. Bytes below belong to the module.
    fn heap_base(&self) -> usize;

    /// The arena no longer uses bytes at or after `end`.
    ///
    /// Linear memories cannot shrink, so the default does nothing.
    fn release(&mut self, _end: usize) {}

    #[inline]
    fn len(&self) -> usize {
        self.data().len()
    }

    #[inline]
    fn is_empty(&self) -> bool {
        self.data().is_empty()
    }

    fn identity(&self) -> MemoryIdentity {
        let data = self.data();
        MemoryIdentity { base: data.as_ptr() as usize, len: data.len() }
    }
}

/// Host-resident linear memory.
///
/// Growth reallocates into a fresh buffer, so every grow relocates the
/// memory the same way a wasm `memory.grow` is allowed to.
#[derive(Debug)]
pub struct HostMemory {
    bytes: Vec<u8>,
    heap_base: usize,
    max_pages: usize,
}

impl HostMemory {
    /// `initial_pages` pages, the first `heap_base` bytes reserved.
    pub fn new(initial_pages: usize, heap_base: usize, max_pages: usize) -> Self {
        Self {
            bytes: vec![0; initial_pages * PAGE_SIZE],
            heap_base,
            max_pages: max_pages.max(initial_pages),
        }
    }

    pub fn pages(&self) -> usize {
        self.bytes.len() / PAGE_SIZE
    }

    pub fn max_pages(&self) -> usize {
        self.max_pages
    }
}

impl LinearMemory for HostMemory {
    fn data(&self) -> &[u8] {
        &self.bytes
    }

    fn data_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    fn grow(&mut self, min_len: usize) -> Result<()> {
        if min_len <= self.bytes.len() {
            return Ok(());
        }
        let pages = min_len.div_ceil(PAGE_SIZE);
        if pages > self.max_pages {
            return Err(Error::OutOfMemory { requested: min_len });
        }

        let mut grown = vec![0u8; pages * PAGE_SIZE];
        grown[..self.bytes.len()].copy_from_slice(&self.bytes);
        debug!("HostMemory::grow: {} -> {} pages", self.pages(), pages);
        self.bytes = grown;
        Ok(())
    }

    fn heap_base(&self) -> usize {
        self.heap_base
    }
}
