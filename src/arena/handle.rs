//! Handles to arena allocations.

/// Lifecycle of an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleState {
    /// Readable and writable.
    Live,
    /// Released by its owner; bytes stay in place until the next compaction.
    QueuedForFree,
    /// Reclaimed by compaction. Terminal.
    Freed,
}

/// Key to an allocation in one arena.
///
/// Handles are plain keys: the arena keeps the record. A slot reused after
/// compaction gets a new stamp, so an old key to it reports `Freed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    pub(crate) arena: u64,
    pub(crate) slot: u32,
    pub(crate) stamp: u32,
}

impl Handle {
    /// Identifier of the arena that issued this handle.
    pub fn arena_id(&self) -> u64 {
        self.arena
    }
}

/// The arena's record of an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleInfo {
    /// Offset within linear memory.
    pub byte_offset: usize,
    /// Reserved length, a multiple of 16.
    pub byte_length: usize,
    /// Length asked for by the caller.
    pub requested_length: usize,
    /// Bumped whenever the bytes move or the memory under them relocates.
    pub generation: u32,
    pub state: HandleState,
}

impl HandleInfo {
    #[inline]
    pub fn end(&self) -> usize {
        self.byte_offset + self.byte_length
    }

    #[inline]
    pub fn is_live(&self) -> bool {
        self.state == HandleState::Live
    }
}
