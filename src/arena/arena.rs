//! Bump arena with deferred free and linear compaction.
//!
//! Allocations are appended at the end of the working set in order. Freeing
//! only queues an allocation; its bytes stay in place until [`Arena::compact`]
//! re-packs the live allocations from the base offset and drops the queued
//! ones. Between compactions the live set is therefore contiguous except for
//! holes left by queued allocations.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, trace};

use super::handle::{Handle, HandleInfo, HandleState};
use super::memory::{LinearMemory, MemoryIdentity, Region};
use crate::util::{Error, Result};

/// Allocation alignment and size granularity.
pub const ALIGNMENT: usize = 16;

static NEXT_ARENA_ID: AtomicU64 = AtomicU64::new(1);

#[inline]
fn align_up(len: usize) -> usize {
    len.div_ceil(ALIGNMENT) * ALIGNMENT
}

/// Result of a compaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompactionResult {
    /// Bytes between the new and the old end of the working set.
    pub bytes_reclaimed: usize,
    /// Bytes held by live allocations afterwards.
    pub bytes_used: usize,
    /// Live allocations that changed offset.
    pub allocations_moved: usize,
    /// Queued allocations that became `Freed`.
    pub allocations_freed: usize,
}

#[derive(Debug)]
struct Slot {
    stamp: u32,
    info: HandleInfo,
    /// Memory identity last observed through this allocation.
    seen: MemoryIdentity,
}

/// Allocator over the linear memory of one native module instance.
///
/// The arena owns the module so a native call and a byte view can never be
/// active at the same time: both need `&mut self`.
#[derive(Debug)]
pub struct Arena<M: LinearMemory> {
    id: u64,
    module: M,
    slots: Vec<Slot>,
    vacant: Vec<u32>,
    /// Live and queued slots in allocation order.
    order: Vec<u32>,
    base_offset: usize,
    end: usize,
    queued: usize,
}

impl<M: LinearMemory> Arena<M> {
    /// Create an arena starting at the module's heap base.
    pub fn new(module: M) -> Self {
        let base_offset = align_up(module.heap_base());
        let id = NEXT_ARENA_ID.fetch_add(1, Ordering::Relaxed);
        debug!("Arena::new: id={} base_offset={} memory={}", id, base_offset, module.len());
        Self {
            id,
            module,
            slots: Vec::new(),
            vacant: Vec::new(),
            order: Vec::new(),
            base_offset,
            end: base_offset,
            queued: 0,
        }
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn base_offset(&self) -> usize {
        self.base_offset
    }

    /// End of the working set.
    #[inline]
    pub fn end_offset(&self) -> usize {
        self.end
    }

    pub fn module(&self) -> &M {
        &self.module
    }

    /// Run `f` with exclusive access to the module, e.g. for a native call.
    pub fn with_module<R>(&mut self, f: impl FnOnce(&mut M) -> R) -> R {
        f(&mut self.module)
    }

    pub fn into_module(self) -> M {
        self.module
    }

    /// Reserve `len` bytes (rounded up to 16) at the end of the working set.
    pub fn allocate(&mut self, len: usize) -> Result<Handle> {
        let byte_length = align_up(len);
        let byte_offset = self.end;
        let new_end = byte_offset
            .checked_add(byte_length)
            .filter(|&end| end <= u32::MAX as usize)
            .ok_or(Error::OutOfMemory { requested: len })?;

        if new_end > self.module.len() {
            self.module.grow(new_end)?;
        }

        let info = HandleInfo {
            byte_offset,
            byte_length,
            requested_length: len,
            generation: 0,
            state: HandleState::Live,
        };
        let seen = self.module.identity();
        let slot = match self.vacant.pop() {
            Some(slot) => {
                let entry = &mut self.slots[slot as usize];
                entry.stamp = entry.stamp.wrapping_add(1);
                entry.info = info;
                entry.seen = seen;
                slot
            }
            None => {
                self.slots.push(Slot { stamp: 0, info, seen });
                (self.slots.len() - 1) as u32
            }
        };
        self.order.push(slot);
        self.end = new_end;

        trace!("Arena::allocate: {} bytes at {} (slot {})", byte_length, byte_offset, slot);
        Ok(Handle { arena: self.id, slot, stamp: self.slots[slot as usize].stamp })
    }

    /// The slot a handle refers to, or `None` if it was reclaimed.
    fn slot(&self, handle: Handle) -> Result<Option<&Slot>> {
        if handle.arena != self.id {
            return Err(Error::ForeignHandle);
        }
        Ok(self
            .slots
            .get(handle.slot as usize)
            .filter(|s| s.stamp == handle.stamp && s.info.state != HandleState::Freed))
    }

    /// Check liveness and record a memory relocation.
    fn touch(&mut self, handle: Handle) -> Result<HandleInfo> {
        match self.slot(handle)? {
            Some(slot) if slot.info.is_live() => {}
            _ => return Err(Error::UseAfterFree),
        }
        let identity = self.module.identity();
        let slot = &mut self.slots[handle.slot as usize];
        if slot.seen != identity {
            slot.seen = identity;
            slot.info.generation = slot.info.generation.wrapping_add(1);
            trace!("Arena::resolve: memory moved, slot {} generation {}", handle.slot, slot.info.generation);
        }
        Ok(slot.info)
    }

    /// Bytes of a live allocation.
    pub fn resolve(&mut self, handle: Handle) -> Result<&[u8]> {
        let info = self.touch(handle)?;
        Ok(&self.module.data()[info.byte_offset..info.byte_offset + info.requested_length])
    }

    pub fn resolve_mut(&mut self, handle: Handle) -> Result<&mut [u8]> {
        let info = self.touch(handle)?;
        Ok(&mut self.module.data_mut()[info.byte_offset..info.byte_offset + info.requested_length])
    }

    /// Offset and requested length of a live allocation, for a native call.
    pub fn region(&mut self, handle: Handle) -> Result<Region> {
        let info = self.touch(handle)?;
        Ok(Region::new(info.byte_offset as u32, info.requested_length as u32))
    }

    /// Copy `bytes` to the start of a live allocation.
    pub fn write(&mut self, handle: Handle, bytes: &[u8]) -> Result<()> {
        let view = self.resolve_mut(handle)?;
        if bytes.len() > view.len() {
            return Err(Error::RegionOverflow { len: bytes.len(), capacity: view.len() });
        }
        view[..bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Copy the first `len` bytes of a live allocation.
    pub fn read(&mut self, handle: Handle, len: usize) -> Result<Vec<u8>> {
        let view = self.resolve(handle)?;
        let bytes = view
            .get(..len)
            .ok_or(Error::RegionOverflow { len, capacity: view.len() })?;
        Ok(bytes.to_vec())
    }

    /// Release an allocation at the next compaction.
    pub fn queue_free(&mut self, handle: Handle) -> Result<()> {
        match self.slot(handle)? {
            Some(slot) if slot.info.is_live() => {}
            _ => return Err(Error::DoubleFree),
        }
        self.slots[handle.slot as usize].info.state = HandleState::QueuedForFree;
        self.queued += 1;
        trace!("Arena::queue_free: slot {}", handle.slot);
        Ok(())
    }

    /// Re-pack live allocations from the base offset and reclaim queued ones.
    #[tracing::instrument(skip_all, fields(arena = self.id))]
    pub fn compact(&mut self) -> Result<CompactionResult> {
        let mut result = CompactionResult::default();
        let mut cursor = self.base_offset;
        let order = std::mem::take(&mut self.order);
        let mut kept = Vec::with_capacity(order.len() - self.queued.min(order.len()));

        for index in order {
            let slot = &mut self.slots[index as usize];
            match slot.info.state {
                HandleState::Live => {
                    let info = &mut slot.info;
                    if info.byte_offset != cursor {
                        // Allocations only ever move toward the base, in order.
                        self.module
                            .data_mut()
                            .copy_within(info.byte_offset..info.end(), cursor);
                        info.byte_offset = cursor;
                        info.generation = info.generation.wrapping_add(1);
                        result.allocations_moved += 1;
                    }
                    cursor += info.byte_length;
                    result.bytes_used += info.byte_length;
                    kept.push(index);
                }
                HandleState::QueuedForFree => {
                    slot.info.state = HandleState::Freed;
                    result.allocations_freed += 1;
                    self.vacant.push(index);
                }
                HandleState::Freed => {}
            }
        }

        result.bytes_reclaimed = self.end - cursor;
        self.order = kept;
        self.end = cursor;
        self.queued = 0;
        self.module.release(cursor);

        debug!(
            "Arena::compact: freed={} moved={} reclaimed={} used={}",
            result.allocations_freed, result.allocations_moved, result.bytes_reclaimed, result.bytes_used
        );
        Ok(result)
    }

    /// Current state of a handle issued by this arena.
    pub fn state(&self, handle: Handle) -> Result<HandleState> {
        Ok(self.slot(handle)?.map_or(HandleState::Freed, |s| s.info.state))
    }

    /// Record of a live or queued allocation.
    pub fn info(&self, handle: Handle) -> Result<HandleInfo> {
        self.slot(handle)?.map(|s| s.info).ok_or(Error::UseAfterFree)
    }

    /// Live and queued allocations in allocation order.
    pub fn allocations(&self) -> impl Iterator<Item = HandleInfo> + '_ {
        self.order.iter().map(move |&i| self.slots[i as usize].info)
    }

    pub fn live_count(&self) -> usize {
        self.order.len() - self.queued
    }

    pub fn queued_count(&self) -> usize {
        self.queued
    }

    /// Bytes reserved by live allocations.
    pub fn used_bytes(&self) -> usize {
        self.allocations().filter(HandleInfo::is_live).map(|i| i.byte_length).sum()
    }
}
