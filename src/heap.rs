//! Heap allocator over the program break and anonymous mappings.
//!
//! ## Overview
//!
//! [`HeapAllocator`] serves the four classical allocation operations from
//! two kernel backing stores:
//!
//! ```text
//!                         ┌───────────────────────┐
//!   allocate ──────────►  │     policy layer      │
//!   allocate_zeroed ───►  │  (threshold per op)   │
//!   reallocate ────────►  └──────────┬────────────┘
//!   deallocate                       │
//!                     small ◄────────┴────────► large
//!                       │                         │
//!            ┌──────────▼─────────┐    ┌──────────▼─────────┐
//!            │   break segment    │    │ anonymous mappings │
//!            │  (block registry,  │    │  (one region per   │
//!            │   recycled forever)│    │   block, unmapped  │
//!            └────────────────────┘    │   on free)         │
//!                                      └────────────────────┘
//! ```
//!
//! Small blocks live on the break segment and are threaded on the
//! [registry](crate::registry::Registry), where they are recycled by
//! best-fit search, split when oversized, and merged with free neighbors.
//! Large blocks get a private anonymous mapping and are returned to the
//! kernel the moment they are freed.
//!
//! The switch point between the two stores is [`MMAP_THRESHOLD`] for plain
//! allocation and the system page size for zero-initialized allocation.
//! The page-size bias toward mapping mirrors the libc convention: mapped
//! pages arrive zeroed, so zero-filled requests go there sooner.
//!
//! ## First-time preallocation
//!
//! The first allocation destined for the break segment extends the break by
//! a whole 128 KiB arena and installs it as a single free block. Later
//! small allocations are carved out of the arena without touching the
//! kernel:
//!
//! ```text
//!   break before                               break after
//!        │                                          │
//!        ▼                                          ▼
//!        ┌──────────────────────────────────────────┐
//!        │ Free block spanning the whole 128 KiB    │
//!        └──────────────────────────────────────────┘
//! ```
//!
//! ## Thread safety
//!
//! The allocator models a single logical mutator. The handle holds raw
//! pointers and is therefore neither `Send` nor `Sync`; a multi-threaded
//! host must wrap every operation in one external mutex.

use std::ptr;

use tracing::{debug, trace};

use crate::block::{Block, BlockStatus, HEADER_SIZE};
use crate::os;
use crate::registry::{self, Registry};

/// Aligned block sizes at or above this many bytes are served by anonymous
/// mappings instead of the break segment. It doubles as the size of the
/// arena preallocated on first use of the break segment.
pub const MMAP_THRESHOLD: usize = 128 * 1024;

/// A heap allocator drawing from the program break and from anonymous
/// mappings.
///
/// All four operations hand out and take back *payload* pointers; the block
/// header sits immediately before the payload and is never exposed.
pub struct HeapAllocator {
  /// Address-ordered list of the blocks carved out of the break segment.
  registry: Registry,
}

impl HeapAllocator {
  /// Creates an allocator that has not touched the kernel yet. The first
  /// small allocation will preallocate the heap arena.
  pub const fn new() -> Self {
    Self { registry: Registry::new() }
  }

  /// Allocates `size` bytes and returns a payload pointer aligned to the
  /// quantum, or null when `size` is zero.
  ///
  /// The block is placed in this order:
  ///
  /// 1. best-fitting free registry block, split when oversized;
  /// 2. the free registry tail, grown in place by extending the break by
  ///    the missing bytes;
  /// 3. a fresh block from the kernel: break-extended and appended to the
  ///    registry below [`MMAP_THRESHOLD`], an anonymous mapping of its own
  ///    otherwise.
  ///
  /// # Safety
  ///
  /// The returned memory is uninitialized. The caller must not use more
  /// than `size` bytes and must release the pointer through
  /// [`deallocate`](HeapAllocator::deallocate) or
  /// [`reallocate`](HeapAllocator::reallocate) of this allocator. The
  /// program break must not be moved by anyone else while the allocator is
  /// in use.
  pub unsafe fn allocate(
    &mut self,
    size: usize,
  ) -> *mut u8 {
    if size == 0 {
      return ptr::null_mut();
    }

    let block_size = HEADER_SIZE + crate::align!(size);
    trace!(size, block_size, "allocate");

    unsafe { self.allocate_block(block_size, MMAP_THRESHOLD) }
  }

  /// Allocates `count * size` bytes, zeroes them, and returns a payload
  /// pointer. Returns null when either factor is zero or the product
  /// overflows.
  ///
  /// Placement follows [`allocate`](HeapAllocator::allocate), except that
  /// the break-vs-mapping switch point is the system page size.
  ///
  /// # Safety
  ///
  /// Same contract as [`allocate`](HeapAllocator::allocate).
  pub unsafe fn allocate_zeroed(
    &mut self,
    count: usize,
    size: usize,
  ) -> *mut u8 {
    if count == 0 || size == 0 {
      return ptr::null_mut();
    }
    let Some(total) = count.checked_mul(size) else {
      return ptr::null_mut();
    };

    let block_size = HEADER_SIZE + crate::align!(total);
    trace!(count, size, block_size, "allocate_zeroed");

    unsafe {
      let address = self.allocate_block(block_size, os::page_size());
      ptr::write_bytes(address, 0, total);
      address
    }
  }

  /// Releases the allocation behind `address`. Null is a no-op.
  ///
  /// Registry blocks are only marked free; merging with neighbors is
  /// deferred to the coalescing pass that opens the next allocation.
  /// Mapped blocks are returned to the kernel immediately.
  ///
  /// # Safety
  ///
  /// `address` must be null or a payload pointer obtained from this
  /// allocator and not released since.
  pub unsafe fn deallocate(
    &mut self,
    address: *mut u8,
  ) {
    if address.is_null() {
      return;
    }

    unsafe {
      let block = Block::from_payload(address);
      match (*block).status {
        BlockStatus::Alloc => (*block).status = BlockStatus::Free,
        BlockStatus::Mapped => os::unmap(block as *mut u8, (*block).size),
        BlockStatus::Free => trace!(?address, "deallocate of a free block ignored"),
      }
    }
  }

  /// Resizes the allocation behind `address` to `size` bytes, preserving
  /// the payload up to the smaller of the two capacities.
  ///
  /// The operation walks a small state machine:
  ///
  /// ```text
  ///   address null ──────────────► allocate(size)
  ///   size zero ─────────────────► deallocate(address), null
  ///   block already free ────────► null (misuse, nothing touched)
  ///   aligned size unchanged ────► address
  ///   mapped block ──────────────► move to a fresh allocation
  ///   registry block, shrinking ─► split in place, keep address
  ///   registry block, growing ──┬► absorb free successors, keep address
  ///                             └► else move to a fresh allocation
  /// ```
  ///
  /// A move copies the payload, frees the old block (unmapping it when it
  /// was mapped), and returns the new payload pointer.
  ///
  /// # Safety
  ///
  /// `address` must be null or a payload pointer obtained from this
  /// allocator; after a move the old pointer must not be used again.
  pub unsafe fn reallocate(
    &mut self,
    address: *mut u8,
    size: usize,
  ) -> *mut u8 {
    unsafe {
      if address.is_null() {
        return self.allocate(size);
      }
      if size == 0 {
        self.deallocate(address);
        return ptr::null_mut();
      }

      let block = Block::from_payload(address);
      let block_size = HEADER_SIZE + crate::align!(size);
      trace!(?address, size, block_size, "reallocate");

      if (*block).status == BlockStatus::Free {
        return ptr::null_mut();
      }
      if (*block).size == block_size {
        return address;
      }
      if (*block).status == BlockStatus::Mapped {
        return self.relocate(block, size);
      }

      // Registry block that already holds enough: shrink in place.
      if (*block).size >= block_size {
        registry::split_excess(block, block_size);
        return address;
      }

      // Grow in place over the free space behind the block.
      self.registry.coalesce();
      registry::absorb_free_successors(block, block_size);
      if (*block).size >= block_size {
        registry::split_excess(block, block_size);
        return address;
      }

      self.relocate(block, size)
    }
  }

  /// Places a block of `block_size` total bytes and returns its payload.
  ///
  /// `threshold` decides where fresh kernel memory comes from; reuse of
  /// registry blocks is tried first regardless of it.
  unsafe fn allocate_block(
    &mut self,
    block_size: usize,
    threshold: usize,
  ) -> *mut u8 {
    unsafe {
      if self.registry.is_empty() && block_size < threshold {
        self.preallocate_arena();
      }

      let tail = self.registry.coalesce();

      let best = self.registry.best_fit(block_size);
      if !best.is_null() {
        registry::split_excess(best, block_size);
        (*best).status = BlockStatus::Alloc;
        return Block::payload(best);
      }

      if !tail.is_null() && (*tail).status == BlockStatus::Free {
        // The free tail ends at the break; extend the break by exactly the
        // missing bytes and let the tail swallow them.
        let deficit = block_size - (*tail).size;
        let former = os::extend_break(deficit);
        debug_assert_eq!(former as usize, tail as usize + (*tail).size);

        (*tail).size += deficit;
        registry::split_excess(tail, block_size);
        (*tail).status = BlockStatus::Alloc;
        return Block::payload(tail);
      }

      if block_size < threshold {
        let block = os::extend_break(block_size) as *mut Block;
        block.write(Block {
          size: block_size,
          status: BlockStatus::Alloc,
          next: ptr::null_mut(),
        });

        debug_assert!(!tail.is_null());
        (*tail).next = block;

        Block::payload(block)
      } else {
        let block = os::map_anonymous(block_size) as *mut Block;
        block.write(Block {
          size: block_size,
          status: BlockStatus::Mapped,
          next: ptr::null_mut(),
        });

        Block::payload(block)
      }
    }
  }

  /// Extends the break by the whole arena and installs it as the single
  /// free block anchoring the registry.
  unsafe fn preallocate_arena(&mut self) {
    unsafe {
      // sbrk gives no alignment guarantee; pad the break up to the quantum
      // so every header and payload lands aligned.
      let brk = os::current_break() as usize;
      let padding = crate::align!(brk) - brk;
      if padding > 0 {
        os::extend_break(padding);
      }

      let block = os::extend_break(MMAP_THRESHOLD) as *mut Block;
      block.write(Block {
        size: MMAP_THRESHOLD,
        status: BlockStatus::Free,
        next: ptr::null_mut(),
      });

      self.registry.install(block);
      debug!(arena = MMAP_THRESHOLD, "preallocated heap arena");
    }
  }

  /// Moves the allocation in `block` into a fresh block of `size` bytes,
  /// copying as much payload as both ends can hold, and frees the old
  /// block.
  unsafe fn relocate(
    &mut self,
    block: *mut Block,
    size: usize,
  ) -> *mut u8 {
    unsafe {
      let address = Block::payload(block);

      let new_address = self.allocate(size);
      if new_address.is_null() {
        return ptr::null_mut();
      }

      let new_block = Block::from_payload(new_address);
      let preserved = (*block).size.min((*new_block).size) - HEADER_SIZE;
      ptr::copy_nonoverlapping(address, new_address, preserved);

      self.deallocate(address);

      new_address
    }
  }
}
