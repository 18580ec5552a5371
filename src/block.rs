//! Block metadata.
//!
//! Every allocation, whether carved out of the break segment or mapped on
//! its own, is prefixed in memory by a [`Block`] header. The payload handed
//! to the caller starts [`HEADER_SIZE`] bytes past the header address:
//!
//! ```text
//!   ┌─────────────────────┬──────────────────────────────┐
//!   │    Block header     │           Payload            │
//!   │ size | status | next│     (size - HEADER_SIZE)     │
//!   └─────────────────────┴──────────────────────────────┘
//!   ▲                     ▲
//!   │                     └── pointer returned to the user
//!   └── block address
//! ```

use std::mem;

use static_assertions::const_assert;

use crate::align::ALIGNMENT;

/// Where a block's memory came from and whether it is in use.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum BlockStatus {
  /// On the registry and available for reuse.
  Free,
  /// On the registry and owned by the caller.
  Alloc,
  /// An anonymous mapping of its own. Never on the registry; the header is
  /// reachable only through the caller's payload pointer.
  Mapped,
}

/// In-band metadata carried in front of every payload.
pub(crate) struct Block {
  /// Total block size in bytes, header included. Always a multiple of the
  /// alignment quantum.
  pub size: usize,
  pub status: BlockStatus,
  /// Next block on the registry, null for the tail. Meaningless for mapped
  /// blocks.
  pub next: *mut Block,
}

/// Header footprint rounded up to the alignment quantum. The payload starts
/// this many bytes past the block address.
pub(crate) const HEADER_SIZE: usize = crate::align!(mem::size_of::<Block>());

/// Smallest block worth materializing: a header plus one quantum of payload.
/// Splits that would leave less than this are not performed.
pub(crate) const MIN_BLOCK_SIZE: usize = HEADER_SIZE + ALIGNMENT;

const_assert!(HEADER_SIZE % ALIGNMENT == 0);
const_assert!(mem::align_of::<Block>() <= ALIGNMENT);

impl Block {
  /// Payload address for the given block.
  ///
  /// # Safety
  ///
  /// `block` must point at a live block header.
  pub(crate) unsafe fn payload(block: *mut Block) -> *mut u8 {
    unsafe { (block as *mut u8).add(HEADER_SIZE) }
  }

  /// Recovers the block header from a payload pointer previously produced
  /// by [`Block::payload`].
  ///
  /// # Safety
  ///
  /// `address` must be a payload pointer returned by this allocator.
  pub(crate) unsafe fn from_payload(address: *mut u8) -> *mut Block {
    unsafe { address.sub(HEADER_SIZE) as *mut Block }
  }
}
