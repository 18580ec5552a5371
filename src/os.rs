//! Backing-store gateway.
//!
//! The allocator draws memory from two kernel sources: the program break
//! (`sbrk`), which grows the contiguous data segment, and anonymous mappings
//! (`mmap`/`munmap`), which come and go independently of the break. This
//! module wraps both behind byte-level primitives and does not interpret
//! blocks.
//!
//! A kernel refusal on any primitive is fatal: the allocator's bookkeeping
//! cannot be restored after a partial failure, so the process is aborted
//! with a diagnostic naming the primitive.

use std::io;
use std::process;
use std::ptr;

use libc::{c_int, c_void, intptr_t, size_t};
use tracing::{debug, error};

/// Reads the current program break without moving it.
pub(crate) fn current_break() -> *mut u8 {
  unsafe { libc::sbrk(0) as *mut u8 }
}

/// Reads the system page size.
pub(crate) fn page_size() -> usize {
  unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize }
}

/// Moves the program break up by `increment` bytes and returns the former
/// break, i.e. the start of the new memory.
///
/// # Safety
///
/// The caller takes ownership of the `increment` bytes starting at the
/// returned address. The break must not be moved by anyone else for the
/// returned region to stay valid.
pub(crate) unsafe fn extend_break(increment: usize) -> *mut u8 {
  let former = unsafe { libc::sbrk(increment as intptr_t) };

  if former == usize::MAX as *mut c_void {
    die("sbrk");
  }

  debug!(increment, former = ?former, "extended program break");

  former as *mut u8
}

/// Maps `size` bytes of fresh anonymous memory, readable and writable.
///
/// # Safety
///
/// The caller owns the returned region and must release it with [`unmap`]
/// using the same size.
pub(crate) unsafe fn map_anonymous(size: usize) -> *mut u8 {
  const PROT: c_int = libc::PROT_READ | libc::PROT_WRITE;
  const FLAGS: c_int = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS;

  let address = unsafe { libc::mmap(ptr::null_mut(), size as size_t, PROT, FLAGS, -1, 0) };

  if address == libc::MAP_FAILED {
    die("mmap");
  }

  debug!(size, address = ?address, "mapped anonymous region");

  address as *mut u8
}

/// Returns the `size`-byte region at `address` to the kernel.
///
/// # Safety
///
/// `address` and `size` must describe a region previously obtained from
/// [`map_anonymous`]; the region must not be touched afterwards.
pub(crate) unsafe fn unmap(
  address: *mut u8,
  size: usize,
) {
  let ret = unsafe { libc::munmap(address as *mut c_void, size as size_t) };

  if ret == -1 {
    die("munmap");
  }

  debug!(size, address = ?address, "unmapped region");
}

fn die(primitive: &str) -> ! {
  let err = io::Error::last_os_error();
  error!(primitive, %err, "kernel memory primitive failed, aborting");
  process::abort();
}
