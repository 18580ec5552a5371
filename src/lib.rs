//! # rmalloc - A Heap Allocator over brk and mmap
//!
//! This crate implements the four classical allocation operations
//! (allocate, free, zero-initialized allocate, and reallocate) on top of
//! the two memory sources a Unix process gets from its kernel: the program
//! break (`sbrk`) and anonymous mappings (`mmap`).
//!
//! ## Overview
//!
//! Small and medium blocks are carved out of the break segment and recycled
//! for the lifetime of the process; large blocks get a private mapping that
//! is returned to the kernel as soon as it is freed:
//!
//! ```text
//!   Program Memory Layout:
//!
//!   High Address ┌─────────────────────┐
//!                │       Stack         │ ↓ grows down
//!                │         │           │
//!                │         ▼           │
//!                │                     │
//!                │  [anonymous maps]   │ ← large blocks, one region each
//!                │                     │
//!                │         ▲           │
//!                │         │           │
//!                │       Heap          │ ↑ grows up (sbrk)
//!                ├─────────────────────┤ ← Program Break
//!                │   Uninitialized     │
//!                │       Data          │
//!                ├─────────────────────┤
//!                │   Initialized       │
//!                │       Data          │
//!                ├─────────────────────┤
//!                │       Text          │
//!   Low Address  └─────────────────────┘
//! ```
//!
//! Every allocation is prefixed by an in-band header:
//!
//! ```text
//!   Single Allocation:
//!   ┌───────────────────────┬────────────────────────────────┐
//!   │    Block Header       │         Payload                │
//!   │  ┌─────────────────┐  │                                │
//!   │  │ size: total     │  │  ┌──────────────────────────┐  │
//!   │  │ status: F/A/M   │  │  │   8-byte aligned bytes   │  │
//!   │  │ next: null/ptr  │  │  │                          │  │
//!   │  └─────────────────┘  │  └──────────────────────────┘  │
//!   └───────────────────────┴────────────────────────────────┘
//!                           ▲
//!                           └── Pointer returned to the user
//! ```
//!
//! Break-segment blocks are threaded on an address-ordered registry and
//! reused by best-fit search with splitting and coalescing; the first such
//! allocation preallocates a 128 KiB arena so that small requests stop
//! bothering the kernel at all.
//!
//! ## Crate Structure
//!
//! ```text
//!   rmalloc
//!   ├── align      - Alignment quantum and the align! macro
//!   ├── block      - Block header and pointer conversions (internal)
//!   ├── os         - Backing-store gateway: sbrk/mmap/munmap (internal)
//!   ├── registry   - Address-ordered block list (internal)
//!   └── heap       - HeapAllocator: the four public operations
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rmalloc::HeapAllocator;
//!
//! fn main() {
//!     let mut heap = HeapAllocator::new();
//!
//!     unsafe {
//!         let ptr = heap.allocate(64) as *mut u64;
//!         *ptr = 42;
//!         println!("Value: {}", *ptr);
//!
//!         let ptr = heap.reallocate(ptr as *mut u8, 128);
//!         heap.deallocate(ptr);
//!     }
//! }
//! ```
//!
//! ## Features
//!
//! - **Dual backing stores**: break segment below 128 KiB, anonymous
//!   mappings above (page size is the switch point for zeroed allocation)
//! - **Space reuse**: best-fit search, block splitting, coalescing of free
//!   neighbors, in-place growth of the heap tail
//! - **Strict alignment**: every payload pointer is 8-byte aligned
//! - **Structured logging**: `tracing` events for every kernel transaction
//!
//! ## Limitations
//!
//! - **Single-threaded only**: the handle is `!Send`/`!Sync`; wrap it in a
//!   mutex for multi-threaded hosts
//! - **Break memory is never returned**: the break moves up only; freed
//!   break-segment blocks are recycled, not released
//! - **Unix-only**: requires `libc` with `sbrk` and `mmap`
//!
//! ## Safety
//!
//! This crate manages raw memory; allocation, deallocation, and every use
//! of the returned pointers require `unsafe`. A kernel refusal on any
//! memory primitive aborts the process: the allocator's bookkeeping cannot
//! be trusted past a partial failure.

pub mod align;
mod block;
mod heap;
mod os;
mod registry;

pub use align::ALIGNMENT;
pub use heap::{HeapAllocator, MMAP_THRESHOLD};
