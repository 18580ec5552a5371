use std::ptr;

use libc::sbrk;
use rmalloc::{HeapAllocator, MMAP_THRESHOLD};

/// Prints the current program break using `sbrk(0)`.
/// The program break is the upper boundary of the heap managed via brk/sbrk.
unsafe fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break (sbrk(0)) = {:?}",
    label,
    std::process::id(),
    unsafe { sbrk(0) },
  );
}

fn main() {
  // Show the allocator's kernel transactions (break extensions, mappings)
  // as they happen.
  tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

  let mut heap = HeapAllocator::new();

  unsafe {
    print_program_break("start");

    // --------------------------------------------------------------------
    // 1) First small allocation. Watch the break jump by the whole 128 KiB
    //    arena, not by the request size.
    // --------------------------------------------------------------------
    let a = heap.allocate(100);
    println!("\n[1] allocate(100) = {:?}", a);
    print_program_break("after arena preallocation");

    // --------------------------------------------------------------------
    // 2) A second allocation is carved out of the arena: the break does
    //    not move again.
    // --------------------------------------------------------------------
    let b = heap.allocate(200) as *mut u64;
    b.write(0x1122_3344_5566_7788);
    println!("\n[2] allocate(200) = {:?}, wrote 0x{:X}", b, b.read());
    print_program_break("after second allocation");

    // --------------------------------------------------------------------
    // 3) Free the first block and allocate something smaller: best-fit
    //    hands the freed slot back.
    // --------------------------------------------------------------------
    heap.deallocate(a);
    let c = heap.allocate(80);
    println!(
      "\n[3] allocate(80) after free = {:?} ({})",
      c,
      if c == a {
        "reused the freed slot"
      } else {
        "picked a different slot"
      }
    );

    // --------------------------------------------------------------------
    // 4) Zero-initialized allocation below the page size, served from the
    //    arena.
    // --------------------------------------------------------------------
    let zeroed = heap.allocate_zeroed(1000, 1);
    let mut all_zero = true;
    for i in 0..1000 {
      all_zero &= zeroed.add(i).read() == 0;
    }
    println!("\n[4] allocate_zeroed(1000, 1) = {:?}, all zero: {}", zeroed, all_zero);

    // --------------------------------------------------------------------
    // 5) Free the neighbor, then grow the 80-byte block: the freed block
    //    behind it is absorbed and the pointer stays put.
    // --------------------------------------------------------------------
    heap.deallocate(b as *mut u8);
    ptr::write_bytes(c, 0xAB, 80);
    let grown = heap.reallocate(c, 150);
    println!(
      "\n[5] reallocate(c, 150) = {:?} ({}), first byte still 0x{:X}",
      grown,
      if grown == c { "grew in place" } else { "moved" },
      grown.read(),
    );

    // --------------------------------------------------------------------
    // 6) A block past the mapping threshold: served by mmap, the break
    //    stays put, and free returns the region to the kernel immediately.
    // --------------------------------------------------------------------
    print_program_break("before large allocation");
    let large = heap.allocate(MMAP_THRESHOLD * 2);
    println!("\n[6] allocate({}) = {:?}", MMAP_THRESHOLD * 2, large);
    print_program_break("after large allocation");
    heap.deallocate(large);
    println!("[6] large block unmapped");

    // --------------------------------------------------------------------
    // 7) End of demo. Break memory stays with the process; the OS reclaims
    //    everything on exit.
    // --------------------------------------------------------------------
    heap.deallocate(grown);
    heap.deallocate(zeroed);
    println!("\n[7] End of demo.");
  }
}
