use std::{io::Read, ptr};

use brkalloc::{Config, Heap, Sbrk, Stdout};
use libc::sbrk;

/// Waits until the user presses ENTER.
/// Useful to inspect the process with `pmap` or `gdb` between steps and
/// watch the program break move.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

/// Prints the current program break using `sbrk(0)`.
unsafe fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break (sbrk(0)) = {:?}",
    label,
    std::process::id(),
    unsafe { sbrk(0) },
  );
}

fn print_blocks(heap: &Heap<Sbrk, Stdout>) {
  for block in heap.blocks() {
    println!(
      "    header = {:#x}, data = {:#x}, size = {:>6}, free = {}",
      block.header, block.data, block.size, block.is_free
    );
  }
  println!("    slack = {} bytes", heap.slack());
}

fn main() {
  // Every operation prints its MALLOC: line; set DEBUG_MALLOC to get the
  // same from the C entry points.
  let mut heap = Heap::with_config(Sbrk, Stdout, Config::from_env().with_debug(true));

  unsafe {
    print_program_break("start");
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 1) Allocate a u32. The first request extends the break by a whole
    //    64 KiB chunk.
    // --------------------------------------------------------------------
    println!("\n[1] Allocate u32");
    let first = heap.allocate(4).unwrap().as_ptr();
    first.cast::<u32>().write(0xDEADBEEF);
    println!("[1] Value written = 0x{:X}", first.cast::<u32>().read());
    print_program_break("after first alloc");
    print_blocks(&heap);

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 2) Allocate 12 bytes. Served from the same chunk: the break does not
    //    move.
    // --------------------------------------------------------------------
    println!("\n[2] Allocate [u8; 12]");
    let second = heap.allocate(12).unwrap().as_ptr();
    ptr::write_bytes(second, 0xAB, 12);
    print_program_break("after second alloc");
    print_blocks(&heap);

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 3) Release the first block and ask for 2 bytes: first-fit hands the
    //    same block back, still recorded with its original size.
    // --------------------------------------------------------------------
    println!("\n[3] Release first block, then allocate [u8; 2]");
    heap.release(first);
    let third = heap.allocate(2).unwrap().as_ptr();
    println!(
      "[3] third == first? {}",
      if third == first { "Yes, it reused the freed block" } else { "No, it allocated somewhere else" }
    );
    print_blocks(&heap);

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 4) Grow the second block. It is the last block, so it grows in
    //    place into the chunk slack.
    // --------------------------------------------------------------------
    println!("\n[4] Resize [u8; 12] to 100 bytes");
    let grown = heap.resize(second, 100).unwrap().unwrap().as_ptr();
    println!("[4] grown == second? {}, first byte = 0x{:X}", grown == second, grown.read());
    print_blocks(&heap);

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 5) Shrink it again. The freed tail becomes a block of its own.
    // --------------------------------------------------------------------
    println!("\n[5] Resize back down to 8 bytes");
    heap.resize(grown, 8).unwrap();
    print_blocks(&heap);

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 6) A zeroed array larger than a chunk gets a break extension of its
    //    exact size.
    // --------------------------------------------------------------------
    print_program_break("before large alloc");
    println!("\n[6] zero_allocate 128 KiB");
    let big = heap.zero_allocate(32 * 1024, 4).unwrap().as_ptr();
    println!("[6] big[0] = {}", big.read());
    print_program_break("after large alloc");

    block_until_enter_pressed();

    println!("\n[7] End of example. Process will exit and the OS will reclaim all memory.");
  }
}
