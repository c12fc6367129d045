use std::ptr;

use brkalloc::{Heap, Sbrk, Silent, align::ALIGNMENT, config::CHUNK_SIZE};

#[test]
fn test_heap_on_program_break() {
  let mut heap = Heap::new(Sbrk, Silent);

  let before = unsafe { libc::sbrk(0) } as usize;

  let first = heap.allocate(64).unwrap().as_ptr();
  assert_eq!(first as usize % ALIGNMENT, 0);
  assert!(first as usize >= before);
  assert!(heap.top() >= before + CHUNK_SIZE);

  unsafe {
    ptr::write_bytes(first, 0x42, 64);

    let second = heap.allocate(128).unwrap().as_ptr();
    assert!(second > first);

    let grown = heap.resize(first, 256).unwrap().unwrap().as_ptr();
    assert_ne!(grown, first);
    assert!(std::slice::from_raw_parts(grown, 64).iter().all(|&b| b == 0x42));

    heap.release(second);
    heap.release(grown);
  }

  assert!(heap.blocks().filter(|block| block.is_free).count() >= 2);
}
