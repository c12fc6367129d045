use std::{mem, ptr};

use crate::align::{ALIGNMENT, align_down, align_up, checked_align_up};

/// Header written immediately before every data region.
#[repr(C)]
pub struct Block {
  /// Payload size requested by the caller, without header or padding.
  pub size: usize,
  pub is_free: bool,
  /// Set when `next` lies in a later, non-contiguous extension of the
  /// break: the bytes past this block's padded end are not the heap's.
  pub ends_region: bool,
  /// Next header in address order. Never owns the pointee.
  pub next: *mut Block,
}

/// Header size rounded up to [`ALIGNMENT`]. The data region of a block
/// starts this many bytes after its header.
pub const HEADER_SIZE: usize = align_up(mem::size_of::<Block>(), ALIGNMENT);

impl Block {
  pub fn new(
    size: usize,
    is_free: bool,
    next: *mut Block,
  ) -> Self {
    Self {
      size,
      is_free,
      ends_region: false,
      next,
    }
  }

  /// Address where the data of the block at `block` begins.
  pub fn data_of(block: *mut Block) -> *mut u8 {
    let start = align_up(block as usize + mem::size_of::<Block>(), ALIGNMENT);
    block.cast::<u8>().wrapping_add(start - block as usize)
  }

  /// Recovers the header of a data pointer handed out by the heap.
  ///
  /// This is address arithmetic only: nothing checks that `data` was ever
  /// returned by the heap.
  pub fn header_of(data: *mut u8) -> *mut Block {
    let addr = align_down((data as usize).wrapping_sub(mem::size_of::<Block>()), ALIGNMENT);
    data.wrapping_sub(data as usize - addr).cast::<Block>()
  }

  /// Bytes a block carrying `size` payload bytes takes in the break,
  /// header included. `None` if the arithmetic overflows.
  pub fn padded_size(size: usize) -> Option<usize> {
    size.checked_add(HEADER_SIZE).and_then(|total| checked_align_up(total, ALIGNMENT))
  }

  /// One past the last payload byte of `block`.
  ///
  /// # Safety
  ///
  /// `block` must point to an initialized header.
  pub unsafe fn payload_end(block: *mut Block) -> usize {
    unsafe { block as usize + HEADER_SIZE + (*block).size }
  }

  /// One past the last byte of `block`, trailing padding included.
  ///
  /// # Safety
  ///
  /// `block` must point to an initialized header.
  pub unsafe fn padded_end(block: *mut Block) -> usize {
    unsafe { block as usize + align_up(HEADER_SIZE + (*block).size, ALIGNMENT) }
  }

  /// Writes a fresh header at `addr`.
  ///
  /// # Safety
  ///
  /// `addr` must be aligned and have `HEADER_SIZE` writable bytes.
  pub unsafe fn write(
    addr: *mut u8,
    block: Block,
  ) -> *mut Block {
    let header = addr.cast::<Block>();
    unsafe { ptr::write(header, block) };
    header
  }
}
