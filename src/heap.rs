use std::{marker::PhantomData, mem, ptr, ptr::NonNull};

use crate::{
  align,
  align::{ALIGNMENT, align_up},
  block::{Block, HEADER_SIZE},
  brk::{Break, BreakManager},
  config::Config,
  error::{AllocError, Result},
  trace::{Event, Silent, Trace},
};

/// A first-fit, free-list heap growing over a [`Break`] source.
///
/// Blocks are linked in address order and are never unlinked: releasing a
/// block only flags it free, and a later request of equal or smaller size
/// takes it over whole.
pub struct Heap<B, T = Silent> {
  base: *mut Block,
  brk: BreakManager<B>,
  trace: T,
  debug: bool,
}

// The heap exclusively owns every block it links.
unsafe impl<B: Send, T: Send> Send for Heap<B, T> {}

impl<B: Break, T: Trace> Heap<B, T> {
  pub const fn new(
    source: B,
    trace: T,
  ) -> Self {
    Self::with_config(source, trace, Config::DEFAULT)
  }

  pub const fn with_config(
    source: B,
    trace: T,
    config: Config,
  ) -> Self {
    Self {
      base: ptr::null_mut(),
      brk: BreakManager::new(source, config.chunk_size),
      trace,
      debug: config.debug,
    }
  }

  /// First free block holding at least `size` bytes, or null, together with
  /// the last block visited.
  fn find_free(
    &self,
    size: usize,
  ) -> (*mut Block, *mut Block) {
    let mut last = self.base;
    let mut current = self.base;

    unsafe {
      while !current.is_null() {
        if (*current).is_free && (*current).size >= size {
          return (current, last);
        }
        last = current;
        current = (*current).next;
      }
    }

    (ptr::null_mut(), last)
  }

  /// Carves a new in-use block from the break and links it after `last`.
  ///
  /// When the break was moved by someone else since the last extension,
  /// `last` is marked as ending its region so it never grows over the
  /// foreign bytes.
  fn carve(
    &mut self,
    last: *mut Block,
    size: usize,
  ) -> Result<*mut Block> {
    let padded = Block::padded_size(size).ok_or(AllocError::SizeOverflow)?;
    let acquired = self.brk.acquire(padded);

    if let Some(note) = self.brk.take_note() {
      self.trace.note(&note);
    }

    let acquired = acquired?;
    let block = unsafe { Block::write(acquired.addr as *mut u8, Block::new(size, false, ptr::null_mut())) };
    self.brk.advance(padded);

    if !last.is_null() {
      unsafe {
        (*last).next = block;
        (*last).ends_region |= acquired.detached;
      }
    }

    Ok(block)
  }

  /// Allocates `size` bytes aligned to [`ALIGNMENT`].
  ///
  /// A previously released block is reused whole when one is large enough;
  /// otherwise a new block is carved from the break.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Result<NonNull<u8>> {
    let block = self.claim(size)?;
    Ok(self.hand_out(block, size))
  }

  /// Allocates `size` bytes whose address is a multiple of `align`, which
  /// must be a power of two.
  ///
  /// Alignments up to [`ALIGNMENT`] are plain [`allocate`](Self::allocate)
  /// calls. Larger ones claim a block with `align` bytes of headroom and,
  /// unless it happens to be aligned already, split it: the front becomes
  /// a free block and the aligned rest is handed out.
  ///
  /// ```text
  ///   ┌───┬──────────────┬───┬──────────────────────────┐
  ///   │ H │ free prefix  │ H │ aligned data ...         │
  ///   └───┴──────────────┴───┴──────────────────────────┘
  ///                            ▲ multiple of `align`
  /// ```
  pub fn allocate_aligned(
    &mut self,
    size: usize,
    align: usize,
  ) -> Result<NonNull<u8>> {
    if !align.is_power_of_two() {
      return Err(AllocError::InvalidRequest);
    }

    if align <= ALIGNMENT {
      return self.allocate(size);
    }

    if size == 0 {
      return Err(AllocError::InvalidRequest);
    }

    let claimed = size
      .checked_add(align)
      .and_then(|total| total.checked_add(HEADER_SIZE))
      .ok_or(AllocError::SizeOverflow)?;
    let block = self.claim(claimed)?;

    if Block::data_of(block) as usize % align == 0 {
      return Ok(self.hand_out(block, size));
    }

    let aligned = unsafe {
      let header = block as usize;
      let end = Block::payload_end(block);
      let data = align_up(header + 2 * HEADER_SIZE, align);
      let split = data - HEADER_SIZE;

      let mut aligned = Block::new(end - data, false, (*block).next);
      aligned.ends_region = mem::take(&mut (*block).ends_region);
      let aligned = Block::write(block.cast::<u8>().add(split - header), aligned);

      (*block).size = split - header - HEADER_SIZE;
      (*block).is_free = true;
      (*block).next = aligned;

      aligned
    };

    Ok(self.hand_out(aligned, size))
  }

  /// Finds or carves an in-use block of at least `size` bytes.
  fn claim(
    &mut self,
    size: usize,
  ) -> Result<*mut Block> {
    if size == 0 {
      return Err(AllocError::InvalidRequest);
    }

    let block = if self.base.is_null() {
      let block = self.carve(ptr::null_mut(), size)?;
      self.base = block;
      block
    } else {
      match self.find_free(size) {
        (free, _) if !free.is_null() => {
          unsafe { (*free).is_free = false };
          free
        }
        (_, last) => self.carve(last, size)?,
      }
    };

    Ok(block)
  }

  fn hand_out(
    &mut self,
    block: *mut Block,
    size: usize,
  ) -> NonNull<u8> {
    let data = Block::data_of(block);
    let block_size = unsafe { (*block).size };

    self.emit(Event::Malloc {
      size,
      ptr: data as usize,
      block_size,
    });

    unsafe { NonNull::new_unchecked(data) }
  }

  /// Marks the block behind `data` free. Null is ignored.
  ///
  /// # Safety
  ///
  /// `data` must be null or a live pointer returned by this heap. Releasing
  /// anything else, or releasing twice, corrupts the heap.
  pub unsafe fn release(
    &mut self,
    data: *mut u8,
  ) {
    if data.is_null() {
      return;
    }

    let block = Block::header_of(data);
    unsafe { (*block).is_free = true };

    self.emit(Event::Free { ptr: data as usize });
  }

  /// Resizes the block behind `data` to `size` bytes.
  ///
  /// A null `data` allocates; a zero `size` releases and yields `None`.
  /// Shrinking stays in place, handing the tail of the block back to the
  /// free list when it can hold a header and payload of its own. Growing
  /// stays in place when the gap up to the next block, or the break slack
  /// for the last block, covers it; otherwise the contents move to a new
  /// block and the old one is released.
  ///
  /// On error the original block is left untouched.
  ///
  /// # Safety
  ///
  /// `data` must be null or a live pointer returned by this heap.
  pub unsafe fn resize(
    &mut self,
    data: *mut u8,
    size: usize,
  ) -> Result<Option<NonNull<u8>>> {
    unsafe { self.resize_aligned(data, size, ALIGNMENT) }
  }

  /// [`resize`](Self::resize) for a block handed out by
  /// [`allocate_aligned`](Self::allocate_aligned): a block that has to
  /// move lands on a multiple of `align` again.
  ///
  /// # Safety
  ///
  /// `data` must be null or a live pointer returned by this heap.
  pub unsafe fn resize_aligned(
    &mut self,
    data: *mut u8,
    size: usize,
    align: usize,
  ) -> Result<Option<NonNull<u8>>> {
    if !align.is_power_of_two() {
      return Err(AllocError::InvalidRequest);
    }

    if data.is_null() {
      return self.allocate_aligned(size, align).map(Some);
    }

    if size == 0 {
      unsafe { self.release(data) };
      return Ok(None);
    }

    let block = Block::header_of(data);
    let old_size = unsafe { (*block).size };

    let result = if size <= old_size {
      unsafe { self.shrink(block, size) };
      data
    } else if unsafe { self.grow_in_place(block, size) } {
      data
    } else {
      let moved = self.allocate_aligned(size, align)?.as_ptr();
      unsafe {
        ptr::copy_nonoverlapping(data, moved, old_size);
        self.release(data);
      }
      moved
    };

    let block_size = unsafe { (*Block::header_of(result)).size };

    self.emit(Event::Realloc {
      ptr: data as usize,
      size,
      new_ptr: result as usize,
      block_size,
    });

    Ok(Some(unsafe { NonNull::new_unchecked(result) }))
  }

  unsafe fn shrink(
    &mut self,
    block: *mut Block,
    size: usize,
  ) {
    unsafe {
      let old_end = block as usize + align!(HEADER_SIZE + (*block).size);
      let new_end = block as usize + align!(HEADER_SIZE + size);
      let reclaimed = old_end - new_end;

      if reclaimed > HEADER_SIZE {
        let mut salvage = Block::new(reclaimed - HEADER_SIZE, true, (*block).next);
        salvage.ends_region = mem::take(&mut (*block).ends_region);
        let addr = block.cast::<u8>().add(new_end - block as usize);
        (*block).next = Block::write(addr, salvage);
      }

      (*block).size = size;
    }
  }

  unsafe fn grow_in_place(
    &mut self,
    block: *mut Block,
    size: usize,
  ) -> bool {
    unsafe {
      let next = (*block).next;

      let fits = if next.is_null() {
        match Block::padded_size(size) {
          Some(padded) => self.brk.grow_tail(block as usize + padded),
          None => false,
        }
      } else {
        let limit = if (*block).ends_region { Block::padded_end(block) } else { next as usize };
        size - (*block).size <= limit - Block::payload_end(block)
      };

      if fits {
        (*block).size = size;
      }

      fits
    }
  }

  /// Allocates room for `count` elements of `elem_size` bytes and zeroes it.
  pub fn zero_allocate(
    &mut self,
    count: usize,
    elem_size: usize,
  ) -> Result<NonNull<u8>> {
    let total = count.checked_mul(elem_size).ok_or(AllocError::SizeOverflow)?;
    let data = self.allocate(total)?;

    unsafe { ptr::write_bytes(data.as_ptr(), 0, total) };

    let block_size = unsafe { (*Block::header_of(data.as_ptr())).size };

    self.emit(Event::Calloc {
      nmemb: count,
      size: elem_size,
      ptr: data.as_ptr() as usize,
      block_size,
    });

    Ok(data)
  }

  /// Recorded size of the block behind `data`, or 0 for null.
  ///
  /// # Safety
  ///
  /// `data` must be null or a live pointer returned by this heap.
  pub unsafe fn usable_size(
    &self,
    data: *mut u8,
  ) -> usize {
    if data.is_null() {
      return 0;
    }

    unsafe { (*Block::header_of(data)).size }
  }

  /// Walks every block in address order.
  pub fn blocks(&self) -> Blocks<'_> {
    Blocks {
      current: self.base,
      _heap: PhantomData,
    }
  }

  /// Unused bytes at the end of the current chunk.
  pub fn slack(&self) -> usize {
    self.brk.slack()
  }

  /// One past the last byte the heap has obtained from its source.
  pub fn top(&self) -> usize {
    self.brk.top()
  }

  pub fn source(&self) -> &B {
    self.brk.source()
  }

  pub fn trace(&self) -> &T {
    &self.trace
  }

  fn emit(
    &mut self,
    event: Event,
  ) {
    if self.debug {
      self.trace.record(&event);
    }
  }
}

/// Snapshot of one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
  pub header: usize,
  pub data: usize,
  pub size: usize,
  pub is_free: bool,
}

pub struct Blocks<'a> {
  current: *mut Block,
  _heap: PhantomData<&'a ()>,
}

impl Iterator for Blocks<'_> {
  type Item = BlockInfo;

  fn next(&mut self) -> Option<BlockInfo> {
    if self.current.is_null() {
      return None;
    }

    let block = self.current;

    unsafe {
      self.current = (*block).next;

      Some(BlockInfo {
        header: block as usize,
        data: Block::data_of(block) as usize,
        size: (*block).size,
        is_free: (*block).is_free,
      })
    }
  }
}
