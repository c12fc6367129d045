use std::{alloc, cmp, fmt, ptr::NonNull};

use libc::{c_void, intptr_t, sbrk};

use crate::{
  align::{ALIGNMENT, align_up},
  error::{AllocError, Result},
};

/// A growable address range, such as the program break.
///
/// # Safety
///
/// After a successful `extend(delta)` the `delta` bytes below the returned
/// boundary must be writable memory owned by the caller, never handed out
/// again by the implementation.
pub unsafe trait Break {
  /// Grows the range by `delta` bytes and returns the new boundary, one past
  /// its last byte. `extend(0)` only reports the current boundary.
  fn extend(
    &mut self,
    delta: usize,
  ) -> Result<usize>;
}

/// The process break, moved with `sbrk(2)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sbrk;

unsafe impl Break for Sbrk {
  fn extend(
    &mut self,
    delta: usize,
  ) -> Result<usize> {
    let delta = intptr_t::try_from(delta).map_err(|_| AllocError::OutOfMemory)?;

    let previous = unsafe { sbrk(delta) };

    if previous == usize::MAX as *mut c_void {
      return Err(AllocError::OutOfMemory);
    }

    Ok(previous as usize + delta as usize)
  }
}

/// A fixed-capacity region carved out of the global allocator that behaves
/// like a private program break. Extending past the capacity fails the same
/// way `sbrk(2)` does when the system refuses.
pub struct Arena {
  base: NonNull<u8>,
  capacity: usize,
  used: usize,
}

impl Arena {
  const PAGE: usize = 4096;

  pub fn new(capacity: usize) -> Self {
    let capacity = align_up(cmp::max(capacity, 1), Self::PAGE);
    let layout = Self::layout(capacity);
    let base = unsafe { alloc::alloc(layout) };

    let Some(base) = NonNull::new(base) else {
      alloc::handle_alloc_error(layout);
    };

    Self { base, capacity, used: 0 }
  }

  pub fn base(&self) -> usize {
    self.base.as_ptr() as usize
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  /// Bytes handed out so far.
  pub fn used(&self) -> usize {
    self.used
  }

  fn layout(capacity: usize) -> alloc::Layout {
    // `Self::PAGE` is a power of two and the capacity a multiple of it.
    unsafe { alloc::Layout::from_size_align_unchecked(capacity, Self::PAGE) }
  }
}

unsafe impl Break for Arena {
  fn extend(
    &mut self,
    delta: usize,
  ) -> Result<usize> {
    let used = self.used.checked_add(delta).ok_or(AllocError::OutOfMemory)?;

    if used > self.capacity {
      return Err(AllocError::OutOfMemory);
    }

    self.used = used;
    Ok(self.base() + used)
  }
}

// The arena exclusively owns its region.
unsafe impl Send for Arena {}

impl Drop for Arena {
  fn drop(&mut self) {
    unsafe { alloc::dealloc(self.base.as_ptr(), Self::layout(self.capacity)) };
  }
}

/// Where a block may be carved, as handed out by
/// [`BreakManager::acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Acquired {
  pub addr: usize,
  /// The break had to be extended and someone else moved it since the
  /// previous extension, so `addr` does not continue the previous chunk.
  pub detached: bool,
}

/// What happened to the break during the last [`BreakManager::acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakNote {
  Extended { delta: usize, top: usize },
  Failed { delta: usize },
}

impl fmt::Display for BreakNote {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match *self {
      BreakNote::Extended { delta, top } => write!(f, "break extended by {delta} bytes, top = {top:#x}"),
      BreakNote::Failed { delta } => write!(f, "break extension by {delta} bytes failed"),
    }
  }
}

/// Bookkeeping for the part of the break the heap has claimed but not yet
/// carved into blocks.
///
/// ```text
///   ┌──────────┬──────────┬───────────────────────┐
///   │ block    │ block    │        slack          │
///   └──────────┴──────────┴───────────────────────┘
///                         ▲                       ▲
///                        free                    top
/// ```
pub struct BreakManager<B> {
  source: B,
  chunk_size: usize,
  top: usize,
  free: usize,
  note: Option<BreakNote>,
}

impl<B: Break> BreakManager<B> {
  pub const fn new(
    source: B,
    chunk_size: usize,
  ) -> Self {
    Self {
      source,
      chunk_size,
      top: 0,
      free: 0,
      note: None,
    }
  }

  /// Returns an aligned address with at least `padded` unused bytes behind
  /// it, extending the break when the current chunk cannot hold them.
  ///
  /// The bytes stay unclaimed until [`advance`](Self::advance) is called.
  /// On failure only the note is updated.
  pub fn acquire(
    &mut self,
    padded: usize,
  ) -> Result<Acquired> {
    if self.top != 0 && padded <= self.slack() {
      return Ok(Acquired {
        addr: self.free,
        detached: false,
      });
    }

    let amount = if padded > self.chunk_size { padded } else { self.chunk_size };

    let current = self.source.extend(0)?;
    let misalignment = align_up(current, ALIGNMENT) - current;
    let delta = amount.checked_add(misalignment).ok_or(AllocError::SizeOverflow)?;

    let top = match self.source.extend(delta) {
      Ok(top) => top,
      Err(error) => {
        self.note = Some(BreakNote::Failed { delta });
        return Err(error);
      }
    };

    let detached = self.top != 0 && current != self.top;

    self.note = Some(BreakNote::Extended { delta, top });
    self.top = top;
    self.free = top - amount;

    Ok(Acquired {
      addr: self.free,
      detached,
    })
  }

  /// Takes the note left by the last extension attempt, if any.
  pub fn take_note(&mut self) -> Option<BreakNote> {
    self.note.take()
  }

  /// Claims `padded` bytes handed out by the last [`acquire`](Self::acquire).
  pub fn advance(
    &mut self,
    padded: usize,
  ) {
    self.free += padded;
    debug_assert!(self.free <= self.top);
  }

  /// Moves the free pointer up to `end` if it is within the current chunk,
  /// for a tail block growing in place.
  pub fn grow_tail(
    &mut self,
    end: usize,
  ) -> bool {
    if end > self.top {
      return false;
    }

    self.free = cmp::max(self.free, end);
    true
  }

  /// Unused bytes left in the current chunk.
  pub fn slack(&self) -> usize {
    self.top - self.free
  }

  pub fn top(&self) -> usize {
    self.top
  }

  pub fn free(&self) -> usize {
    self.free
  }

  pub fn source(&self) -> &B {
    &self.source
  }
}
