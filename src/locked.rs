use std::{
  alloc::{GlobalAlloc, Layout},
  ptr::{self, NonNull},
};

use crate::{align::ALIGNMENT, brk::Break, heap::Heap, trace::AllocSafe};

/// Serializes every operation on the wrapped heap behind a spin lock, so it
/// can be shared between threads and installed as `#[global_allocator]`.
///
/// ```rust,ignore
/// use brkalloc::{Heap, Locked, Sbrk, Silent};
///
/// #[global_allocator]
/// static ALLOCATOR: Locked<Heap<Sbrk>> = Locked::new(Heap::new(Sbrk, Silent));
/// ```
pub struct Locked<A> {
  inner: spin::Mutex<A>,
}

impl<A> Locked<A> {
  pub const fn new(inner: A) -> Self {
    Locked {
      inner: spin::Mutex::new(inner),
    }
  }

  pub fn lock(&self) -> spin::MutexGuard<'_, A> {
    self.inner.lock()
  }
}

fn into_raw<E>(result: Result<NonNull<u8>, E>) -> *mut u8 {
  result.map_or(ptr::null_mut(), NonNull::as_ptr)
}

/// Layouts aligned beyond [`ALIGNMENT`] go through
/// [`Heap::allocate_aligned`]. The trace sink must be [`AllocSafe`]: one that
/// allocates would re-enter the heap while its lock is held.
unsafe impl<B: Break, T: AllocSafe> GlobalAlloc for Locked<Heap<B, T>> {
  unsafe fn alloc(
    &self,
    layout: Layout,
  ) -> *mut u8 {
    into_raw(self.lock().allocate_aligned(layout.size(), layout.align()))
  }

  unsafe fn dealloc(
    &self,
    ptr: *mut u8,
    _layout: Layout,
  ) {
    unsafe { self.lock().release(ptr) };
  }

  unsafe fn alloc_zeroed(
    &self,
    layout: Layout,
  ) -> *mut u8 {
    if layout.align() <= ALIGNMENT {
      return into_raw(self.lock().zero_allocate(1, layout.size()));
    }

    let data = into_raw(self.lock().allocate_aligned(layout.size(), layout.align()));

    if !data.is_null() {
      unsafe { ptr::write_bytes(data, 0, layout.size()) };
    }

    data
  }

  unsafe fn realloc(
    &self,
    ptr: *mut u8,
    layout: Layout,
    new_size: usize,
  ) -> *mut u8 {
    match unsafe { self.lock().resize_aligned(ptr, new_size, layout.align()) } {
      Ok(Some(data)) => data.as_ptr(),
      _ => ptr::null_mut(),
    }
  }
}
