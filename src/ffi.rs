//! C entry points. Building the `cdylib` with `--features c_api` yields a
//! library that can stand in for the system allocator. Besides the four
//! classic calls it exports the aligned family (`posix_memalign`,
//! `aligned_alloc`, `memalign`) and `malloc_usable_size`, which C++ runtimes
//! and glibc itself reach for:
//!
//! ```bash,ignore
//! cargo build --release --features c_api
//! DEBUG_MALLOC=1 LD_PRELOAD=target/release/libbrkalloc.so ls
//! ```

use std::{
  mem,
  ptr::{self, NonNull},
};

use libc::{c_int, c_void};

use crate::{
  Config, Heap, Locked, Sbrk, Stdout,
  error::{AllocError, Result},
};

static HEAP: spin::Lazy<Locked<Heap<Sbrk, Stdout>>> =
  spin::Lazy::new(|| Locked::new(Heap::with_config(Sbrk, Stdout, Config::from_env())));

fn into_c(result: Result<NonNull<u8>>) -> *mut c_void {
  match result {
    Ok(data) => data.as_ptr().cast(),
    Err(error) => {
      if error != AllocError::InvalidRequest {
        set_errno(libc::ENOMEM);
      }
      ptr::null_mut()
    }
  }
}

#[cfg(target_os = "linux")]
fn set_errno(code: c_int) {
  unsafe { *libc::__errno_location() = code };
}

#[cfg(not(target_os = "linux"))]
fn set_errno(_code: c_int) {}

/// Alignments `posix_memalign` accepts: powers of two that are multiples of
/// the pointer size.
fn valid_memalign(alignment: usize) -> bool {
  alignment.is_power_of_two() && alignment % mem::size_of::<*mut c_void>() == 0
}

fn aligned(
  alignment: usize,
  size: usize,
) -> *mut c_void {
  if !alignment.is_power_of_two() {
    set_errno(libc::EINVAL);
    return ptr::null_mut();
  }

  into_c(HEAP.lock().allocate_aligned(size, alignment))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn malloc(size: usize) -> *mut c_void {
  into_c(HEAP.lock().allocate(size))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn free(ptr: *mut c_void) {
  unsafe { HEAP.lock().release(ptr.cast()) };
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn realloc(
  ptr: *mut c_void,
  size: usize,
) -> *mut c_void {
  match unsafe { HEAP.lock().resize(ptr.cast(), size) } {
    Ok(Some(data)) => data.as_ptr().cast(),
    Ok(None) => ptr::null_mut(),
    Err(error) => into_c(Err(error)),
  }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn calloc(
  nmemb: usize,
  size: usize,
) -> *mut c_void {
  into_c(HEAP.lock().zero_allocate(nmemb, size))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn posix_memalign(
  memptr: *mut *mut c_void,
  alignment: usize,
  size: usize,
) -> c_int {
  if !valid_memalign(alignment) {
    return libc::EINVAL;
  }

  let data = match HEAP.lock().allocate_aligned(size, alignment) {
    Ok(data) => data.as_ptr().cast(),
    Err(AllocError::InvalidRequest) => ptr::null_mut(),
    Err(_) => return libc::ENOMEM,
  };

  unsafe { *memptr = data };
  0
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn aligned_alloc(
  alignment: usize,
  size: usize,
) -> *mut c_void {
  aligned(alignment, size)
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn memalign(
  alignment: usize,
  size: usize,
) -> *mut c_void {
  aligned(alignment, size)
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn malloc_usable_size(ptr: *mut c_void) -> usize {
  unsafe { HEAP.lock().usable_size(ptr.cast()) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_valid_memalign() {
    let word = mem::size_of::<*mut c_void>();

    assert!(valid_memalign(word));
    assert!(valid_memalign(64));
    assert!(valid_memalign(4096));
    assert!(!valid_memalign(0));
    assert!(!valid_memalign(24));
    assert!(!valid_memalign(word / 2));
  }
}
