/// Every header address and every data address handed out by the heap is a
/// multiple of this value.
pub const ALIGNMENT: usize = 16;

/// Rounds `addr` up to the next multiple of `align`.
///
/// `align` must be a power of two.
///
/// # Examples
///
/// ```rust
/// use brkalloc::align::align_up;
///
/// assert_eq!(align_up(13, 16), 16);
/// assert_eq!(align_up(32, 16), 32);
/// ```
pub const fn align_up(
  addr: usize,
  align: usize,
) -> usize {
  (addr + align - 1) & !(align - 1)
}

/// Rounds `addr` down to the previous multiple of `align`.
///
/// `align` must be a power of two.
pub const fn align_down(
  addr: usize,
  align: usize,
) -> usize {
  addr & !(align - 1)
}

/// Overflow-checked [`align_up`], for sizes that come from callers.
pub const fn checked_align_up(
  addr: usize,
  align: usize,
) -> Option<usize> {
  match addr.checked_add(align - 1) {
    Some(bumped) => Some(bumped & !(align - 1)),
    None => None,
  }
}

/// Rounds a value up to the heap [`ALIGNMENT`].
///
/// ```rust
/// use brkalloc::align;
///
/// assert_eq!(align!(1), 16);
/// assert_eq!(align!(48), 48);
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    $crate::align::align_up($value, $crate::align::ALIGNMENT)
  };
}
