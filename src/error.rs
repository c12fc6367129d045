use thiserror::Error;

/// Why a heap operation produced no pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
  /// A zero-byte request.
  #[error("invalid allocation request: size must be non-zero")]
  InvalidRequest,

  /// The break could not be extended. Nothing was modified.
  #[error("out of memory: the program break could not be extended")]
  OutOfMemory,

  /// Size arithmetic does not fit in `usize`.
  #[error("allocation size overflows usize")]
  SizeOverflow,
}

pub type Result<T> = std::result::Result<T, AllocError>;
