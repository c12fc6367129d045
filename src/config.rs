use std::ffi::CStr;

use crate::align::{ALIGNMENT, align_up};

/// Default amount by which the break is extended at a time.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Environment variable that turns on per-operation tracing.
pub const DEBUG_ENV: &CStr = c"DEBUG_MALLOC";

/// Tunables of a [`Heap`](crate::Heap), fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
  /// Bytes requested from the break source per extension, unless a single
  /// block needs more.
  pub chunk_size: usize,
  /// Emit one trace event per public operation.
  pub debug: bool,
}

impl Config {
  pub const DEFAULT: Config = Config {
    chunk_size: CHUNK_SIZE,
    debug: false,
  };

  /// Default configuration with `debug` set when `DEBUG_MALLOC` is present
  /// in the environment, whatever its value.
  ///
  /// Uses `getenv(3)` directly so it is safe to call from inside a global
  /// allocator.
  pub fn from_env() -> Self {
    let debug = unsafe { !libc::getenv(DEBUG_ENV.as_ptr()).is_null() };
    Self::DEFAULT.with_debug(debug)
  }

  /// Sets the chunk size, rounded up to [`ALIGNMENT`]. A zero chunk size
  /// makes every extension exactly as large as the block that needs it.
  pub const fn with_chunk_size(
    mut self,
    chunk_size: usize,
  ) -> Self {
    self.chunk_size = align_up(chunk_size, ALIGNMENT);
    self
  }

  pub const fn with_debug(
    mut self,
    debug: bool,
  ) -> Self {
    self.debug = debug;
    self
  }
}

impl Default for Config {
  fn default() -> Self {
    Self::DEFAULT
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults() {
    let config = Config::default();

    assert_eq!(config.chunk_size, 64 * 1024);
    assert!(!config.debug);
  }

  #[test]
  fn test_chunk_size_is_aligned() {
    assert_eq!(Config::DEFAULT.with_chunk_size(100).chunk_size, 112);
    assert_eq!(Config::DEFAULT.with_chunk_size(4096).chunk_size, 4096);
  }

  #[test]
  fn test_builder_keeps_other_fields() {
    let config = Config::DEFAULT.with_debug(true).with_chunk_size(256);

    assert!(config.debug);
    assert_eq!(config.chunk_size, 256);
  }

  #[test]
  fn test_from_env() {
    let name = DEBUG_ENV.to_str().unwrap();

    unsafe { std::env::set_var(name, "") };
    assert_eq!(Config::from_env(), Config::DEFAULT.with_debug(true));

    unsafe { std::env::set_var(name, "0") };
    assert!(Config::from_env().debug);

    unsafe { std::env::remove_var(name) };
    assert_eq!(Config::from_env(), Config::DEFAULT);
  }
}
