//! # brkalloc - A Program Break Heap Allocator
//!
//! This crate provides a **first-fit free-list allocator** that grows over the
//! program break (`sbrk(2)`) and can stand in for the platform `malloc`.
//!
//! ## Overview
//!
//! Memory is claimed from the break in fixed 64 KiB chunks and carved into
//! blocks. Every block starts with a header; the headers form a singly linked
//! list in address order:
//!
//! ```text
//!   Heap Layout:
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                         CURRENT CHUNK                                │
//!   │                                                                      │
//!   │   ┌───┬──────┬───┬────────┬───┬────┬─────────────────────────────┐   │
//!   │   │ H │  A1  │ H │   A2   │ H │ A3 │           Slack             │   │
//!   │   └───┴──────┴───┴────────┴───┴────┴─────────────────────────────┘   │
//!   │     │        ▲ │          ▲        ▲                             ▲   │
//!   │     └─ next ─┘ └── next ──┘        │                             │   │
//!   │                                   free                          top  │
//!   └──────────────────────────────────────────────────────────────────────┘
//!
//!   Released blocks stay in the list, flagged free, and are reused whole by
//!   the first later request that fits (first-fit).
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   brkalloc
//!   ├── align      - Alignment helpers (align_up, align_down, align!)
//!   ├── block      - Block header and pointer <-> header arithmetic
//!   ├── brk        - Break sources (Sbrk, Arena) and the BreakManager
//!   ├── config     - Chunk size and DEBUG_MALLOC tracing switch
//!   ├── error      - AllocError
//!   ├── heap       - Heap: allocate, release, resize, zero_allocate
//!   ├── locked     - Locked<Heap>: spin lock + GlobalAlloc
//!   ├── trace      - MALLOC: trace lines and their sinks
//!   └── ffi        - malloc, free, realloc, calloc and the aligned family
//!                    (feature `c_api`)
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use brkalloc::{Arena, Heap, Silent};
//!
//! let mut heap = Heap::new(Arena::new(1 << 20), Silent);
//!
//! let ptr = heap.allocate(8).unwrap().as_ptr() as *mut u64;
//!
//! unsafe {
//!     *ptr = 42;
//!     assert_eq!(*ptr, 42);
//!
//!     let grown = heap.resize(ptr.cast(), 64).unwrap().unwrap();
//!     assert_eq!(*grown.as_ptr().cast::<u64>(), 42);
//!
//!     heap.release(grown.as_ptr());
//! }
//! ```
//!
//! ## How It Works
//!
//! Each block carries a header, padded to 16 bytes, directly before the
//! pointer handed to the caller. A request for 20 bytes on a 64-bit target
//! occupies 64 bytes of the break:
//!
//! ```text
//!   offset  0        8    9   10       16       24       32              52   64
//!           ├────────┼────┼────┼────────┼────────┼────────┼───────────────┼────┤
//!           │  size  │free│end │  pad   │  next  │  pad   │ 20 data bytes │pad │
//!           ├────────┴────┴────┴────────┴────────┴────────┼───────────────┴────┤
//!           │             header (HEADER_SIZE)            │  align!(20) = 32   │
//!           └─────────────────────────────────────────────┴────────────────────┘
//!                                                         ▲
//!                                      data = header + 32 │ header = align_down(data - 24, 16)
//! ```
//!
//! Because header and data start are both multiples of 16, the header is
//! recovered from a user pointer by stepping back one header and rounding
//! down.
//!
//! `resize` keeps a block in place whenever it can: shrinking always does
//! (splitting off a free block when enough is left over), growing does when
//! the gap to the next block or, for the last block, the chunk slack covers
//! it. Otherwise it allocates, copies and releases.
//!
//! ## Limitations
//!
//! - **Single-threaded core**: `Heap` needs `&mut self`; share it through
//!   [`Locked`]
//! - **No coalescing**: adjacent free blocks are never merged
//! - **Memory is never returned to the OS**
//! - **Alignment above 16 bytes costs headroom**: `allocate_aligned` claims
//!   `align` extra bytes and leaves the unused front as a free block
//! - **A break moved by someone else fences the heap**: the block before the
//!   foreign bytes never grows past its own padding
//! - **Unix-only**: `Sbrk` requires `libc` and `sbrk` (POSIX systems)
//!
//! ## Safety
//!
//! Releasing or resizing a pointer this heap did not hand out, releasing
//! twice, or touching a block after releasing it is undefined behaviour.
//! None of it is checked.

pub mod align;
pub mod block;
pub mod brk;
pub mod config;
pub mod error;
#[cfg(feature = "c_api")]
pub mod ffi;
pub mod heap;
pub mod locked;
pub mod trace;

pub use brk::{Acquired, Arena, Break, BreakManager, BreakNote, Sbrk};
pub use config::Config;
pub use error::AllocError;
pub use heap::{BlockInfo, Blocks, Heap};
pub use locked::Locked;
pub use trace::{AllocSafe, Event, Logger, Silent, Stdout, Trace};
