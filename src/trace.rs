use std::fmt::{self, Write};

use crate::brk::BreakNote;

/// One public heap operation, as reported when tracing is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
  Malloc {
    size: usize,
    ptr: usize,
    block_size: usize,
  },
  Free {
    ptr: usize,
  },
  Realloc {
    ptr: usize,
    size: usize,
    new_ptr: usize,
    block_size: usize,
  },
  Calloc {
    nmemb: usize,
    size: usize,
    ptr: usize,
    block_size: usize,
  },
}

impl fmt::Display for Event {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match *self {
      Event::Malloc { size, ptr, block_size } => {
        write!(f, "MALLOC: malloc({size})\t\t=> (ptr={ptr:#x}, size={block_size})")
      }
      Event::Free { ptr } => write!(f, "MALLOC: free({ptr:#x})"),
      Event::Realloc {
        ptr,
        size,
        new_ptr,
        block_size,
      } => write!(f, "MALLOC: realloc({ptr:#x},{size})\t=> (ptr={new_ptr:#x}, size={block_size})"),
      Event::Calloc {
        nmemb,
        size,
        ptr,
        block_size,
      } => write!(f, "MALLOC: calloc({nmemb},{size})\t\t=> (ptr={ptr:#x}, size={block_size})"),
    }
  }
}

/// Receives trace events from a heap.
pub trait Trace {
  fn record(
    &mut self,
    event: &Event,
  );

  /// Called after every attempt to extend the break, whether or not
  /// tracing is on.
  fn note(
    &mut self,
    _note: &BreakNote,
  ) {
  }
}

/// A sink that never allocates, so a heap using it can serve as the global
/// allocator without re-entering itself.
///
/// # Safety
///
/// Neither `record` nor `note` may allocate through the global allocator.
pub unsafe trait AllocSafe: Trace {}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl Trace for Silent {
  fn record(
    &mut self,
    _event: &Event,
  ) {
  }
}

unsafe impl AllocSafe for Silent {}

/// Writes each event as one line on standard output without allocating,
/// so it can run inside a global allocator.
#[derive(Debug, Default, Clone, Copy)]
pub struct Stdout;

impl Trace for Stdout {
  fn record(
    &mut self,
    event: &Event,
  ) {
    let mut line = LineBuf::new();
    // A line longer than the buffer is cut, not dropped.
    let _ = writeln!(line, "{event}");
    let bytes = line.as_bytes();

    unsafe {
      libc::write(libc::STDOUT_FILENO, bytes.as_ptr().cast(), bytes.len());
    }
  }
}

unsafe impl AllocSafe for Stdout {}

/// Forwards events to the `log` facade at debug level, break extensions at
/// trace level and failed extensions as warnings.
///
/// Not [`AllocSafe`]: most `log` backends allocate, so a heap tracing
/// through `Logger` must not be the global allocator.
#[derive(Debug, Default, Clone, Copy)]
pub struct Logger;

impl Trace for Logger {
  fn record(
    &mut self,
    event: &Event,
  ) {
    log::debug!("{event}");
  }

  fn note(
    &mut self,
    note: &BreakNote,
  ) {
    match note {
      BreakNote::Extended { .. } => log::trace!("{note}"),
      BreakNote::Failed { .. } => log::warn!("{note}"),
    }
  }
}

impl Trace for Vec<Event> {
  fn record(
    &mut self,
    event: &Event,
  ) {
    self.push(*event);
  }
}

const LINE_CAPACITY: usize = 128;

struct LineBuf {
  buf: [u8; LINE_CAPACITY],
  len: usize,
}

impl LineBuf {
  fn new() -> Self {
    Self {
      buf: [0; LINE_CAPACITY],
      len: 0,
    }
  }

  fn as_bytes(&self) -> &[u8] {
    &self.buf[..self.len]
  }
}

impl Write for LineBuf {
  fn write_str(
    &mut self,
    s: &str,
  ) -> fmt::Result {
    let room = LINE_CAPACITY - self.len;
    let take = s.len().min(room);

    self.buf[self.len..self.len + take].copy_from_slice(&s.as_bytes()[..take]);
    self.len += take;

    if take < s.len() { Err(fmt::Error) } else { Ok(()) }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use super::*;
  use crate::{brk::Arena, config::Config, heap::Heap};

  static CAPTURED: Mutex<Vec<String>> = Mutex::new(Vec::new());

  struct Capture;

  impl log::Log for Capture {
    fn enabled(
      &self,
      _metadata: &log::Metadata<'_>,
    ) -> bool {
      true
    }

    fn log(
      &self,
      record: &log::Record<'_>,
    ) {
      CAPTURED.lock().unwrap().push(format!("{} {}", record.level(), record.args()));
    }

    fn flush(&self) {}
  }

  #[test]
  fn test_event_format() {
    let malloc = Event::Malloc {
      size: 10,
      ptr: 0x1020,
      block_size: 10,
    };
    let free = Event::Free { ptr: 0x1020 };
    let realloc = Event::Realloc {
      ptr: 0x1020,
      size: 40,
      new_ptr: 0x1060,
      block_size: 40,
    };
    let calloc = Event::Calloc {
      nmemb: 4,
      size: 8,
      ptr: 0x10a0,
      block_size: 32,
    };

    assert_eq!(malloc.to_string(), "MALLOC: malloc(10)\t\t=> (ptr=0x1020, size=10)");
    assert_eq!(free.to_string(), "MALLOC: free(0x1020)");
    assert_eq!(realloc.to_string(), "MALLOC: realloc(0x1020,40)\t=> (ptr=0x1060, size=40)");
    assert_eq!(calloc.to_string(), "MALLOC: calloc(4,8)\t\t=> (ptr=0x10a0, size=32)");
  }

  #[test]
  fn test_line_buf_truncates() {
    let mut line = LineBuf::new();
    let long = "x".repeat(LINE_CAPACITY + 10);

    assert!(line.write_str(&long).is_err());
    assert_eq!(line.as_bytes().len(), LINE_CAPACITY);
  }

  #[test]
  fn test_vec_records() {
    let mut events: Vec<Event> = Vec::new();

    events.record(&Event::Free { ptr: 0x40 });

    assert_eq!(events, vec![Event::Free { ptr: 0x40 }]);
  }

  #[test]
  fn test_stdout_writes_one_line() {
    let event = Event::Malloc {
      size: 10,
      ptr: 0x1020,
      block_size: 10,
    };
    let mut fds = [0; 2];
    let mut buf = [0u8; 4096];

    let read = unsafe {
      assert_eq!(libc::pipe(fds.as_mut_ptr()), 0);
      let saved = libc::dup(libc::STDOUT_FILENO);
      libc::dup2(fds[1], libc::STDOUT_FILENO);

      Stdout.record(&event);

      libc::dup2(saved, libc::STDOUT_FILENO);
      libc::close(saved);
      libc::close(fds[1]);

      let read = libc::read(fds[0], buf.as_mut_ptr().cast(), buf.len());
      libc::close(fds[0]);
      read
    };

    assert!(read > 0);
    // The test harness may report other tests on fd 1 meanwhile.
    let written = String::from_utf8_lossy(&buf[..read as usize]);
    assert!(written.contains("MALLOC: malloc(10)\t\t=> (ptr=0x1020, size=10)\n"));
  }

  #[test]
  fn test_logger_receives_events_and_notes() {
    static CAPTURE: Capture = Capture;

    log::set_logger(&CAPTURE).unwrap();
    log::set_max_level(log::LevelFilter::Trace);

    let config = Config::DEFAULT.with_chunk_size(1024).with_debug(true);
    let mut heap = Heap::with_config(Arena::new(4096), Logger, config);

    let p = heap.allocate(16).unwrap().as_ptr();
    assert!(heap.allocate(8192).is_err());

    let lines = CAPTURED.lock().unwrap();

    assert!(lines[0].starts_with("TRACE break extended by 1024 bytes, top = 0x"));
    assert_eq!(lines[1], format!("DEBUG MALLOC: malloc(16)\t\t=> (ptr={:#x}, size=16)", p as usize));
    assert_eq!(lines[2], "WARN break extension by 8224 bytes failed");
  }
}
