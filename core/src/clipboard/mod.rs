pub mod channel;
pub mod codec;
pub mod header;
mod semaphore;
mod shm;

pub use channel::{ClipboardStatus, PasteReport, SharedClipboard};
pub use codec::{deserialize, retime, serialize, Decoded, Encoded, OriginalTiming};
pub use header::{ClipboardHeader, FORMAT_VERSION, HEADER_SIZE};

use failure::Fail;

#[derive(Debug, Fail)]
pub enum ClipboardError {
  #[fail(display = "Failed to initialise the shared clipboard: {}", cause)]
  Init { cause: String },

  #[fail(display = "Timed out waiting for the clipboard lock")]
  LockTimeout,

  #[fail(display = "Failed to acquire the clipboard lock: {}", cause)]
  Lock { cause: String },

  #[fail(
    display = "Clipboard data needs {} bytes but the segment holds {}",
    required, capacity
  )]
  CapacityExceeded { required: usize, capacity: usize },

  #[fail(display = "Unsupported clipboard format version {}", found)]
  FormatMismatch { found: i32 },

  #[fail(display = "The clipboard holds no data")]
  NoData,

  #[fail(display = "Malformed clipboard payload: {}", reason)]
  MalformedPayload { reason: String },

  #[fail(display = "Event tick {} does not fit the clipboard format", tick)]
  TickOutOfRange { tick: u64 },

  #[fail(display = "Encoded event of {} bytes exceeds the {} bytes limit", size, limit)]
  EventTooLarge { size: usize, limit: usize },
}

pub type ClipboardResult<T> = Result<T, ClipboardError>;
