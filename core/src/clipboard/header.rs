use std::convert::TryInto;

pub const FORMAT_VERSION: i32 = 1;

/// Fixed record at the start of the shared segment. The byte layout matches
/// this `repr(C)` struct on the build that wrote it (native byte order).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClipboardHeader {
  pub format_version: i32,
  pub ticks_per_quarter: i32,
  /// Quarter note length in microseconds at tick 0 of the source document.
  pub tempo: i32,
  pub event_count: i32,
  pub payload_size: i32,
  /// Milliseconds since the UNIX epoch.
  pub timestamp: i64,
  pub source_process_id: i64,
  pub has_tempo_or_meter: i32,
  /// Process taking the lock last, by copying or by recovering an abandoned
  /// lock. Zero when unknown. Recovery swaps it atomically in the segment.
  pub lock_holder: i32,
}

pub const HEADER_SIZE: usize = 48;

const FORMAT_VERSION_OFFSET: usize = 0;
const TICKS_PER_QUARTER_OFFSET: usize = 4;
const TEMPO_OFFSET: usize = 8;
const EVENT_COUNT_OFFSET: usize = 12;
const PAYLOAD_SIZE_OFFSET: usize = 16;
const TIMESTAMP_OFFSET: usize = 24;
const SOURCE_PROCESS_ID_OFFSET: usize = 32;
const HAS_TEMPO_OR_METER_OFFSET: usize = 40;
pub(crate) const LOCK_HOLDER_OFFSET: usize = 44;

fn read_i32(data: &[u8], offset: usize) -> i32 {
  let mut bytes = [0u8; 4];
  bytes.copy_from_slice(&data[offset..offset + 4]);
  i32::from_ne_bytes(bytes)
}

fn read_i64(data: &[u8], offset: usize) -> i64 {
  let mut bytes = [0u8; 8];
  bytes.copy_from_slice(&data[offset..offset + 8]);
  i64::from_ne_bytes(bytes)
}

impl ClipboardHeader {
  pub fn read_from(data: &[u8]) -> Option<ClipboardHeader> {
    if data.len() < HEADER_SIZE {
      return None;
    }
    Some(ClipboardHeader {
      format_version: read_i32(data, FORMAT_VERSION_OFFSET),
      ticks_per_quarter: read_i32(data, TICKS_PER_QUARTER_OFFSET),
      tempo: read_i32(data, TEMPO_OFFSET),
      event_count: read_i32(data, EVENT_COUNT_OFFSET),
      payload_size: read_i32(data, PAYLOAD_SIZE_OFFSET),
      timestamp: read_i64(data, TIMESTAMP_OFFSET),
      source_process_id: read_i64(data, SOURCE_PROCESS_ID_OFFSET),
      has_tempo_or_meter: read_i32(data, HAS_TEMPO_OR_METER_OFFSET),
      lock_holder: read_i32(data, LOCK_HOLDER_OFFSET),
    })
  }

  /// `out` must hold at least [`HEADER_SIZE`] bytes. Padding is zeroed.
  pub fn write_to(&self, out: &mut [u8]) {
    let out = &mut out[..HEADER_SIZE];
    for byte in out.iter_mut() {
      *byte = 0;
    }
    let fields32 = [
      (FORMAT_VERSION_OFFSET, self.format_version),
      (TICKS_PER_QUARTER_OFFSET, self.ticks_per_quarter),
      (TEMPO_OFFSET, self.tempo),
      (EVENT_COUNT_OFFSET, self.event_count),
      (PAYLOAD_SIZE_OFFSET, self.payload_size),
      (HAS_TEMPO_OR_METER_OFFSET, self.has_tempo_or_meter),
      (LOCK_HOLDER_OFFSET, self.lock_holder),
    ];
    for (offset, value) in fields32.iter() {
      out[*offset..*offset + 4].copy_from_slice(&value.to_ne_bytes());
    }
    out[TIMESTAMP_OFFSET..TIMESTAMP_OFFSET + 8].copy_from_slice(&self.timestamp.to_ne_bytes());
    out[SOURCE_PROCESS_ID_OFFSET..SOURCE_PROCESS_ID_OFFSET + 8]
      .copy_from_slice(&self.source_process_id.to_ne_bytes());
  }

  pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
    let mut bytes = [0u8; HEADER_SIZE];
    self.write_to(&mut bytes);
    bytes
  }

  pub fn has_supported_version(&self) -> bool {
    self.format_version == FORMAT_VERSION
  }

  /// A header describing data this build can paste.
  pub fn holds_data(&self) -> bool {
    self.has_supported_version() && self.event_count > 0 && self.payload_size > 0
  }

  pub fn payload_len(&self) -> Option<usize> {
    self.payload_size.try_into().ok()
  }

  pub fn carries_tempo_or_meter(&self) -> bool {
    self.has_tempo_or_meter != 0
  }

  /// Best guess of the process holding the lock: the last recoverer or
  /// writer, falling back to the source process for headers without one.
  pub fn likely_lock_holder(&self) -> i64 {
    if self.lock_holder != 0 {
      i64::from(self.lock_holder)
    } else {
      self.source_process_id
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use memoffset::offset_of;
  use static_assertions::const_assert_eq;
  use std::mem::{align_of, size_of};

  #[test]
  fn header_layout_matches_wire_offsets() {
    const_assert_eq!(size_of::<ClipboardHeader>(), HEADER_SIZE);
    const_assert_eq!(align_of::<ClipboardHeader>(), 8);
    assert_eq!(offset_of!(ClipboardHeader, format_version), FORMAT_VERSION_OFFSET);
    assert_eq!(offset_of!(ClipboardHeader, ticks_per_quarter), TICKS_PER_QUARTER_OFFSET);
    assert_eq!(offset_of!(ClipboardHeader, tempo), TEMPO_OFFSET);
    assert_eq!(offset_of!(ClipboardHeader, event_count), EVENT_COUNT_OFFSET);
    assert_eq!(offset_of!(ClipboardHeader, payload_size), PAYLOAD_SIZE_OFFSET);
    assert_eq!(offset_of!(ClipboardHeader, timestamp), TIMESTAMP_OFFSET);
    assert_eq!(offset_of!(ClipboardHeader, source_process_id), SOURCE_PROCESS_ID_OFFSET);
    assert_eq!(offset_of!(ClipboardHeader, has_tempo_or_meter), HAS_TEMPO_OR_METER_OFFSET);
    assert_eq!(offset_of!(ClipboardHeader, lock_holder), LOCK_HOLDER_OFFSET);
    assert_eq!(LOCK_HOLDER_OFFSET % std::mem::align_of::<std::sync::atomic::AtomicI32>(), 0);
  }

  #[test]
  fn write_then_read() {
    let header = ClipboardHeader {
      format_version: FORMAT_VERSION,
      ticks_per_quarter: 480,
      tempo: 500_000,
      event_count: 12,
      payload_size: 180,
      timestamp: 1_700_000_000_123,
      source_process_id: 4242,
      has_tempo_or_meter: 1,
      lock_holder: 4243,
    };
    let bytes = header.to_bytes();
    assert_eq!(ClipboardHeader::read_from(&bytes), Some(header));
    assert!(header.holds_data());
    assert!(header.carries_tempo_or_meter());
  }

  #[test]
  fn lock_holder_falls_back_to_the_source() {
    let mut header = ClipboardHeader {
      source_process_id: 4242,
      ..ClipboardHeader::default()
    };
    assert_eq!(header.likely_lock_holder(), 4242);
    header.lock_holder = 17;
    assert_eq!(header.likely_lock_holder(), 17);
  }

  #[test]
  fn zeroed_segment_holds_nothing() {
    let header = ClipboardHeader::read_from(&[0u8; HEADER_SIZE]).unwrap();
    assert!(!header.has_supported_version());
    assert!(!header.holds_data());
    assert_eq!(ClipboardHeader::read_from(&[0u8; 10]), None);
  }
}
