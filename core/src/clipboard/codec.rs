//! Flat byte encoding of event selections for the shared clipboard, and the
//! re-timing applied when pasting into a document with another tempo or
//! resolution.
//!
//! A payload is a sequence of records `tick:i32, channel:i32, length:i32,
//! blob:[length]` in native byte order. A note-on record is directly followed by
//! the record of its note-off.

use std::convert::TryFrom;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, warn};

use crate::document::EventFactory;
use crate::midi::{Encoder, EventId, EventList, TrackId};
use crate::pairing::PairedEvents;
use crate::time::{Tempo, TicksTime};

use super::header::{ClipboardHeader, FORMAT_VERSION, HEADER_SIZE};
use super::{ClipboardError, ClipboardResult};

const RECORD_PREFIX_SIZE: usize = 12;

#[derive(Debug, Clone, PartialEq)]
pub struct Encoded {
  pub header: ClipboardHeader,
  pub payload: Vec<u8>,
}

impl Encoded {
  /// Bytes needed in the segment for header and payload.
  pub fn size(&self) -> usize {
    HEADER_SIZE + self.payload.len()
  }
}

/// Where and on which channel an event sat in the source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OriginalTiming {
  pub tick: TicksTime,
  pub channel: i32,
}

#[derive(Debug, Clone, Default)]
pub struct Decoded {
  pub paired: PairedEvents,
  /// Indexed by the [`EventId`]s of `paired.events`.
  pub timings: Vec<OriginalTiming>,
  pub records: usize,
}

impl Decoded {
  pub fn timing(&self, id: EventId) -> Option<&OriginalTiming> {
    self.timings.get(id.index())
  }

  /// Moves the events to `cursor`, keeping their distance to the earliest
  /// original tick. Distances are retimed from the source to the target
  /// tempo and resolution unless the material carries its own tempo or meter.
  pub fn place_at(
    &mut self,
    cursor: TicksTime,
    source: &ClipboardHeader,
    target_ticks_per_quarter: u16,
    target_tempo: Tempo,
  ) -> bool {
    let anchor = match self.timings.iter().map(|timing| timing.tick).min() {
      Some(anchor) => anchor,
      None => return false,
    };

    let source_ticks_per_quarter = u16::try_from(source.ticks_per_quarter).unwrap_or(0);
    let source_tempo = u32::try_from(source.tempo).unwrap_or(0);
    let should_retime = !source.carries_tempo_or_meter()
      && source_ticks_per_quarter > 0
      && source_tempo > 0
      && (source_ticks_per_quarter != target_ticks_per_quarter
        || Tempo::new(source_tempo) != target_tempo);

    let ids = self.paired.events.ids();
    for id in ids {
      let original = match self.timings.get(id.index()) {
        Some(timing) => timing.tick,
        None => continue,
      };
      let offset = original - anchor;
      let offset = if should_retime {
        retime(
          offset,
          source_ticks_per_quarter,
          Tempo::new(source_tempo),
          target_ticks_per_quarter,
          target_tempo,
        )
      } else {
        offset
      };
      if let Some(event) = self.paired.events.get_mut(id) {
        event.tick = cursor + offset;
      }
    }
    should_retime
  }
}

fn now_millis() -> i64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map(|d| d.as_millis() as i64)
    .unwrap_or(0)
}

fn push_i32(out: &mut Vec<u8>, value: i32) {
  out.extend_from_slice(&value.to_ne_bytes());
}

fn read_i32(data: &[u8], offset: usize) -> i32 {
  let mut bytes = [0u8; 4];
  bytes.copy_from_slice(&data[offset..offset + 4]);
  i32::from_ne_bytes(bytes)
}

fn push_record(
  out: &mut Vec<u8>,
  events: &EventList,
  id: EventId,
  max_event_bytes: usize,
) -> ClipboardResult<bool> {
  let event = match events.get(id) {
    Some(event) => event,
    None => return Ok(false),
  };
  let tick = event
    .tick
    .to_i32()
    .ok_or_else(|| ClipboardError::TickOutOfRange {
      tick: event.tick.ticks(),
    })?;
  let blob = Encoder::to_vec(&event.kind);
  if blob.len() > max_event_bytes {
    return Err(ClipboardError::EventTooLarge {
      size: blob.len(),
      limit: max_event_bytes,
    });
  }
  push_i32(out, tick);
  push_i32(out, event.kind.channel());
  push_i32(out, blob.len() as i32);
  out.extend_from_slice(&blob);
  Ok(true)
}

/// Encodes `selection` in the given order. Note-off events are only written
/// right after their note-on, never on their own.
pub fn serialize(
  events: &EventList,
  selection: &[EventId],
  ticks_per_quarter: u16,
  tempo: Tempo,
  max_event_bytes: usize,
) -> ClipboardResult<Encoded> {
  let mut payload = Vec::new();
  let mut event_count: usize = 0;
  let mut has_tempo_or_meter = false;

  for id in selection {
    let event = match events.get(*id) {
      Some(event) => event,
      None => continue,
    };
    if event.kind.is_note_off() {
      continue;
    }
    has_tempo_or_meter |= event.kind.is_tempo_or_meter();
    if push_record(&mut payload, events, *id, max_event_bytes)? {
      event_count += 1;
    }
    if event.kind.is_note_on() {
      if let Some(off) = event.partner() {
        if push_record(&mut payload, events, off, max_event_bytes)? {
          event_count += 1;
        }
      }
    }
  }

  let payload_size = i32::try_from(payload.len()).map_err(|_| ClipboardError::CapacityExceeded {
    required: HEADER_SIZE + payload.len(),
    capacity: i32::max_value() as usize,
  })?;

  let header = ClipboardHeader {
    format_version: FORMAT_VERSION,
    ticks_per_quarter: i32::from(ticks_per_quarter),
    tempo: i32::try_from(tempo.micros_per_quarter()).unwrap_or(i32::max_value()),
    event_count: event_count as i32,
    payload_size,
    timestamp: now_millis(),
    source_process_id: i64::from(std::process::id()),
    has_tempo_or_meter: has_tempo_or_meter as i32,
    lock_holder: 0,
  };

  debug!("Serialized {} events into {} bytes", event_count, payload.len());

  Ok(Encoded { header, payload })
}

/// Parses a payload, rebuilding every record through `factory` on `track` and
/// re-linking notes. Any malformed record fails the whole payload; records the
/// factory cannot rebuild are skipped.
pub fn deserialize<F>(
  payload: &[u8],
  factory: &F,
  track: TrackId,
  max_event_bytes: usize,
) -> ClipboardResult<Decoded>
where
  F: EventFactory,
{
  let malformed = |reason: String| ClipboardError::MalformedPayload { reason };

  let mut events = EventList::new();
  let mut timings = Vec::new();
  let mut records = 0;
  let mut pos = 0;
  // the note-on reconstructed from the record just before the current one
  let mut previous_on: Option<EventId> = None;
  let mut unlinked = Vec::new();

  while pos < payload.len() {
    if payload.len() - pos < RECORD_PREFIX_SIZE {
      return Err(malformed(format!("truncated record at byte {}", pos)));
    }
    let tick = read_i32(payload, pos);
    let channel = read_i32(payload, pos + 4);
    let length = read_i32(payload, pos + 8);
    pos += RECORD_PREFIX_SIZE;

    if length <= 0 || length as usize > max_event_bytes {
      return Err(malformed(format!("record length {} out of bounds", length)));
    }
    let length = length as usize;
    if payload.len() - pos < length {
      return Err(malformed(format!(
        "record of {} bytes exceeds the payload at byte {}",
        length, pos
      )));
    }
    let tick = TicksTime::from_i32(tick).ok_or_else(|| malformed(format!("negative tick {}", tick)))?;
    let blob = &payload[pos..pos + length];
    pos += length;
    records += 1;

    match factory.reconstruct(tick, blob, track) {
      Some(event) => {
        let id = events.push(event);
        timings.push(OriginalTiming { tick, channel });
        if let Some(on) = previous_on.take() {
          if closes(&events, on, id) {
            events.link(on, id);
            continue;
          }
          unlinked.push(on);
        }
        if opens_note(&events, id) {
          previous_on = Some(id);
        } else {
          unlinked.push(id);
        }
      }
      None => {
        warn!("Skipping an undecodable clipboard record at tick {}", tick);
        unlinked.extend(previous_on.take());
      }
    }
  }
  unlinked.extend(previous_on.take());
  unlinked.sort();

  let paired = PairedEvents::pair(events, unlinked);
  debug!(
    "Deserialized {} records ({} unresolved, {} orphaned)",
    records,
    paired.unresolved.len(),
    paired.orphaned.len()
  );

  Ok(Decoded {
    paired,
    timings,
    records,
  })
}

fn opens_note(events: &EventList, id: EventId) -> bool {
  events.get(id).map_or(false, |event| event.kind.is_note_on())
}

/// Whether `off` is the note-off ending the note started by `on`.
fn closes(events: &EventList, on: EventId, off: EventId) -> bool {
  match (events.get(on), events.get(off)) {
    (Some(on), Some(off)) => {
      off.kind.is_note_off() && off.kind.lane() == on.kind.lane() && off.tick >= on.tick
    }
    _ => false,
  }
}

/// Converts a tick distance between resolutions and tempos so it lasts the
/// same wall-clock time. Tempos are quarter note lengths in microseconds.
/// Identical source and target leave the tick untouched.
pub fn retime(
  original: TicksTime,
  source_ticks_per_quarter: u16,
  source_tempo: Tempo,
  target_ticks_per_quarter: u16,
  target_tempo: Tempo,
) -> TicksTime {
  if source_ticks_per_quarter == target_ticks_per_quarter && source_tempo == target_tempo {
    return original;
  }
  let numerator = u128::from(original.ticks())
    * u128::from(source_tempo.micros_per_quarter())
    * u128::from(target_ticks_per_quarter);
  let denominator =
    u128::from(source_ticks_per_quarter) * u128::from(target_tempo.micros_per_quarter());
  if denominator == 0 {
    return original;
  }
  let ticks = (numerator + denominator / 2) / denominator;
  TicksTime::new(u64::try_from(ticks).unwrap_or(u64::max_value()))
}
