use std::fmt;

use crate::time::{Signature, Tempo, TicksTime};

use super::types::{GENERAL_CHANNEL, U14, U4, U7};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(pub u16);

/// Handle into an [`EventList`]. Only meaningful for the list that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(usize);

impl EventId {
  pub fn index(&self) -> usize {
    self.0
  }
}

impl fmt::Display for EventId {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
  NoteOn { channel: U4, key: U7, velocity: U7 },
  NoteOff { channel: U4, key: U7, velocity: U7 },
  KeyPressure { channel: U4, key: U7, value: U7 },
  ControlChange { channel: U4, controller: U7, value: U7 },
  ProgramChange { channel: U4, program: U7 },
  ChannelPressure { channel: U4, value: U7 },
  PitchBend { channel: U4, value: U14 },
  Tempo(Tempo),
  TimeSignature(Signature),
}

impl EventKind {
  pub fn channel(&self) -> i32 {
    match *self {
      EventKind::NoteOn { channel, .. }
      | EventKind::NoteOff { channel, .. }
      | EventKind::KeyPressure { channel, .. }
      | EventKind::ControlChange { channel, .. }
      | EventKind::ProgramChange { channel, .. }
      | EventKind::ChannelPressure { channel, .. }
      | EventKind::PitchBend { channel, .. } => i32::from(channel),
      EventKind::Tempo(_) | EventKind::TimeSignature(_) => GENERAL_CHANNEL,
    }
  }

  /// Piano-roll lane of a note event: its channel and key.
  pub fn lane(&self) -> Option<(U4, U7)> {
    match *self {
      EventKind::NoteOn { channel, key, .. } | EventKind::NoteOff { channel, key, .. } => {
        Some((channel, key))
      }
      _ => None,
    }
  }

  pub fn is_note_on(&self) -> bool {
    match self {
      EventKind::NoteOn { .. } => true,
      _ => false,
    }
  }

  pub fn is_note_off(&self) -> bool {
    match self {
      EventKind::NoteOff { .. } => true,
      _ => false,
    }
  }

  pub fn is_tempo_or_meter(&self) -> bool {
    match self {
      EventKind::Tempo(_) | EventKind::TimeSignature(_) => true,
      _ => false,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MidiEvent {
  pub tick: TicksTime,
  pub track: TrackId,
  pub kind: EventKind,
  partner: Option<EventId>,
}

impl MidiEvent {
  pub fn new(tick: TicksTime, track: TrackId, kind: EventKind) -> MidiEvent {
    MidiEvent {
      tick,
      track,
      kind,
      partner: None,
    }
  }

  /// The other half of a note: the off event of an on event, and vice versa.
  pub fn partner(&self) -> Option<EventId> {
    self.partner
  }
}

/// Arena of events. Removing an event leaves its slot empty so the
/// remaining handles stay valid.
#[derive(Debug, Clone, Default)]
pub struct EventList {
  slots: Vec<Option<MidiEvent>>,
}

impl EventList {
  pub fn new() -> EventList {
    EventList::default()
  }

  pub fn with_capacity(capacity: usize) -> EventList {
    EventList {
      slots: Vec::with_capacity(capacity),
    }
  }

  pub fn push(&mut self, mut event: MidiEvent) -> EventId {
    event.partner = None;
    self.slots.push(Some(event));
    EventId(self.slots.len() - 1)
  }

  pub fn get(&self, id: EventId) -> Option<&MidiEvent> {
    self.slots.get(id.0).and_then(|slot| slot.as_ref())
  }

  pub fn get_mut(&mut self, id: EventId) -> Option<&mut MidiEvent> {
    self.slots.get_mut(id.0).and_then(|slot| slot.as_mut())
  }

  pub fn contains(&self, id: EventId) -> bool {
    self.get(id).is_some()
  }

  /// Links two events as halves of the same note, dropping any previous links
  /// either of them had.
  pub fn link(&mut self, on: EventId, off: EventId) -> bool {
    if !self.contains(on) || !self.contains(off) || on == off {
      return false;
    }
    self.unlink(on);
    self.unlink(off);
    if let Some(event) = self.get_mut(on) {
      event.partner = Some(off);
    }
    if let Some(event) = self.get_mut(off) {
      event.partner = Some(on);
    }
    true
  }

  pub fn unlink(&mut self, id: EventId) {
    let partner = self.get_mut(id).and_then(|event| event.partner.take());
    if let Some(partner_event) = partner.and_then(|partner| self.get_mut(partner)) {
      partner_event.partner = None;
    }
  }

  pub fn remove(&mut self, id: EventId) -> Option<MidiEvent> {
    self.unlink(id);
    self.slots.get_mut(id.0).and_then(|slot| slot.take())
  }

  pub fn len(&self) -> usize {
    self.slots.iter().filter(|slot| slot.is_some()).count()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn iter(&self) -> impl Iterator<Item = (EventId, &MidiEvent)> {
    self
      .slots
      .iter()
      .enumerate()
      .filter_map(|(index, slot)| slot.as_ref().map(|event| (EventId(index), event)))
  }

  pub fn ids(&self) -> Vec<EventId> {
    self.iter().map(|(id, _event)| id).collect()
  }

  /// Handles ordered by tick, keeping insertion order for equal ticks.
  pub fn ids_by_tick(&self) -> Vec<EventId> {
    let mut ids: Vec<(TicksTime, EventId)> =
      self.iter().map(|(id, event)| (event.tick, id)).collect();
    ids.sort_by_key(|(tick, _id)| *tick);
    ids.into_iter().map(|(_tick, id)| id).collect()
  }

  pub fn end_tick(&self) -> TicksTime {
    self
      .iter()
      .map(|(_id, event)| event.tick)
      .max()
      .unwrap_or_else(TicksTime::zero)
  }
}
