use std::collections::HashMap;

use log::{debug, info, warn};

use crate::midi::{Decoder, EventId, EventKind, EventList, MidiEvent, TrackId};
use crate::pairing::PairedEvents;
use crate::time::{
  Signature, SignatureMap, SignatureMapEntry, Tempo, TempoMap, TempoMapEntry, TicksTime,
};

const DEFAULT_RELEASE_VELOCITY: u8 = 64;

/// Timing context a document exposes to conversions and the clipboard.
pub trait DocumentTiming {
  fn ticks_per_quarter(&self) -> u16;
  fn tempo_map(&self) -> TempoMap;
  fn signature_map(&self) -> SignatureMap;
}

/// Rebuilds a typed event from its encoded blob, bound to `track`.
pub trait EventFactory {
  fn reconstruct(&self, tick: TicksTime, blob: &[u8], track: TrackId) -> Option<MidiEvent>;
}

/// What to do with note halves a reconstruction pass could not pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repair {
  /// Close unresolved notes at the latest tick of the batch, drop orphaned offs.
  CloseAtEnd,
  /// Drop both unresolved notes and orphaned offs.
  Discard,
  /// Insert them as they are.
  Keep,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
  pub inserted: Vec<EventId>,
  pub unresolved: Vec<MidiEvent>,
  pub orphaned: Vec<MidiEvent>,
  pub synthesized: usize,
}

impl LoadReport {
  pub fn is_clean(&self) -> bool {
    self.unresolved.is_empty() && self.orphaned.is_empty()
  }
}

#[derive(Debug, Clone)]
pub struct Track {
  name: String,
}

impl Track {
  pub fn name(&self) -> &str {
    &self.name
  }
}

pub struct Document {
  ticks_per_quarter: u16,
  tracks: Vec<Track>,
  events: EventList,
}

impl Document {
  pub fn new(ticks_per_quarter: u16) -> Document {
    assert!(ticks_per_quarter > 0);
    Document {
      ticks_per_quarter,
      tracks: vec![Track {
        name: "Tempo Track".to_string(),
      }],
      events: EventList::new(),
    }
  }

  pub fn add_track<T>(&mut self, name: T) -> TrackId
  where
    T: Into<String>,
  {
    self.tracks.push(Track { name: name.into() });
    TrackId((self.tracks.len() - 1) as u16)
  }

  pub fn track(&self, id: TrackId) -> Option<&Track> {
    self.tracks.get(id.0 as usize)
  }

  pub fn events(&self) -> &EventList {
    &self.events
  }

  pub fn event(&self, id: EventId) -> Option<&MidiEvent> {
    self.events.get(id)
  }

  pub fn add_event(&mut self, event: MidiEvent) -> EventId {
    self.events.push(event)
  }

  pub fn add_note(
    &mut self,
    track: TrackId,
    start: TicksTime,
    length: TicksTime,
    channel: u8,
    key: u8,
    velocity: u8,
  ) -> (EventId, EventId) {
    let on = self.events.push(MidiEvent::new(
      start,
      track,
      EventKind::NoteOn {
        channel,
        key,
        velocity,
      },
    ));
    let off = self.events.push(MidiEvent::new(
      start + length,
      track,
      EventKind::NoteOff {
        channel,
        key,
        velocity: DEFAULT_RELEASE_VELOCITY,
      },
    ));
    self.events.link(on, off);
    (on, off)
  }

  pub fn add_tempo(&mut self, tick: TicksTime, tempo: Tempo) -> EventId {
    self
      .events
      .push(MidiEvent::new(tick, TrackId(0), EventKind::Tempo(tempo)))
  }

  pub fn add_signature(&mut self, tick: TicksTime, signature: Signature) -> EventId {
    self.events.push(MidiEvent::new(
      tick,
      TrackId(0),
      EventKind::TimeSignature(signature),
    ))
  }

  pub fn remove_event(&mut self, id: EventId) -> Option<MidiEvent> {
    self.events.remove(id)
  }

  /// Loads an unlinked event stream, pairing its notes in a fresh pass.
  pub fn load(&mut self, stream: Vec<MidiEvent>, repair: Repair) -> LoadReport {
    self.absorb(PairedEvents::replay(stream), repair)
  }

  /// Inserts the outcome of a reconstruction pass, keeping its note links and
  /// applying `repair` to whatever could not be paired.
  pub fn absorb(&mut self, paired: PairedEvents, repair: Repair) -> LoadReport {
    let PairedEvents {
      mut events,
      unresolved,
      orphaned,
    } = paired;

    let mut report = LoadReport {
      unresolved: unresolved.iter().filter_map(|id| events.get(*id).copied()).collect(),
      orphaned: orphaned.iter().filter_map(|id| events.get(*id).copied()).collect(),
      ..LoadReport::default()
    };

    if !report.is_clean() {
      warn!(
        "{} unresolved note-on and {} orphaned note-off events, repairing with {:?}",
        report.unresolved.len(),
        report.orphaned.len(),
        repair
      );
    }

    match repair {
      Repair::CloseAtEnd => {
        let end = events.end_tick();
        for on in unresolved.iter() {
          let closing = events.get(*on).and_then(|event| match event.kind {
            EventKind::NoteOn { channel, key, .. } => Some(MidiEvent::new(
              end,
              event.track,
              EventKind::NoteOff {
                channel,
                key,
                velocity: DEFAULT_RELEASE_VELOCITY,
              },
            )),
            _ => None,
          });
          if let Some(closing) = closing {
            let off = events.push(closing);
            events.link(*on, off);
            report.synthesized += 1;
          }
        }
        for off in orphaned.iter() {
          events.remove(*off);
        }
      }
      Repair::Discard => {
        for id in unresolved.iter().chain(orphaned.iter()) {
          events.remove(*id);
        }
      }
      Repair::Keep => {}
    }

    let mut remapped: HashMap<EventId, EventId> = HashMap::new();
    for (id, event) in events.iter() {
      let new_id = self.events.push(*event);
      remapped.insert(id, new_id);
      report.inserted.push(new_id);
    }
    for (id, event) in events.iter() {
      if let Some(partner) = event.partner() {
        if event.kind.is_note_on() {
          if let (Some(on), Some(off)) = (remapped.get(&id), remapped.get(&partner)) {
            self.events.link(*on, *off);
          }
        }
      }
    }

    debug!(
      "Inserted {} events ({} closing notes synthesized)",
      report.inserted.len(),
      report.synthesized
    );
    report
  }
}

impl DocumentTiming for Document {
  fn ticks_per_quarter(&self) -> u16 {
    self.ticks_per_quarter
  }

  fn tempo_map(&self) -> TempoMap {
    let entries = self
      .events
      .iter()
      .filter_map(|(_id, event)| match event.kind {
        EventKind::Tempo(tempo) => Some(TempoMapEntry::new(event.tick, tempo)),
        _ => None,
      })
      .collect();
    TempoMap::new(self.ticks_per_quarter, entries)
  }

  fn signature_map(&self) -> SignatureMap {
    let entries = self
      .events
      .iter()
      .filter_map(|(_id, event)| match event.kind {
        EventKind::TimeSignature(signature) => Some(SignatureMapEntry::new(event.tick, signature)),
        _ => None,
      })
      .collect();
    SignatureMap::new(self.ticks_per_quarter, entries)
  }
}

impl EventFactory for Document {
  fn reconstruct(&self, tick: TicksTime, blob: &[u8], track: TrackId) -> Option<MidiEvent> {
    let track = if self.track(track).is_some() {
      track
    } else {
      info!("Track {:?} does not exist, using the tempo track", track);
      TrackId(0)
    };
    Decoder::decode_event(blob).map(|kind| {
      let track = if kind.is_tempo_or_meter() { TrackId(0) } else { track };
      MidiEvent::new(tick, track, kind)
    })
  }
}
