//! Re-links note-on and note-off events while an event stream is rebuilt
//! (file load, paste, replay) and classifies what could not be paired.

use std::collections::{HashMap, VecDeque};

use log::{debug, trace};

use crate::midi::types::{U4, U7};
use crate::midi::{EventId, EventList, MidiEvent};
use crate::time::TicksTime;

type Lane = (U4, U7);

#[derive(Debug, Clone, Copy)]
struct Pending {
  id: EventId,
  tick: TicksTime,
  sequence: u64,
}

/// Note-on events waiting for their note-off, stacked per lane and resolved
/// oldest first.
#[derive(Debug, Default)]
pub struct NotePairingRegistry {
  pending: HashMap<Lane, VecDeque<Pending>>,
  orphaned: Vec<EventId>,
  sequence: u64,
}

impl NotePairingRegistry {
  pub fn new() -> NotePairingRegistry {
    NotePairingRegistry::default()
  }

  /// Returns false when `on` is not a note-on of `events`.
  pub fn register_pending_on(&mut self, events: &EventList, on: EventId) -> bool {
    let event = match events.get(on) {
      Some(event) if event.kind.is_note_on() => event,
      _ => return false,
    };
    let lane = match event.kind.lane() {
      Some(lane) => lane,
      None => return false,
    };
    self.sequence += 1;
    self.pending.entry(lane).or_default().push_back(Pending {
      id: on,
      tick: event.tick,
      sequence: self.sequence,
    });
    trace!("Pending note-on {} on lane {:?}", on, lane);
    true
  }

  /// Pairs `off` with the oldest pending note-on of its lane. An off event with
  /// no candidate, or whose candidate starts after it, is recorded as orphaned.
  pub fn resolve_off(&mut self, events: &mut EventList, off: EventId) -> Option<EventId> {
    let (lane, off_tick) = match events.get(off) {
      Some(event) if event.kind.is_note_off() => match event.kind.lane() {
        Some(lane) => (lane, event.tick),
        None => return None,
      },
      _ => return None,
    };

    let candidate = self
      .pending
      .get(&lane)
      .and_then(|stack| stack.front())
      .filter(|pending| pending.tick <= off_tick)
      .map(|pending| pending.id);

    match candidate {
      Some(on) => {
        if let Some(stack) = self.pending.get_mut(&lane) {
          stack.pop_front();
          if stack.is_empty() {
            self.pending.remove(&lane);
          }
        }
        events.link(on, off);
        Some(on)
      }
      None => {
        debug!("Orphaned note-off {} on lane {:?}", off, lane);
        self.orphaned.push(off);
        None
      }
    }
  }

  pub fn clear(&mut self) {
    self.pending.clear();
    self.orphaned.clear();
    self.sequence = 0;
  }

  /// Note-on events still waiting for an off event, in registration order.
  pub fn unresolved(&self) -> Vec<EventId> {
    let mut pending: Vec<&Pending> = self.pending.values().flat_map(|stack| stack.iter()).collect();
    pending.sort_by_key(|pending| pending.sequence);
    pending.into_iter().map(|pending| pending.id).collect()
  }

  pub fn orphaned(&self) -> &[EventId] {
    &self.orphaned
  }

  pub fn is_settled(&self) -> bool {
    self.pending.is_empty() && self.orphaned.is_empty()
  }

  /// Feeds `order` through the registry: note-ons are registered, note-offs
  /// resolved, anything else is ignored.
  pub fn replay<I>(&mut self, events: &mut EventList, order: I)
  where
    I: IntoIterator<Item = EventId>,
  {
    for id in order {
      let (is_on, is_off) = match events.get(id) {
        Some(event) => (event.kind.is_note_on(), event.kind.is_note_off()),
        None => continue,
      };
      if is_on {
        self.register_pending_on(events, id);
      } else if is_off {
        self.resolve_off(events, id);
      }
    }
  }
}

/// Result of one reconstruction pass: the events with their note links, plus
/// the note halves that could not be paired.
#[derive(Debug, Clone, Default)]
pub struct PairedEvents {
  pub events: EventList,
  pub unresolved: Vec<EventId>,
  pub orphaned: Vec<EventId>,
}

impl PairedEvents {
  /// Pairs a stream in tick order; events sharing a tick keep the stream order.
  pub fn replay(stream: Vec<MidiEvent>) -> PairedEvents {
    let mut events = EventList::with_capacity(stream.len());
    for event in stream {
      events.push(event);
    }
    let order = events.ids_by_tick();
    PairedEvents::pair(events, order)
  }

  /// Pairs events in exactly the given order.
  pub fn pair(mut events: EventList, order: Vec<EventId>) -> PairedEvents {
    let mut registry = NotePairingRegistry::new();
    registry.replay(&mut events, order);
    let unresolved = registry.unresolved();
    let orphaned = registry.orphaned().to_vec();
    PairedEvents {
      events,
      unresolved,
      orphaned,
    }
  }

  pub fn is_complete(&self) -> bool {
    self.unresolved.is_empty() && self.orphaned.is_empty()
  }
}
