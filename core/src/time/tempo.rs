use log::warn;

use crate::time::TicksTime;

pub const DEFAULT_MICROS_PER_QUARTER: u32 = 500_000;

const MICROS_PER_MINUTE: f64 = 60_000_000.0;
const MICROS_PER_MILLI: f64 = 1_000.0;

/// Tempo expressed as the length of a quarter note in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tempo(u32);

impl Tempo {
  pub fn new(micros_per_quarter: u32) -> Tempo {
    Tempo(micros_per_quarter)
  }

  pub fn from_bpm(bpm: f64) -> Tempo {
    Tempo((MICROS_PER_MINUTE / bpm).round() as u32)
  }

  pub fn micros_per_quarter(&self) -> u32 {
    self.0
  }

  pub fn bpm(&self) -> f64 {
    MICROS_PER_MINUTE / f64::from(self.0)
  }

  pub fn ms_per_tick(&self, ticks_per_quarter: u16) -> f64 {
    f64::from(self.0) / (MICROS_PER_MILLI * f64::from(ticks_per_quarter))
  }
}

impl Default for Tempo {
  fn default() -> Tempo {
    Tempo(DEFAULT_MICROS_PER_QUARTER)
  }
}

impl From<Tempo> for f64 {
  fn from(item: Tempo) -> Self {
    f64::from(item.0)
  }
}

impl From<Tempo> for u32 {
  fn from(item: Tempo) -> Self {
    item.0
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoMapEntry {
  pub tick: TicksTime,
  pub tempo: Tempo,
}

impl TempoMapEntry {
  pub fn new(tick: TicksTime, tempo: Tempo) -> TempoMapEntry {
    TempoMapEntry { tick, tempo }
  }
}

/// Tempo changes ordered by tick, always starting at tick 0.
#[derive(Debug, Clone, PartialEq)]
pub struct TempoMap {
  ticks_per_quarter: u16,
  entries: Vec<TempoMapEntry>,
}

impl TempoMap {
  pub fn new(ticks_per_quarter: u16, mut entries: Vec<TempoMapEntry>) -> TempoMap {
    assert!(ticks_per_quarter > 0);

    entries.retain(|entry| {
      if entry.tempo.micros_per_quarter() == 0 {
        warn!("Ignoring a zero tempo at tick {}", entry.tick);
        false
      } else {
        true
      }
    });

    // stable sort keeps the insertion order for equal ticks, so the later one wins
    entries.sort_by_key(|entry| entry.tick);
    let mut unique: Vec<TempoMapEntry> = Vec::with_capacity(entries.len() + 1);
    for entry in entries {
      match unique.last_mut() {
        Some(last) if last.tick == entry.tick => *last = entry,
        _ => unique.push(entry),
      }
    }

    if unique.first().map_or(true, |first| first.tick > TicksTime::zero()) {
      unique.insert(0, TempoMapEntry::new(TicksTime::zero(), Tempo::default()));
    }

    TempoMap {
      ticks_per_quarter,
      entries: unique,
    }
  }

  pub fn with_default(ticks_per_quarter: u16) -> TempoMap {
    TempoMap::new(ticks_per_quarter, Vec::new())
  }

  pub fn ticks_per_quarter(&self) -> u16 {
    self.ticks_per_quarter
  }

  pub fn entries(&self) -> &[TempoMapEntry] {
    &self.entries
  }

  pub fn tempo_at(&self, tick: TicksTime) -> Tempo {
    self
      .entries
      .iter()
      .take_while(|entry| entry.tick <= tick)
      .last()
      .map(|entry| entry.tempo)
      .unwrap_or_default()
  }
}
