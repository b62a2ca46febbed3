use log::warn;

use crate::time::TicksTime;

pub const DEFAULT_CLOCKS_PER_CLICK: u8 = 24;
pub const DEFAULT_THIRTY_SECONDS_PER_QUARTER: u8 = 8;

/// Meter of a section. Only numerator and denominator shape the measure,
/// the remaining fields are kept for the metronome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature {
  numerator: u8,
  denominator: u8,
  clocks_per_click: u8,
  thirty_seconds_per_quarter: u8,
}

impl Signature {
  pub fn new(numerator: u8, denominator: u8) -> Signature {
    Signature::with_metronome(
      numerator,
      denominator,
      DEFAULT_CLOCKS_PER_CLICK,
      DEFAULT_THIRTY_SECONDS_PER_QUARTER,
    )
  }

  pub fn with_metronome(
    numerator: u8,
    denominator: u8,
    clocks_per_click: u8,
    thirty_seconds_per_quarter: u8,
  ) -> Signature {
    assert!(numerator > 0);
    assert!(denominator.is_power_of_two() && denominator <= 64);
    Signature {
      numerator,
      denominator,
      clocks_per_click,
      thirty_seconds_per_quarter,
    }
  }

  pub fn numerator(&self) -> u8 {
    self.numerator
  }

  pub fn denominator(&self) -> u8 {
    self.denominator
  }

  pub fn clocks_per_click(&self) -> u8 {
    self.clocks_per_click
  }

  pub fn thirty_seconds_per_quarter(&self) -> u8 {
    self.thirty_seconds_per_quarter
  }

  /// Whether a beat spans a whole number of ticks at this resolution.
  pub fn fits_resolution(&self, ticks_per_quarter: u16) -> bool {
    let quarter_ticks = u64::from(ticks_per_quarter) * 4;
    quarter_ticks > 0 && quarter_ticks % u64::from(self.denominator) == 0
  }

  pub fn ticks_per_beat(&self, ticks_per_quarter: u16) -> u64 {
    u64::from(ticks_per_quarter) * 4 / u64::from(self.denominator)
  }

  pub fn ticks_per_measure(&self, ticks_per_quarter: u16) -> u64 {
    u64::from(self.numerator) * self.ticks_per_beat(ticks_per_quarter)
  }
}

impl Default for Signature {
  fn default() -> Signature {
    Signature::new(4, 4)
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignatureMapEntry {
  pub tick: TicksTime,
  pub signature: Signature,
}

impl SignatureMapEntry {
  pub fn new(tick: TicksTime, signature: Signature) -> SignatureMapEntry {
    SignatureMapEntry { tick, signature }
  }
}

/// Time signature changes ordered by tick, always starting at tick 0.
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureMap {
  ticks_per_quarter: u16,
  entries: Vec<SignatureMapEntry>,
}

impl SignatureMap {
  pub fn new(ticks_per_quarter: u16, mut entries: Vec<SignatureMapEntry>) -> SignatureMap {
    assert!(ticks_per_quarter > 0);

    entries.retain(|entry| {
      let fits = entry.signature.fits_resolution(ticks_per_quarter);
      if !fits {
        warn!(
          "Ignoring signature {}/{} at tick {}: no whole beat at {} ticks per quarter",
          entry.signature.numerator(),
          entry.signature.denominator(),
          entry.tick,
          ticks_per_quarter
        );
      }
      fits
    });
    entries.sort_by_key(|entry| entry.tick);
    let mut unique: Vec<SignatureMapEntry> = Vec::with_capacity(entries.len() + 1);
    for entry in entries {
      match unique.last_mut() {
        Some(last) if last.tick == entry.tick => *last = entry,
        _ => unique.push(entry),
      }
    }

    if unique.first().map_or(true, |first| first.tick > TicksTime::zero()) {
      unique.insert(0, SignatureMapEntry::new(TicksTime::zero(), Signature::default()));
    }

    SignatureMap {
      ticks_per_quarter,
      entries: unique,
    }
  }

  pub fn with_default(ticks_per_quarter: u16) -> SignatureMap {
    SignatureMap::new(ticks_per_quarter, Vec::new())
  }

  pub fn ticks_per_quarter(&self) -> u16 {
    self.ticks_per_quarter
  }

  pub fn entries(&self) -> &[SignatureMapEntry] {
    &self.entries
  }

  pub fn signature_at(&self, tick: TicksTime) -> Signature {
    self
      .entries
      .iter()
      .take_while(|entry| entry.tick <= tick)
      .last()
      .map(|entry| entry.signature)
      .unwrap_or_default()
  }
}

#[cfg(test)]
mod test {

  use super::{Signature, SignatureMap, SignatureMapEntry};
  use crate::time::TicksTime;

  #[test]
  pub fn signature_new() {
    let signature = Signature::new(3, 4);
    assert_eq!(signature.numerator(), 3);
    assert_eq!(signature.denominator(), 4);
    assert_eq!(signature.clocks_per_click(), 24);
    assert_eq!(signature.thirty_seconds_per_quarter(), 8);
  }

  #[test]
  pub fn ticks_per_measure() {
    assert_eq!(Signature::new(4, 4).ticks_per_measure(480), 1920);
    assert_eq!(Signature::new(3, 4).ticks_per_measure(480), 1440);
    assert_eq!(Signature::new(6, 8).ticks_per_measure(480), 1440);
    assert_eq!(Signature::new(6, 8).ticks_per_beat(480), 240);
  }

  #[test]
  pub fn metronome_fields_do_not_change_measure_length() {
    let plain = Signature::new(7, 8);
    let odd_clicks = Signature::with_metronome(7, 8, 36, 8);
    assert_eq!(plain.ticks_per_measure(96), odd_clicks.ticks_per_measure(96));
  }

  #[test]
  #[should_panic]
  pub fn rejects_non_power_of_two_denominator() {
    Signature::new(4, 3);
  }

  #[test]
  pub fn map_defaults_to_common_time() {
    let map = SignatureMap::with_default(480);
    assert_eq!(
      map.entries(),
      &[SignatureMapEntry::new(TicksTime::zero(), Signature::new(4, 4))]
    );
  }

  #[test]
  pub fn signature_at() {
    let map = SignatureMap::new(
      480,
      vec![SignatureMapEntry::new(TicksTime::new(1920), Signature::new(3, 4))],
    );
    assert_eq!(map.signature_at(TicksTime::new(1919)), Signature::new(4, 4));
    assert_eq!(map.signature_at(TicksTime::new(1920)), Signature::new(3, 4));
  }

  #[test]
  pub fn fits_resolution() {
    assert!(Signature::new(6, 8).fits_resolution(2));
    assert!(!Signature::new(6, 8).fits_resolution(1));
    assert!(!Signature::new(6, 8).fits_resolution(3));
    assert!(Signature::new(5, 64).fits_resolution(16));
    assert!(Signature::new(4, 4).fits_resolution(1));
  }

  #[test]
  pub fn map_ignores_signatures_without_whole_beats() {
    let map = SignatureMap::new(
      1,
      vec![
        SignatureMapEntry::new(TicksTime::zero(), Signature::new(6, 8)),
        SignatureMapEntry::new(TicksTime::new(8), Signature::new(3, 4)),
      ],
    );
    assert_eq!(
      map.entries(),
      &[
        SignatureMapEntry::new(TicksTime::zero(), Signature::new(4, 4)),
        SignatureMapEntry::new(TicksTime::new(8), Signature::new(3, 4)),
      ]
    );
    assert!(map
      .entries()
      .iter()
      .all(|entry| entry.signature.ticks_per_measure(1) > 0));
  }
}
