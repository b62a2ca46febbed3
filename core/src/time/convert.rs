//! Conversions between ticks, wall-clock milliseconds and measures.
//!
//! Everything here is a pure function of the maps it receives.

use crate::time::{SignatureMap, TempoMap, TicksTime};

/// Milliseconds elapsed from tick 0 up to `tick`, shifted by `origin_ms`.
pub fn ms_of_tick(tick: TicksTime, tempo_map: &TempoMap, origin_ms: f64) -> f64 {
  let ticks_per_quarter = tempo_map.ticks_per_quarter();
  let entries = tempo_map.entries();
  let mut elapsed = 0.0;

  for (index, entry) in entries.iter().enumerate() {
    let ms_per_tick = entry.tempo.ms_per_tick(ticks_per_quarter);
    match entries.get(index + 1) {
      Some(next) if next.tick <= tick => {
        elapsed += f64::from(next.tick - entry.tick) * ms_per_tick;
      }
      _ => {
        elapsed += f64::from(tick - entry.tick) * ms_per_tick;
        break;
      }
    }
  }

  origin_ms + elapsed
}

/// Inverse of [`ms_of_tick`] with a zero origin, rounded to the nearest tick.
pub fn tick_of_ms(ms: f64, tempo_map: &TempoMap) -> TicksTime {
  if ms.is_nan() || ms <= 0.0 {
    return TicksTime::zero();
  }

  let ticks_per_quarter = tempo_map.ticks_per_quarter();
  let entries = tempo_map.entries();
  let mut segment_start_ms = 0.0;

  for (index, entry) in entries.iter().enumerate() {
    let ms_per_tick = entry.tempo.ms_per_tick(ticks_per_quarter);
    if let Some(next) = entries.get(index + 1) {
      let segment_ms = f64::from(next.tick - entry.tick) * ms_per_tick;
      if ms >= segment_start_ms + segment_ms {
        segment_start_ms += segment_ms;
        continue;
      }
    }
    let ticks = ((ms - segment_start_ms) / ms_per_tick).round();
    return entry.tick + TicksTime::new(ticks as u64);
  }

  TicksTime::zero()
}

/// Measure number (starting at 1) holding `tick`, and how far into it `tick` is.
pub fn measure_of(tick: TicksTime, signature_map: &SignatureMap) -> (u64, TicksTime) {
  let ticks_per_quarter = signature_map.ticks_per_quarter();
  let entries = signature_map.entries();
  let mut measure = 1;

  for (index, entry) in entries.iter().enumerate() {
    let ticks_per_measure = entry.signature.ticks_per_measure(ticks_per_quarter);
    match entries.get(index + 1) {
      Some(next) if next.tick <= tick => {
        let section = (next.tick - entry.tick).ticks();
        measure += (section + ticks_per_measure - 1) / ticks_per_measure;
      }
      _ => {
        let offset = (tick - entry.tick).ticks();
        return (
          measure + offset / ticks_per_measure,
          TicksTime::new(offset % ticks_per_measure),
        );
      }
    }
  }

  (measure, TicksTime::zero())
}

/// First tick of `measure` (1-based). Measure 0 is treated as measure 1.
pub fn tick_of_measure(measure: u64, signature_map: &SignatureMap) -> TicksTime {
  let ticks_per_quarter = signature_map.ticks_per_quarter();
  let entries = signature_map.entries();
  let mut first_measure = 1;

  for (index, entry) in entries.iter().enumerate() {
    let ticks_per_measure = entry.signature.ticks_per_measure(ticks_per_quarter);
    if let Some(next) = entries.get(index + 1) {
      let section = (next.tick - entry.tick).ticks();
      let measures = (section + ticks_per_measure - 1) / ticks_per_measure;
      if measure >= first_measure + measures {
        first_measure += measures;
        continue;
      }
    }
    let measures_in = measure.saturating_sub(first_measure);
    return entry.tick + TicksTime::new(measures_in * ticks_per_measure);
  }

  TicksTime::zero()
}

#[cfg(test)]
mod test {

  use super::*;
  use crate::time::{Signature, SignatureMapEntry, Tempo, TempoMapEntry};

  fn varied_tempo_map() -> TempoMap {
    TempoMap::new(
      480,
      vec![
        TempoMapEntry::new(TicksTime::new(0), Tempo::from_bpm(120.0)),
        TempoMapEntry::new(TicksTime::new(1000), Tempo::from_bpm(97.0)),
        TempoMapEntry::new(TicksTime::new(1001), Tempo::new(333_333)),
        TempoMapEntry::new(TicksTime::new(7777), Tempo::from_bpm(61.5)),
        TempoMapEntry::new(TicksTime::new(20000), Tempo::from_bpm(240.0)),
      ],
    )
  }

  #[test]
  pub fn ms_of_tick_constant_tempo() {
    let map = TempoMap::with_default(480);
    assert_eq!(ms_of_tick(TicksTime::new(0), &map, 0.0), 0.0);
    assert_eq!(ms_of_tick(TicksTime::new(480), &map, 0.0), 500.0);
    assert_eq!(ms_of_tick(TicksTime::new(960), &map, 250.0), 1250.0);
  }

  #[test]
  pub fn ms_of_tick_across_tempo_changes() {
    let map = TempoMap::new(
      480,
      vec![TempoMapEntry::new(TicksTime::new(480), Tempo::from_bpm(60.0))],
    );
    // one quarter at 120 then one at 60
    assert_eq!(ms_of_tick(TicksTime::new(960), &map, 0.0), 1500.0);
  }

  #[test]
  pub fn ticks_before_first_entry_use_default_tempo() {
    let map = TempoMap::new(
      480,
      vec![TempoMapEntry::new(TicksTime::new(960), Tempo::from_bpm(60.0))],
    );
    assert_eq!(ms_of_tick(TicksTime::new(480), &map, 0.0), 500.0);
  }

  #[test]
  pub fn round_trip() {
    let maps = vec![
      TempoMap::with_default(480),
      TempoMap::with_default(96),
      varied_tempo_map(),
      TempoMap::new(
        7,
        vec![TempoMapEntry::new(TicksTime::new(3), Tempo::new(1))],
      ),
    ];
    for map in maps.iter() {
      for tick in (0..25_000).step_by(7).chain(vec![999, 1000, 1001, 7776, 7777, 20000]) {
        let tick = TicksTime::new(tick);
        let ms = ms_of_tick(tick, map, 0.0);
        assert_eq!(tick_of_ms(ms, map), tick, "tick {} at {} ms", tick, ms);
      }
    }
  }

  #[test]
  pub fn monotonic() {
    let map = varied_tempo_map();
    let mut previous = ms_of_tick(TicksTime::zero(), &map, 0.0);
    for tick in 1..25_000 {
      let current = ms_of_tick(TicksTime::new(tick), &map, 0.0);
      assert!(current > previous, "tick {}", tick);
      previous = current;
    }
  }

  #[test]
  pub fn tick_of_ms_clamps_invalid_input() {
    let map = TempoMap::with_default(480);
    assert_eq!(tick_of_ms(-10.0, &map), TicksTime::zero());
    assert_eq!(tick_of_ms(std::f64::NAN, &map), TicksTime::zero());
  }

  #[test]
  pub fn tick_of_ms_rounds_to_nearest() {
    let map = TempoMap::with_default(500);
    assert_eq!(tick_of_ms(10.4, &map), TicksTime::new(10));
    assert_eq!(tick_of_ms(10.6, &map), TicksTime::new(11));
  }

  #[test]
  pub fn measure_of_common_time() {
    let map = SignatureMap::with_default(480);
    assert_eq!(measure_of(TicksTime::new(0), &map), (1, TicksTime::new(0)));
    assert_eq!(measure_of(TicksTime::new(1919), &map), (1, TicksTime::new(1919)));
    assert_eq!(measure_of(TicksTime::new(1920), &map), (2, TicksTime::new(0)));
    assert_eq!(measure_of(TicksTime::new(4000), &map), (3, TicksTime::new(160)));
  }

  #[test]
  pub fn measure_of_across_signature_changes() {
    let map = SignatureMap::new(
      480,
      vec![
        SignatureMapEntry::new(TicksTime::new(0), Signature::new(4, 4)),
        SignatureMapEntry::new(TicksTime::new(3840), Signature::new(3, 4)),
        SignatureMapEntry::new(TicksTime::new(6720), Signature::new(6, 8)),
      ],
    );
    assert_eq!(measure_of(TicksTime::new(3840), &map), (3, TicksTime::new(0)));
    assert_eq!(measure_of(TicksTime::new(5280), &map), (4, TicksTime::new(0)));
    assert_eq!(measure_of(TicksTime::new(6720), &map), (5, TicksTime::new(0)));
    assert_eq!(measure_of(TicksTime::new(8400), &map), (6, TicksTime::new(240)));
  }

  #[test]
  pub fn mid_measure_signature_change_closes_the_measure() {
    let map = SignatureMap::new(
      480,
      vec![SignatureMapEntry::new(TicksTime::new(960), Signature::new(3, 4))],
    );
    assert_eq!(measure_of(TicksTime::new(959), &map), (1, TicksTime::new(959)));
    assert_eq!(measure_of(TicksTime::new(960), &map), (2, TicksTime::new(0)));
  }

  #[test]
  pub fn tick_of_measure_inverts_measure_of() {
    let map = SignatureMap::new(
      480,
      vec![
        SignatureMapEntry::new(TicksTime::new(960), Signature::new(3, 4)),
        SignatureMapEntry::new(TicksTime::new(5280), Signature::new(5, 8)),
      ],
    );
    for measure in 1..20 {
      let tick = tick_of_measure(measure, &map);
      assert_eq!(measure_of(tick, &map), (measure, TicksTime::zero()));
    }
    assert_eq!(tick_of_measure(0, &map), TicksTime::zero());
  }

  #[test]
  pub fn measure_of_at_coarse_resolution() {
    let map = SignatureMap::new(
      1,
      vec![SignatureMapEntry::new(TicksTime::zero(), Signature::new(6, 8))],
    );
    assert_eq!(measure_of(TicksTime::new(5), &map), (2, TicksTime::new(1)));
    assert_eq!(tick_of_measure(2, &map), TicksTime::new(4));

    let map = SignatureMap::new(
      2,
      vec![SignatureMapEntry::new(TicksTime::zero(), Signature::new(6, 8))],
    );
    assert_eq!(measure_of(TicksTime::new(5), &map), (1, TicksTime::new(5)));
    assert_eq!(measure_of(TicksTime::new(6), &map), (2, TicksTime::zero()));
  }
}
