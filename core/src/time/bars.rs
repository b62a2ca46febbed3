use std::fmt;

use crate::time::{
  convert::{measure_of, tick_of_measure},
  SignatureMap, TicksTime,
};

/// Musical position: measure (from 1), beat within the measure (from 0) and
/// ticks within the beat.
#[derive(PartialEq, Eq, Clone, Copy)]
pub struct BarsTime {
  measure: u64,
  beat: u64,
  ticks: u64,
}

impl BarsTime {
  pub fn new(measure: u64, beat: u64, ticks: u64) -> BarsTime {
    BarsTime {
      measure,
      beat,
      ticks,
    }
  }

  pub fn from_ticks(ticks_time: TicksTime, signature_map: &SignatureMap) -> BarsTime {
    let (measure, into_measure) = measure_of(ticks_time, signature_map);
    let signature = signature_map.signature_at(ticks_time);
    let ticks_per_beat = signature.ticks_per_beat(signature_map.ticks_per_quarter());
    let into_measure = into_measure.ticks();
    BarsTime {
      measure,
      beat: into_measure / ticks_per_beat,
      ticks: into_measure % ticks_per_beat,
    }
  }

  pub fn measure(&self) -> u64 {
    self.measure
  }

  pub fn beat(&self) -> u64 {
    self.beat
  }

  pub fn ticks(&self) -> u64 {
    self.ticks
  }

  pub fn to_ticks(&self, signature_map: &SignatureMap) -> TicksTime {
    let measure_start = tick_of_measure(self.measure, signature_map);
    let signature = signature_map.signature_at(measure_start);
    let ticks_per_beat = signature.ticks_per_beat(signature_map.ticks_per_quarter());
    measure_start + TicksTime::new(self.beat * ticks_per_beat + self.ticks)
  }
}

impl fmt::Debug for BarsTime {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{:05}:{:02}:{:03}", self.measure, self.beat + 1, self.ticks)
  }
}
