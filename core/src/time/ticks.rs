use std::{
  cmp::{min, Ordering},
  convert::TryFrom,
  fmt,
  ops::{Add, AddAssign, Sub, SubAssign},
};

/// Position or length in document ticks. The resolution lives in the maps
/// (ticks per quarter note), never in the value itself.
#[derive(Debug, Eq, Copy, Clone, Hash, Default)]
pub struct TicksTime(u64);

impl TicksTime {
  pub fn new(ticks: u64) -> TicksTime {
    TicksTime(ticks)
  }

  pub fn zero() -> TicksTime {
    TicksTime(0)
  }

  pub fn ticks(&self) -> u64 {
    self.0
  }

  /// Wire form used by the clipboard records.
  pub fn to_i32(&self) -> Option<i32> {
    i32::try_from(self.0).ok()
  }

  pub fn from_i32(ticks: i32) -> Option<TicksTime> {
    u64::try_from(ticks).ok().map(TicksTime)
  }
}

impl Ord for TicksTime {
  fn cmp(&self, other: &TicksTime) -> Ordering {
    self.0.cmp(&other.0)
  }
}

impl PartialOrd for TicksTime {
  fn partial_cmp(&self, other: &TicksTime) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl PartialEq for TicksTime {
  fn eq(&self, other: &TicksTime) -> bool {
    self.0 == other.0
  }
}

impl Add for TicksTime {
  type Output = TicksTime;
  fn add(self, rhs: TicksTime) -> Self {
    TicksTime::new(self.0.saturating_add(rhs.0))
  }
}

impl AddAssign for TicksTime {
  fn add_assign(&mut self, rhs: TicksTime) {
    *self = *self + rhs;
  }
}

impl Sub for TicksTime {
  type Output = TicksTime;
  fn sub(self, rhs: TicksTime) -> Self {
    TicksTime::new(self.0 - min(self.0, rhs.0))
  }
}

impl SubAssign for TicksTime {
  fn sub_assign(&mut self, rhs: TicksTime) {
    *self = *self - rhs;
  }
}

impl From<TicksTime> for f64 {
  fn from(item: TicksTime) -> Self {
    item.0 as f64
  }
}

impl From<TicksTime> for u64 {
  fn from(item: TicksTime) -> Self {
    item.0
  }
}

impl From<u64> for TicksTime {
  fn from(ticks: u64) -> Self {
    TicksTime(ticks)
  }
}

impl fmt::Display for TicksTime {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

#[cfg(test)]
mod test {

  use super::TicksTime;
  use std::cmp::Ordering;

  #[test]
  pub fn new() {
    let ticks_time = TicksTime::new(1234);
    assert_eq!(ticks_time.ticks(), 1234);
  }

  #[test]
  pub fn zero() {
    assert_eq!(TicksTime::zero().ticks(), 0);
  }

  #[test]
  pub fn ord_cmp() {
    let time1 = TicksTime::new(1234);
    let time2 = TicksTime::new(1235);
    assert_eq!(time1.cmp(&time2), Ordering::Less);
    assert_eq!(time2.cmp(&time1), Ordering::Greater);
    assert_eq!(time1.cmp(&time1), Ordering::Equal);
  }

  #[test]
  pub fn add() {
    let mut time = TicksTime::new(100) + TicksTime::new(50);
    assert_eq!(time, TicksTime(150));
    time += TicksTime::new(10);
    assert_eq!(time, TicksTime(160));
  }

  #[test]
  pub fn add_saturates() {
    let max = TicksTime::new(u64::max_value());
    assert_eq!(max + TicksTime::new(1), max);
    assert_eq!(TicksTime::new(u64::max_value() - 1) + TicksTime::new(7), max);
  }

  #[test]
  pub fn sub_saturates() {
    assert_eq!(TicksTime::new(100) - TicksTime::new(30), TicksTime(70));
    assert_eq!(TicksTime::new(30) - TicksTime::new(100), TicksTime(0));
  }

  #[test]
  pub fn wire_conversion() {
    assert_eq!(TicksTime::new(1920).to_i32(), Some(1920));
    assert_eq!(TicksTime::new(u64::from(u32::max_value())).to_i32(), None);
    assert_eq!(TicksTime::from_i32(-1), None);
    assert_eq!(TicksTime::from_i32(480), Some(TicksTime::new(480)));
  }
}
