use super::event::EventKind;
use super::types::{U14, U4, U7};

pub const META: u8 = 0xff;
pub const META_TEMPO: u8 = 0x51;
pub const META_TIME_SIGNATURE: u8 = 0x58;

#[inline]
fn u4(d: &U4) -> u8 {
  d & 0x0f
}

#[inline]
fn u7(d: &U7) -> u8 {
  d & 0x7f
}

#[inline]
fn u14_msb(d: &U14) -> u8 {
  ((d >> 7) & 0x7fu16) as u8
}

#[inline]
fn u14_lsb(d: &U14) -> u8 {
  (d & 0x7f) as u8
}

#[inline]
fn status_and_channel(status: U4, channel: &U4) -> u8 {
  (status << 4) | u4(channel)
}

/// Encodes events into the blob format stored in clipboard records: plain
/// MIDI bytes for channel messages and SMF style meta events for tempo and meter.
pub struct Encoder;

impl Encoder {
  pub fn data_size(kind: &EventKind) -> usize {
    match kind {
      EventKind::NoteOff { .. } => 3,
      EventKind::NoteOn { .. } => 3,
      EventKind::KeyPressure { .. } => 3,
      EventKind::ControlChange { .. } => 3,
      EventKind::ProgramChange { .. } => 2,
      EventKind::ChannelPressure { .. } => 2,
      EventKind::PitchBend { .. } => 3,
      EventKind::Tempo(_) => 6,
      EventKind::TimeSignature(_) => 7,
    }
  }

  pub fn encode(kind: &EventKind, out: &mut [u8]) {
    match kind {
      EventKind::NoteOff {
        channel,
        key,
        velocity,
      } => out[..3].copy_from_slice(&[status_and_channel(0b1000, channel), u7(key), u7(velocity)]),
      EventKind::NoteOn {
        channel,
        key,
        velocity,
      } => out[..3].copy_from_slice(&[status_and_channel(0b1001, channel), u7(key), u7(velocity)]),
      EventKind::KeyPressure {
        channel,
        key,
        value,
      } => out[..3].copy_from_slice(&[status_and_channel(0b1010, channel), u7(key), u7(value)]),
      EventKind::ControlChange {
        channel,
        controller,
        value,
      } => out[..3].copy_from_slice(&[
        status_and_channel(0b1011, channel),
        u7(controller),
        u7(value),
      ]),
      EventKind::ProgramChange { channel, program } => {
        out[..2].copy_from_slice(&[status_and_channel(0b1100, channel), u7(program)])
      }
      EventKind::ChannelPressure { channel, value } => {
        out[..2].copy_from_slice(&[status_and_channel(0b1101, channel), u7(value)])
      }
      EventKind::PitchBend { channel, value } => out[..3].copy_from_slice(&[
        status_and_channel(0b1110, channel),
        u14_lsb(value),
        u14_msb(value),
      ]),
      EventKind::Tempo(tempo) => {
        let micros = tempo.micros_per_quarter().min(0x00ff_ffff);
        out[..6].copy_from_slice(&[
          META,
          META_TEMPO,
          3,
          (micros >> 16) as u8,
          (micros >> 8) as u8,
          micros as u8,
        ])
      }
      EventKind::TimeSignature(signature) => out[..7].copy_from_slice(&[
        META,
        META_TIME_SIGNATURE,
        4,
        signature.numerator(),
        signature.denominator().trailing_zeros() as u8,
        signature.clocks_per_click(),
        signature.thirty_seconds_per_quarter(),
      ]),
    }
  }

  pub fn to_vec(kind: &EventKind) -> Vec<u8> {
    let mut data = vec![0u8; Encoder::data_size(kind)];
    Encoder::encode(kind, data.as_mut_slice());
    data
  }
}

#[cfg(test)]
mod test {

  use super::*;
  use crate::time::{Signature, Tempo};

  #[test]
  pub fn test_u7() {
    assert_eq!(u7(&0xff), 0x7f);
  }

  #[test]
  pub fn test_u14_lsb() {
    assert_eq!(u14_lsb(&0b10_1010_1010_1010), 0b010_1010);
  }

  #[test]
  pub fn test_u14_msb() {
    assert_eq!(u14_msb(&0b10_1010_1010_1010), 0b101_0101);
  }

  #[test]
  pub fn test_status_and_channel() {
    assert_eq!(status_and_channel(0b1010, &0b0101_0101), 0b1010_0101);
  }

  #[test]
  pub fn note_off() {
    assert_encoding(
      &EventKind::NoteOff {
        channel: 1,
        key: 65,
        velocity: 120,
      },
      vec![0b1000_0001, 65, 120],
    )
  }

  #[test]
  pub fn note_on() {
    assert_encoding(
      &EventKind::NoteOn {
        channel: 1,
        key: 65,
        velocity: 120,
      },
      vec![0b1001_0001, 65, 120],
    )
  }

  #[test]
  pub fn control_change() {
    assert_encoding(
      &EventKind::ControlChange {
        channel: 1,
        controller: 65,
        value: 120,
      },
      vec![0b1011_0001, 65, 120],
    )
  }

  #[test]
  pub fn program_change() {
    assert_encoding(
      &EventKind::ProgramChange {
        channel: 1,
        program: 120,
      },
      vec![0b1100_0001, 120],
    )
  }

  #[test]
  pub fn pitch_bend() {
    assert_encoding(
      &EventKind::PitchBend {
        channel: 1,
        value: 0b10_1010_1010_1010,
      },
      vec![0b1110_0001, 0b010_1010, 0b101_0101],
    )
  }

  #[test]
  pub fn tempo() {
    assert_encoding(
      &EventKind::Tempo(Tempo::new(500_000)),
      vec![0xff, 0x51, 0x03, 0x07, 0xa1, 0x20],
    )
  }

  #[test]
  pub fn time_signature() {
    assert_encoding(
      &EventKind::TimeSignature(Signature::new(6, 8)),
      vec![0xff, 0x58, 0x04, 6, 3, 24, 8],
    )
  }

  fn assert_encoding(kind: &EventKind, expected: Vec<u8>) {
    assert_eq!(Encoder::data_size(kind), expected.len());
    assert_eq!(Encoder::to_vec(kind), expected);
  }
}
