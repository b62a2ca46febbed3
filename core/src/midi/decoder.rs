use crate::time::{Signature, Tempo};

use super::encoder::{META, META_TEMPO, META_TIME_SIGNATURE};
use super::event::EventKind;
use super::types::{U14, U4, U7};

/// Decodes a single event blob produced by the [`Encoder`](super::encoder::Encoder).
pub struct Decoder<'a> {
  pos: usize,
  data: &'a [u8],
}

impl<'a> Decoder<'a> {
  pub fn new(data: &'a [u8]) -> Decoder<'a> {
    Decoder { pos: 0, data }
  }

  /// The whole blob must be one event, trailing bytes make it undecodable.
  pub fn decode_event(data: &'a [u8]) -> Option<EventKind> {
    let mut decoder = Decoder::new(data);
    let kind = decoder.decode()?;
    if decoder.pos == data.len() {
      Some(kind)
    } else {
      None
    }
  }

  fn next_byte(&mut self) -> Option<u8> {
    let byte = self.data.get(self.pos).copied()?;
    self.pos += 1;
    Some(byte)
  }

  fn next_data(&mut self) -> Option<U7> {
    match self.data.get(self.pos) {
      Some(d1) if d1 & 0b1000_0000 == 0 => {
        self.pos += 1;
        Some(*d1)
      }
      _ => None,
    }
  }

  fn next_data2(&mut self) -> Option<(U7, U7)> {
    self
      .next_data()
      .and_then(|d1| self.next_data().map(|d2| (d1, d2)))
  }

  fn decode_note(&mut self, channel: U4, is_on: bool) -> Option<EventKind> {
    self.next_data2().map(|(key, velocity)| {
      if is_on && velocity > 0 {
        EventKind::NoteOn {
          channel,
          key,
          velocity,
        }
      } else {
        EventKind::NoteOff {
          channel,
          key,
          velocity,
        }
      }
    })
  }

  fn decode_meta(&mut self) -> Option<EventKind> {
    let meta_type = self.next_byte()?;
    let length = self.next_byte()? as usize;
    let end = self.pos + length;
    if end > self.data.len() {
      return None;
    }
    let body = &self.data[self.pos..end];
    self.pos = end;
    match (meta_type, body) {
      (META_TEMPO, &[t0, t1, t2]) => {
        let micros = (u32::from(t0) << 16) | (u32::from(t1) << 8) | u32::from(t2);
        if micros == 0 {
          None
        } else {
          Some(EventKind::Tempo(Tempo::new(micros)))
        }
      }
      (META_TIME_SIGNATURE, &[numerator, denominator_power, clocks, thirty_seconds]) => {
        if numerator == 0 || denominator_power > 6 {
          None
        } else {
          Some(EventKind::TimeSignature(Signature::with_metronome(
            numerator,
            1 << denominator_power,
            clocks,
            thirty_seconds,
          )))
        }
      }
      _ => None,
    }
  }

  fn decode(&mut self) -> Option<EventKind> {
    let status = self.next_byte()?;
    let channel = status & 0x0f;
    match (status >> 4) & 0x0f {
      0b1000 => self.decode_note(channel, false),
      0b1001 => self.decode_note(channel, true),
      0b1010 => self
        .next_data2()
        .map(|(key, value)| EventKind::KeyPressure {
          channel,
          key,
          value,
        }),
      0b1011 => self
        .next_data2()
        .map(|(controller, value)| EventKind::ControlChange {
          channel,
          controller,
          value,
        }),
      0b1100 => self
        .next_data()
        .map(|program| EventKind::ProgramChange { channel, program }),
      0b1101 => self
        .next_data()
        .map(|value| EventKind::ChannelPressure { channel, value }),
      0b1110 => self.next_data2().map(|(lsb, msb)| EventKind::PitchBend {
        channel,
        value: ((msb as U14) << 7) | (lsb as U14),
      }),
      _ if status == META => self.decode_meta(),
      _ => None,
    }
  }
}
