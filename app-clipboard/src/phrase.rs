//! Phrase files: a small TOML description of a document with tempo, meter and
//! notes, used to feed and inspect the shared clipboard from the command line.

use std::fs::File;
use std::io::Read;

use failure::{Error, Fail};
use serde_derive::{Deserialize, Serialize};

use pianoroll_core::document::{Document, DocumentTiming};
use pianoroll_core::midi::{EventId, EventKind, TrackId};
use pianoroll_core::time::{BarsTime, Signature, Tempo, TicksTime};

pub const PHRASE_TRACK: TrackId = TrackId(1);

#[derive(Debug, Fail)]
pub enum PhraseError {
  #[fail(display = "Ticks per quarter must be positive")]
  Resolution,

  #[fail(display = "Invalid tempo of {} bpm at tick {}", bpm, tick)]
  Tempo { tick: u64, bpm: f64 },

  #[fail(display = "Invalid signature {}/{} at tick {}", numerator, denominator, tick)]
  Signature {
    tick: u64,
    numerator: u8,
    denominator: u8,
  },

  #[fail(display = "Invalid note {} on channel {} at tick {}", key, channel, tick)]
  Note { tick: u64, channel: u8, key: u8 },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TempoChange {
  pub tick: u64,
  pub bpm: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SignatureChange {
  pub tick: u64,
  pub numerator: u8,
  pub denominator: u8,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Note {
  pub tick: u64,
  pub length: u64,
  #[serde(default)]
  pub channel: u8,
  pub key: u8,
  #[serde(default = "default_velocity")]
  pub velocity: u8,
}

fn default_velocity() -> u8 {
  100
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Phrase {
  pub ticks_per_quarter: Option<u16>,
  #[serde(default)]
  pub tempo: Vec<TempoChange>,
  #[serde(default)]
  pub signature: Vec<SignatureChange>,
  #[serde(default)]
  pub note: Vec<Note>,
}

impl Phrase {
  pub fn from_file<'a, T>(path: T) -> Result<Phrase, Error>
  where
    T: Into<&'a str>,
  {
    let mut content = String::new();
    let mut file = File::open(path.into())?;
    file.read_to_string(&mut content)?;
    Phrase::from_str(content.as_str())
  }

  pub fn from_str<'a, T>(content: T) -> Result<Phrase, Error>
  where
    T: Into<&'a str>,
  {
    let phrase: Phrase = toml::from_str(content.into())?;
    Ok(phrase)
  }

  pub fn to_toml(&self) -> Result<String, Error> {
    Ok(toml::to_string(self)?)
  }

  /// Builds a document with the phrase notes on [`PHRASE_TRACK`], returning
  /// every created event in file order as the selection.
  pub fn to_document(&self, default_ticks_per_quarter: u16) -> Result<(Document, Vec<EventId>), PhraseError> {
    let ticks_per_quarter = self.ticks_per_quarter.unwrap_or(default_ticks_per_quarter);
    if ticks_per_quarter == 0 {
      return Err(PhraseError::Resolution);
    }

    let mut document = Document::new(ticks_per_quarter);
    document.add_track("Phrase");
    let mut selection = Vec::new();

    for change in self.tempo.iter() {
      let tempo = Tempo::from_bpm(change.bpm);
      let valid_range = 1..=0x00ff_ffff;
      if !change.bpm.is_finite() || change.bpm <= 0.0 || !valid_range.contains(&tempo.micros_per_quarter()) {
        return Err(PhraseError::Tempo {
          tick: change.tick,
          bpm: change.bpm,
        });
      }
      selection.push(document.add_tempo(TicksTime::new(change.tick), tempo));
    }

    for change in self.signature.iter() {
      let denominator = change.denominator;
      let valid = change.numerator > 0
        && denominator > 0
        && denominator <= 64
        && denominator.is_power_of_two()
        && Signature::new(change.numerator, denominator).fits_resolution(ticks_per_quarter);
      if !valid {
        return Err(PhraseError::Signature {
          tick: change.tick,
          numerator: change.numerator,
          denominator,
        });
      }
      let signature = Signature::new(change.numerator, denominator);
      selection.push(document.add_signature(TicksTime::new(change.tick), signature));
    }

    for note in self.note.iter() {
      if note.channel > 15 || note.key > 127 || note.velocity == 0 || note.velocity > 127 {
        return Err(PhraseError::Note {
          tick: note.tick,
          channel: note.channel,
          key: note.key,
        });
      }
      let (on, off) = document.add_note(
        PHRASE_TRACK,
        TicksTime::new(note.tick),
        TicksTime::new(note.length),
        note.channel,
        note.key,
        note.velocity,
      );
      selection.push(on);
      selection.push(off);
    }

    Ok((document, selection))
  }

  /// Collects tempo, meter and linked notes from `document`, sorted by tick.
  pub fn from_document(document: &Document) -> Phrase {
    let mut phrase = Phrase {
      ticks_per_quarter: Some(document.ticks_per_quarter()),
      ..Phrase::default()
    };

    for (_id, event) in document.events().iter() {
      let tick = event.tick.ticks();
      match event.kind {
        EventKind::Tempo(tempo) => phrase.tempo.push(TempoChange {
          tick,
          bpm: (tempo.bpm() * 1000.0).round() / 1000.0,
        }),
        EventKind::TimeSignature(signature) => phrase.signature.push(SignatureChange {
          tick,
          numerator: signature.numerator(),
          denominator: signature.denominator(),
        }),
        EventKind::NoteOn {
          channel,
          key,
          velocity,
        } => {
          let end = event
            .partner()
            .and_then(|off| document.event(off))
            .map(|off| off.tick)
            .unwrap_or(event.tick);
          phrase.note.push(Note {
            tick,
            length: (end - event.tick).ticks(),
            channel,
            key,
            velocity,
          })
        }
        _ => {}
      }
    }

    phrase.tempo.sort_by_key(|change| change.tick);
    phrase.signature.sort_by_key(|change| change.tick);
    phrase.note.sort_by_key(|note| (note.tick, note.channel, note.key));
    phrase
  }
}

/// One line per note with its bar position, for terminal output.
pub fn describe(document: &Document) -> Vec<String> {
  let signature_map = document.signature_map();
  Phrase::from_document(document)
    .note
    .iter()
    .map(|note| {
      let position = BarsTime::from_ticks(TicksTime::new(note.tick), &signature_map);
      format!(
        "{:?} tick {:>6} len {:>5} ch {:>2} key {:>3} vel {:>3}",
        position, note.tick, note.length, note.channel, note.key, note.velocity
      )
    })
    .collect()
}
