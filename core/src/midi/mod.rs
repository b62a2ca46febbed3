pub mod decoder;
pub mod encoder;
pub mod event;
pub mod types;

pub use decoder::Decoder;
pub use encoder::Encoder;
pub use event::{EventId, EventKind, EventList, MidiEvent, TrackId};
