pub mod bars;
pub mod convert;
pub mod signature;
pub mod tempo;
pub mod ticks;

pub use self::bars::BarsTime;
pub use self::convert::{measure_of, ms_of_tick, tick_of_measure, tick_of_ms};
pub use self::signature::{Signature, SignatureMap, SignatureMapEntry};
pub use self::tempo::{Tempo, TempoMap, TempoMapEntry};
pub use self::ticks::TicksTime;
