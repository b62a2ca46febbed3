pub type U4 = u8;
pub type U7 = u8;
pub type U14 = u16;

/// Channel assigned to tempo and meter events, which belong to no MIDI channel.
pub const GENERAL_CHANNEL: i32 = 16;
