pub mod clipboard;
pub mod config;
pub mod document;
pub mod midi;
pub mod pairing;
pub mod time;
