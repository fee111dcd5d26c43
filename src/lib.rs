//! Deck Bridge
//!
//! Keeps a programmable key-deck surface in sync with a DAW. Button presses
//! become MIDI commands, MIDI feedback becomes button state, and the
//! current track drives the articulation page.

pub mod bridge;
pub mod config;
pub mod daw;
pub mod engine;
pub mod host;
pub mod midi;
pub mod paths;
