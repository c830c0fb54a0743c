//! Turns decoded upstream payloads into the display model.
//!
//! Each function builds fresh collections from its input and keeps no state
//! between calls.

pub mod departures;
pub mod notices;

pub use departures::normalize_monitors;
pub use notices::{normalize_elevators, normalize_incidents};
