//! Fetches realtime departure, elevator and incident data from the Wiener
//! Linien API, normalizes it and republishes it on a fixed interval.

pub mod config;
pub mod error;
pub mod fetch;
pub mod model;
pub mod normalize;
pub mod offset;
pub mod parser;
pub mod publish;
pub mod scheduler;
