//! Error types for the fetch-and-normalize engine.
//!
//! Every variant is recoverable: the scheduler logs it against the sub-fetch
//! that produced it and carries on with the next one.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// The three upstream endpoints polled every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Monitor,
    Elevators,
    Incidents,
}

impl Endpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Monitor => "monitor",
            Endpoint::Elevators => "elevators",
            Endpoint::Incidents => "incidents",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    /// Transport failure, including request timeouts.
    #[error("{endpoint} request failed: {source}")]
    Fetch {
        endpoint: Endpoint,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} request timed out after {after:?}")]
    Timeout { endpoint: Endpoint, after: Duration },

    /// The server answered with a non-2xx status.
    #[error("{endpoint} request returned HTTP {status}")]
    HttpStatus {
        endpoint: Endpoint,
        status: reqwest::StatusCode,
    },

    #[error("failed to decode {endpoint} response: {source}")]
    Decode {
        endpoint: Endpoint,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid timestamp {value:?}: {source}")]
    InvalidTimestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    /// The payload decoded fine but the upstream reports it has no usable data.
    #[error("{endpoint} data unavailable: {reason}")]
    UpstreamUnavailable { endpoint: Endpoint, reason: String },

    #[error("cannot extract departure offsets from {text:?}")]
    MalformedOffsetText { text: String },
}

impl EngineError {
    /// The endpoint this error belongs to, if it came from a request.
    pub fn endpoint(&self) -> Option<Endpoint> {
        match self {
            EngineError::Fetch { endpoint, .. }
            | EngineError::Timeout { endpoint, .. }
            | EngineError::HttpStatus { endpoint, .. }
            | EngineError::Decode { endpoint, .. }
            | EngineError::UpstreamUnavailable { endpoint, .. } => Some(*endpoint),
            EngineError::InvalidTimestamp { .. } | EngineError::MalformedOffsetText { .. } => None,
        }
    }
}
