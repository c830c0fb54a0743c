//! JSON envelopes of the realtime API and the decoding helpers around them.
//!
//! The structs mirror the upstream payloads loosely: anything the engine does
//! not need is ignored, and anything that is routinely missing is optional.

use chrono::{DateTime, FixedOffset, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::{EngineError, Endpoint};

/// Status marker the monitor endpoint sets when its data is usable.
pub const STATUS_OK: &str = "OK";

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorResponse {
    pub message: Message,
    pub data: MonitorData,
}

/// Just the status part of a monitor payload; error replies often carry no `data`.
#[derive(Debug, Deserialize)]
struct MonitorStatus {
    message: Message,
}

impl MonitorResponse {
    /// The instant the upstream considers "now", zero point for metro offsets.
    pub fn server_time(&self) -> Result<DateTime<Utc>, EngineError> {
        match &self.message.server_time {
            Some(value) => parse_timestamp(value),
            None => Err(EngineError::Decode {
                endpoint: Endpoint::Monitor,
                source: serde::de::Error::missing_field("serverTime"),
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub value: String,
    pub server_time: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorData {
    pub monitors: Vec<Monitor>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Monitor {
    pub location_stop: LocationStop,
    #[serde(default)]
    pub lines: Vec<LineBlock>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocationStop {
    pub properties: StopProperties,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StopProperties {
    /// Station key, stable across polls.
    pub name: String,
    #[serde(default)]
    pub title: String,
}

/// One line serving a stop monitor, with its scheduled departures.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineBlock {
    pub name: String,
    #[serde(default)]
    pub towards: String,
    #[serde(rename = "type")]
    pub vehicle_type: Option<String>,
    pub barrier_free: Option<bool>,
    #[serde(default)]
    pub departures: DepartureList,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DepartureList {
    #[serde(default)]
    pub departure: Vec<ScheduledDeparture>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledDeparture {
    #[serde(default)]
    pub departure_time: DepartureTime,
    pub vehicle: Option<Vehicle>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartureTime {
    pub time_planned: Option<String>,
    pub time_real: Option<String>,
    pub countdown: Option<i64>,
    /// Keys the engine does not use, kept so emptiness means "no keys at all".
    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

impl DepartureTime {
    /// An empty time object is the upstream's way of saying "see the towards text".
    pub fn is_empty(&self) -> bool {
        self.time_planned.is_none()
            && self.time_real.is_none()
            && self.countdown.is_none()
            && self.other.is_empty()
    }

    /// The real-time estimate if there is one, the planned time otherwise.
    pub fn best_estimate(&self) -> Option<&str> {
        self.time_real.as_deref().or(self.time_planned.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub barrier_free: Option<bool>,
}

/// How a line block reports its departure times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineTiming<'a> {
    /// Every departure carries its own time object.
    AbsoluteTimed(Vec<TimedEntry<'a>>),
    /// At least one departure has an empty time object; offsets live in this text.
    MetroOffset { towards: &'a str },
}

/// A departure from an absolute-timed block, before timestamp parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedEntry<'a> {
    /// `None` when the time object has neither a real nor a planned time.
    pub timestamp: Option<&'a str>,
    pub barrier_free: Option<bool>,
}

impl LineBlock {
    /// Classifies the block; a single empty time object turns the whole block metro-style.
    pub fn timing(&self) -> LineTiming<'_> {
        let departures = &self.departures.departure;
        if departures.iter().any(|d| d.departure_time.is_empty()) {
            return LineTiming::MetroOffset {
                towards: &self.towards,
            };
        }

        LineTiming::AbsoluteTimed(
            departures
                .iter()
                .map(|d| TimedEntry {
                    timestamp: d.departure_time.best_estimate(),
                    barrier_free: d
                        .vehicle
                        .as_ref()
                        .and_then(|v| v.barrier_free)
                        .or(self.barrier_free),
                })
                .collect(),
        )
    }
}

/// Envelope shared by the elevator and incident endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrafficInfoResponse {
    #[serde(default)]
    pub data: TrafficInfoData,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficInfoData {
    /// Absent whenever there is nothing to report.
    pub traffic_infos: Option<Vec<TrafficInfo>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficInfo {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub related_lines: Vec<String>,
}

/// Decodes a JSON body from `endpoint`.
pub fn parse_json<T: DeserializeOwned>(endpoint: Endpoint, bytes: &[u8]) -> Result<T, EngineError> {
    serde_json::from_slice(bytes).map_err(|source| EngineError::Decode { endpoint, source })
}

/// Decodes a monitor payload and checks its status marker.
///
/// # Errors
///
/// [`EngineError::UpstreamUnavailable`] when the status marker is anything but
/// `"OK"`, [`EngineError::Decode`] for malformed JSON or an `"OK"` reply
/// without `data.monitors`.
pub fn parse_monitor(bytes: &[u8]) -> Result<MonitorResponse, EngineError> {
    let status: MonitorStatus = parse_json(Endpoint::Monitor, bytes)?;
    if status.message.value != STATUS_OK {
        return Err(EngineError::UpstreamUnavailable {
            endpoint: Endpoint::Monitor,
            reason: format!("message value {:?}", status.message.value),
        });
    }
    parse_json(Endpoint::Monitor, bytes)
}

/// Parses an upstream timestamp into a UTC instant.
///
/// The API writes offsets without a colon (`2024-01-01T10:03:00.000+0100`);
/// RFC 3339 is accepted as well.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, EngineError> {
    DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::<FixedOffset>::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|source| EngineError::InvalidTimestamp {
            value: value.to_string(),
            source,
        })
}
