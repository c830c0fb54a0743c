//! Normalized data handed to the display layer.

use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Stations keyed by the upstream stop id, in the order they first appeared in the feed.
pub type StationMap = IndexMap<String, Station>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Station {
    pub name: String,
    pub departures: Vec<Departure>,
}

impl Station {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            departures: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Departure {
    pub time: DateTime<Utc>,
    pub towards: String,
    pub line: String,
    #[serde(rename = "type")]
    pub vehicle_type: VehicleType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barrier_free: Option<bool>,
}

/// Vehicle category as reported in a line block's `type` field.
///
/// Codes this crate does not know are kept verbatim so the display layer can
/// decide what to do with them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum VehicleType {
    BusCity,
    BusNight,
    Tram,
    TramSpecial,
    Metro,
    Unknown(String),
}

impl VehicleType {
    pub fn as_code(&self) -> &str {
        match self {
            VehicleType::BusCity => "ptBusCity",
            VehicleType::BusNight => "ptBusNight",
            VehicleType::Tram => "ptTram",
            VehicleType::TramSpecial => "ptTramWLB",
            VehicleType::Metro => "ptMetro",
            VehicleType::Unknown(code) => code,
        }
    }
}

impl From<&str> for VehicleType {
    fn from(code: &str) -> Self {
        match code {
            "ptBusCity" => VehicleType::BusCity,
            "ptBusNight" => VehicleType::BusNight,
            "ptTram" => VehicleType::Tram,
            "ptTramWLB" => VehicleType::TramSpecial,
            "ptMetro" => VehicleType::Metro,
            other => VehicleType::Unknown(other.to_string()),
        }
    }
}

impl From<String> for VehicleType {
    fn from(code: String) -> Self {
        VehicleType::from(code.as_str())
    }
}

impl From<VehicleType> for String {
    fn from(vehicle_type: VehicleType) -> Self {
        match vehicle_type {
            VehicleType::Unknown(code) => code,
            known => known.as_code().to_string(),
        }
    }
}

impl fmt::Display for VehicleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

/// One elevator outage, pre-formatted as `"<title>: <description>"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElevatorNotice {
    pub text: String,
}

impl ElevatorNotice {
    pub fn new(title: &str, description: &str) -> Self {
        Self {
            text: format!("{title}: {description}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentNotice {
    /// Affected line names joined with `", "`.
    pub lines: String,
    pub description: String,
}
