//! Elevator outages and line incidents from `trafficInfoList` payloads.

use crate::model::{ElevatorNotice, IncidentNotice};
use crate::parser::TrafficInfo;

/// Formats elevator outages as `"<title>: <description>"`, sorted ascending.
///
/// `None` (no `trafficInfos` key) means there is nothing to report.
pub fn normalize_elevators(infos: Option<&[TrafficInfo]>) -> Vec<ElevatorNotice> {
    let mut elevators: Vec<ElevatorNotice> = infos
        .unwrap_or_default()
        .iter()
        .map(|info| ElevatorNotice::new(&info.title, &info.description))
        .collect();
    elevators.sort();
    elevators
}

/// Joins each incident's related lines and sorts by them, ignoring case.
pub fn normalize_incidents(infos: Option<&[TrafficInfo]>) -> Vec<IncidentNotice> {
    let mut incidents: Vec<IncidentNotice> = infos
        .unwrap_or_default()
        .iter()
        .map(|info| IncidentNotice {
            lines: info.related_lines.join(", "),
            description: info.description.clone(),
        })
        .collect();
    incidents.sort_by_cached_key(|incident| incident.lines.to_uppercase());
    incidents
}
