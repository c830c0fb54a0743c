//! Station departure boards from monitor payloads.

use chrono::{DateTime, Duration, Timelike, Utc};
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::model::{Departure, Station, StationMap, VehicleType};
use crate::offset::resolve_offsets;
use crate::parser::{LineBlock, LineTiming, Monitor, MonitorResponse, parse_timestamp};

/// Normalizes a full monitor response, using its server time as the offset base.
pub fn normalize_monitor_response(response: &MonitorResponse) -> Result<StationMap, EngineError> {
    let server_time = response.server_time()?;
    Ok(normalize_monitors(&response.data.monitors, server_time))
}

/// Groups every monitor's departures by station and sorts each board by time.
///
/// Monitors sharing a station key are merged; the first one names the station.
pub fn normalize_monitors(monitors: &[Monitor], server_time: DateTime<Utc>) -> StationMap {
    let mut stations = StationMap::new();

    for monitor in monitors {
        let properties = &monitor.location_stop.properties;
        let station = stations
            .entry(properties.name.clone())
            .or_insert_with(|| Station::new(properties.title.clone()));

        for line in &monitor.lines {
            station.departures.extend(normalize_line(line, server_time));
        }
    }

    for station in stations.values_mut() {
        // stable: equal times keep feed order
        station.departures.sort_by_key(|d| d.time);
    }

    debug!(stations = stations.len(), "Monitor data normalized");
    stations
}

fn normalize_line(line: &LineBlock, server_time: DateTime<Utc>) -> Vec<Departure> {
    let vehicle_type = VehicleType::from(line.vehicle_type.as_deref().unwrap_or_default());

    match line.timing() {
        LineTiming::AbsoluteTimed(entries) => entries
            .into_iter()
            .filter_map(|entry| {
                let Some(raw) = entry.timestamp else {
                    warn!(line = %line.name, "Departure has neither real nor planned time, skipping");
                    return None;
                };
                match parse_timestamp(raw) {
                    Ok(time) => Some(Departure {
                        time,
                        towards: line.towards.clone(),
                        line: line.name.clone(),
                        vehicle_type: vehicle_type.clone(),
                        barrier_free: entry.barrier_free,
                    }),
                    Err(e) => {
                        warn!(line = %line.name, error = %e, "Skipping departure");
                        None
                    }
                }
            })
            .collect(),
        LineTiming::MetroOffset { towards } => match resolve_offsets(towards) {
            Ok(resolved) => {
                let base = truncate_to_minute(server_time);
                resolved
                    .offsets
                    .iter()
                    .map(|minutes| Departure {
                        time: base + Duration::minutes(i64::from(*minutes)),
                        towards: resolved.destination.clone(),
                        line: line.name.clone(),
                        vehicle_type: vehicle_type.clone(),
                        barrier_free: None,
                    })
                    .collect()
            }
            Err(e) => {
                warn!(line = %line.name, error = %e, "Skipping line without usable offsets");
                Vec::new()
            }
        },
    }
}

/// Zeroes seconds and sub-seconds.
pub fn truncate_to_minute(time: DateTime<Utc>) -> DateTime<Utc> {
    time.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(time)
}
