//! Endpoints of the realtime API and the requests the engine sends to them.

use anyhow::{Context, Result};
use reqwest::Url;

use super::{HttpClient, fetch_bytes};
use crate::error::{EngineError, Endpoint};
use crate::parser::{MonitorResponse, TrafficInfoResponse, parse_json, parse_monitor};

pub const ELEVATOR_INFO_NAME: &str = "aufzugsinfo";
pub const INCIDENT_LONG_NAME: &str = "stoerunglang";
pub const INCIDENT_SHORT_NAME: &str = "stoerungkurz";

pub struct WienerLinienApi<C> {
    client: C,
    monitor_url: Url,
    traffic_info_url: Url,
}

impl<C: HttpClient> WienerLinienApi<C> {
    /// `base_url` must be a directory URL, i.e. end in `/`.
    pub fn new(client: C, base_url: &str) -> Result<Self> {
        let base = Url::parse(base_url).with_context(|| format!("invalid base URL {base_url:?}"))?;
        Ok(Self {
            client,
            monitor_url: base.join("monitor")?,
            traffic_info_url: base.join("trafficInfoList")?,
        })
    }

    /// `monitor?stopId=<id>&stopId=<id>...`
    pub fn monitor_url<I, S>(&self, stop_ids: I) -> Url
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut url = self.monitor_url.clone();
        {
            let mut query = url.query_pairs_mut();
            for id in stop_ids {
                query.append_pair("stopId", id.as_ref());
            }
        }
        url
    }

    /// `trafficInfoList?name=aufzugsinfo&relatedStop=<id>...`
    pub fn elevators_url<I, S>(&self, stop_ids: I) -> Url
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.traffic_info_url_for(ELEVATOR_INFO_NAME, "relatedStop", stop_ids)
    }

    /// `trafficInfoList?name=<stoerunglang|stoerungkurz>&relatedLine=<id>...`
    pub fn incidents_url<I, S>(&self, line_ids: I, short_text: bool) -> Url
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let name = if short_text {
            INCIDENT_SHORT_NAME
        } else {
            INCIDENT_LONG_NAME
        };
        self.traffic_info_url_for(name, "relatedLine", line_ids)
    }

    fn traffic_info_url_for<I, S>(&self, name: &str, id_param: &str, ids: I) -> Url
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut url = self.traffic_info_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("name", name);
            for id in ids {
                query.append_pair(id_param, id.as_ref());
            }
        }
        url
    }

    pub async fn fetch_monitor<I, S>(&self, stop_ids: I) -> Result<MonitorResponse, EngineError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let bytes = fetch_bytes(&self.client, Endpoint::Monitor, self.monitor_url(stop_ids)).await?;
        parse_monitor(&bytes)
    }

    pub async fn fetch_elevators<I, S>(&self, stop_ids: I) -> Result<TrafficInfoResponse, EngineError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let url = self.elevators_url(stop_ids);
        let bytes = fetch_bytes(&self.client, Endpoint::Elevators, url).await?;
        parse_json(Endpoint::Elevators, &bytes)
    }

    pub async fn fetch_incidents<I, S>(
        &self,
        line_ids: I,
        short_text: bool,
    ) -> Result<TrafficInfoResponse, EngineError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let url = self.incidents_url(line_ids, short_text);
        let bytes = fetch_bytes(&self.client, Endpoint::Incidents, url).await?;
        parse_json(Endpoint::Incidents, &bytes)
    }
}
