//! Repeating fetch-normalize-publish cycle.
//!
//! Each cycle runs the monitor, elevator and incident sub-fetches
//! concurrently and waits for all three; a failing sub-fetch is logged and
//! never affects the others. Cycles do not overlap: a tick that elapses while
//! a cycle is still running is skipped.

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{Instrument, debug, error, info, warn};

use crate::config::PollConfig;
use crate::error::{EngineError, Endpoint};
use crate::fetch::auth::UrlParam;
use crate::fetch::{HttpClient, WienerLinienApi};
use crate::normalize::departures::normalize_monitor_response;
use crate::normalize::{normalize_elevators, normalize_incidents};
use crate::publish::{Publisher, Update};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Waiting for configuration.
    Idle,
    Polling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubFetchOutcome {
    Published,
    /// Not requested because the corresponding id set is empty.
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub stations: SubFetchOutcome,
    pub elevators: SubFetchOutcome,
    pub incidents: SubFetchOutcome,
}

/// Owns the polling task. Moves from `Idle` to `Polling` on the first
/// [`configure`](Self::configure) and stays there.
pub struct PollScheduler<C, P: ?Sized> {
    client: Arc<C>,
    publisher: Arc<P>,
    state: SchedulerState,
    task: Option<JoinHandle<()>>,
}

impl<C, P> PollScheduler<C, P>
where
    C: HttpClient + 'static,
    P: Publisher + ?Sized + 'static,
{
    pub fn new(client: Arc<C>, publisher: Arc<P>) -> Self {
        Self {
            client,
            publisher,
            state: SchedulerState::Idle,
            task: None,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Starts polling with `config`. Later calls are ignored; reconfiguring a
    /// running engine is not supported.
    ///
    /// # Errors
    ///
    /// Fails without leaving `Idle` if `config` does not pass
    /// [`PollConfig::validate`].
    pub fn configure(&mut self, config: PollConfig) -> anyhow::Result<()> {
        if self.state == SchedulerState::Polling {
            warn!("Already polling, ignoring new configuration");
            return Ok(());
        }
        let config = config.validate()?;

        let client = UrlParam::sender(self.client.clone(), config.api_key.clone());
        let api = WienerLinienApi::new(client, &config.base_url)?;

        info!(
            stations = config.station_ids.len(),
            elevator_stations = config.elevator_station_ids.len(),
            incident_lines = config.incident_line_ids.len(),
            interval_ms = config.poll_interval_ms,
            "Starting poll loop"
        );
        self.task = Some(tokio::spawn(poll_forever(
            api,
            config,
            self.publisher.clone(),
        )));
        self.state = SchedulerState::Polling;
        Ok(())
    }

    /// Stops the polling task; an in-flight cycle is dropped.
    pub fn shutdown(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            info!("Poll loop stopped");
        }
    }
}

impl<C, P: ?Sized> Drop for PollScheduler<C, P> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Runs a cycle immediately, then once per poll interval, forever.
pub async fn poll_forever<C, P>(api: WienerLinienApi<C>, config: PollConfig, publisher: Arc<P>)
where
    C: HttpClient,
    P: Publisher + ?Sized,
{
    let mut ticker = tokio::time::interval(config.poll_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut cycle: u64 = 0;
    loop {
        ticker.tick().await;
        cycle += 1;
        run_cycle(&api, &config, publisher.as_ref())
            .instrument(tracing::info_span!("cycle", cycle))
            .await;
    }
}

/// One fetch-normalize-publish round over all configured categories.
pub async fn run_cycle<C, P>(api: &WienerLinienApi<C>, config: &PollConfig, publisher: &P) -> CycleReport
where
    C: HttpClient,
    P: Publisher + ?Sized,
{
    let stations = settle(publisher, config, Endpoint::Monitor, async {
        let response = api.fetch_monitor(&config.station_ids).await?;
        normalize_monitor_response(&response).map(Update::Stations)
    });

    let elevators = async {
        if config.elevator_station_ids.is_empty() {
            return SubFetchOutcome::Skipped;
        }
        settle(publisher, config, Endpoint::Elevators, async {
            let response = api.fetch_elevators(&config.elevator_station_ids).await?;
            Ok::<_, EngineError>(Update::Elevators(normalize_elevators(
                response.data.traffic_infos.as_deref(),
            )))
        })
        .await
    };

    let incidents = async {
        if config.incident_line_ids.is_empty() {
            return SubFetchOutcome::Skipped;
        }
        settle(publisher, config, Endpoint::Incidents, async {
            let response = api
                .fetch_incidents(&config.incident_line_ids, config.use_short_incident_text)
                .await?;
            Ok::<_, EngineError>(Update::Incidents(normalize_incidents(
                response.data.traffic_infos.as_deref(),
            )))
        })
        .await
    };

    let (stations, elevators, incidents) = tokio::join!(stations, elevators, incidents);
    let report = CycleReport {
        stations,
        elevators,
        incidents,
    };
    info!(
        stations = ?report.stations,
        elevators = ?report.elevators,
        incidents = ?report.incidents,
        "Cycle finished"
    );
    report
}

/// Awaits one sub-fetch under the request timeout and publishes its result.
async fn settle<P, F>(publisher: &P, config: &PollConfig, endpoint: Endpoint, sub_fetch: F) -> SubFetchOutcome
where
    P: Publisher + ?Sized,
    F: Future<Output = Result<Update, EngineError>>,
{
    let timeout = config.request_timeout();
    let result = match tokio::time::timeout(timeout, sub_fetch).await {
        Ok(result) => result,
        Err(_) => Err(EngineError::Timeout {
            endpoint,
            after: timeout,
        }),
    };

    match result {
        Ok(update) => {
            if update.is_empty() {
                info!(%endpoint, "No {} data available", endpoint);
            } else {
                debug!(%endpoint, entries = update.len(), "Publishing update");
            }
            publisher.publish(update).await;
            SubFetchOutcome::Published
        }
        Err(e) => {
            error!(%endpoint, error = %e, "Sub-fetch failed");
            SubFetchOutcome::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::time::Instant;

    use super::*;
    use crate::fetch::testing::CannedClient;
    use crate::publish::{Channel, ChannelPublisher};

    const BASE: &str = "https://www.wienerlinien.at/ogd_realtime/";
    const MONITOR: &str = include_str!("../tests/fixtures/monitor.json");
    const ELEVATORS: &str = include_str!("../tests/fixtures/elevators.json");
    const INCIDENTS: &str = include_str!("../tests/fixtures/incidents.json");

    #[derive(Default)]
    struct RecordingPublisher {
        updates: Mutex<Vec<Update>>,
    }

    impl RecordingPublisher {
        fn channels(&self) -> Vec<Channel> {
            self.updates.lock().unwrap().iter().map(Update::channel).collect()
        }
    }

    #[async_trait]
    impl Publisher for RecordingPublisher {
        async fn publish(&self, update: Update) {
            self.updates.lock().unwrap().push(update);
        }
    }

    fn full_config() -> PollConfig {
        let mut config = PollConfig::new(["4116"]);
        config.elevator_station_ids.insert("60201040".to_string());
        config.incident_line_ids.insert("U1".to_string());
        config
    }

    fn healthy_client() -> CannedClient {
        CannedClient::new()
            .route("/monitor", 200, MONITOR)
            .route("aufzugsinfo", 200, ELEVATORS)
            .route("stoerung", 200, INCIDENTS)
    }

    fn api<C: HttpClient>(client: C) -> WienerLinienApi<C> {
        WienerLinienApi::new(client, BASE).unwrap()
    }

    #[tokio::test]
    async fn test_cycle_publishes_all_categories() {
        let publisher = RecordingPublisher::default();
        let report = run_cycle(&api(healthy_client()), &full_config(), &publisher).await;

        assert_eq!(
            report,
            CycleReport {
                stations: SubFetchOutcome::Published,
                elevators: SubFetchOutcome::Published,
                incidents: SubFetchOutcome::Published,
            }
        );
        let mut channels = publisher.channels();
        channels.sort_by_key(|c| c.as_str());
        assert_eq!(
            channels,
            vec![Channel::Elevators, Channel::Incidents, Channel::Stations]
        );
    }

    #[tokio::test]
    async fn test_incident_failure_does_not_block_others() {
        let client = CannedClient::new()
            .route("/monitor", 200, MONITOR)
            .route("aufzugsinfo", 200, ELEVATORS)
            .route("stoerung", 500, "Internal Server Error");
        let publisher = RecordingPublisher::default();
        let report = run_cycle(&api(client), &full_config(), &publisher).await;

        assert_eq!(report.stations, SubFetchOutcome::Published);
        assert_eq!(report.elevators, SubFetchOutcome::Published);
        assert_eq!(report.incidents, SubFetchOutcome::Failed);
        assert!(!publisher.channels().contains(&Channel::Incidents));
    }

    #[tokio::test]
    async fn test_monitor_failure_does_not_block_others() {
        let client = CannedClient::new()
            .route(
                "/monitor",
                200,
                r#"{"message": {"value": "Server overloaded"}, "data": {}}"#,
            )
            .route("aufzugsinfo", 200, ELEVATORS)
            .route("stoerung", 200, INCIDENTS);
        let publisher = RecordingPublisher::default();
        let report = run_cycle(&api(client), &full_config(), &publisher).await;

        assert_eq!(report.stations, SubFetchOutcome::Failed);
        assert_eq!(report.elevators, SubFetchOutcome::Published);
        assert_eq!(report.incidents, SubFetchOutcome::Published);
    }

    #[tokio::test]
    async fn test_empty_id_sets_skip_requests() {
        let client = Arc::new(healthy_client());
        let publisher = RecordingPublisher::default();
        let report = run_cycle(&api(client.clone()), &PollConfig::new(["4116"]), &publisher).await;

        assert_eq!(report.elevators, SubFetchOutcome::Skipped);
        assert_eq!(report.incidents, SubFetchOutcome::Skipped);
        assert_eq!(client.requests().len(), 1);
        assert_eq!(publisher.channels(), vec![Channel::Stations]);
    }

    #[tokio::test]
    async fn test_short_incident_text_requested() {
        let client = Arc::new(healthy_client());
        let mut config = full_config();
        config.use_short_incident_text = true;
        run_cycle(&api(client.clone()), &config, &RecordingPublisher::default()).await;

        assert!(
            client
                .requests()
                .iter()
                .any(|url| url.contains("name=stoerungkurz&relatedLine=U1"))
        );
    }

    #[tokio::test]
    async fn test_missing_traffic_infos_publishes_empty() {
        let client = CannedClient::new()
            .route("/monitor", 200, MONITOR)
            .route("aufzugsinfo", 200, r#"{"data": {}, "message": {"value": "OK"}}"#)
            .route("stoerung", 200, r#"{"data": {}}"#);
        let publisher = RecordingPublisher::default();
        let report = run_cycle(&api(client), &full_config(), &publisher).await;

        assert_eq!(report.elevators, SubFetchOutcome::Published);
        assert_eq!(report.incidents, SubFetchOutcome::Published);
        let updates = publisher.updates.lock().unwrap();
        assert!(updates.contains(&Update::Elevators(Vec::new())));
        assert!(updates.contains(&Update::Incidents(Vec::new())));
    }

    struct StallingClient {
        inner: CannedClient,
        stall_pattern: &'static str,
    }

    #[async_trait]
    impl HttpClient for StallingClient {
        async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
            if req.url().as_str().contains(self.stall_pattern) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            self.inner.execute(req).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_request_times_out() {
        let client = StallingClient {
            inner: healthy_client(),
            stall_pattern: "aufzugsinfo",
        };
        let mut config = full_config();
        config.request_timeout_ms = 50;
        let publisher = RecordingPublisher::default();
        let report = run_cycle(&api(client), &config, &publisher).await;

        assert_eq!(report.stations, SubFetchOutcome::Published);
        assert_eq!(report.elevators, SubFetchOutcome::Failed);
        assert_eq!(report.incidents, SubFetchOutcome::Published);
    }

    #[tokio::test]
    async fn test_scheduler_polls_after_configure() {
        let client = Arc::new(healthy_client());
        let (publisher, mut rx) = ChannelPublisher::create();
        let mut scheduler = PollScheduler::new(client.clone(), Arc::new(publisher));
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        let mut config = PollConfig::new(["4116"]);
        config.api_key = Some("key".to_string());
        scheduler.configure(config).unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Polling);

        let update = rx.recv().await.unwrap();
        assert_eq!(update.channel(), Channel::Stations);
        assert!(client.requests()[0].ends_with("stopId=4116&sender=key"));

        scheduler.shutdown();
    }

    #[tokio::test]
    async fn test_second_configure_is_ignored() {
        let client = Arc::new(healthy_client());
        let publisher = Arc::new(RecordingPublisher::default());
        let mut scheduler = PollScheduler::new(client, publisher);

        scheduler.configure(PollConfig::new(["1"])).unwrap();
        scheduler.configure(PollConfig::new(["2"])).unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Polling);
        scheduler.shutdown();
    }

    #[tokio::test]
    async fn test_invalid_config_leaves_scheduler_idle() {
        let publisher = Arc::new(RecordingPublisher::default());
        let mut scheduler = PollScheduler::new(Arc::new(healthy_client()), publisher.clone());

        let mut config = PollConfig::new(["4116"]);
        config.poll_interval_ms = 0;
        assert!(scheduler.configure(config).is_err());
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        scheduler.configure(PollConfig::new(["4116"])).unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Polling);
        scheduler.shutdown();
    }

    fn assert_within_a_second(actual: Duration, expected: Duration) {
        assert!(
            actual >= expected && actual < expected + Duration::from_secs(1),
            "expected ~{expected:?}, got {actual:?}"
        );
    }

    /// Answers the first monitor request specially, everything else from `inner`.
    struct FirstMonitorClient {
        inner: CannedClient,
        first: FirstMonitor,
        monitor_requests: Mutex<Vec<Instant>>,
    }

    enum FirstMonitor {
        Unavailable,
        Stall(Duration),
    }

    impl FirstMonitorClient {
        fn new(first: FirstMonitor) -> Self {
            Self {
                inner: healthy_client(),
                first,
                monitor_requests: Mutex::new(Vec::new()),
            }
        }

        fn monitor_requests(&self) -> Vec<Instant> {
            self.monitor_requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpClient for FirstMonitorClient {
        async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
            if req.url().path().ends_with("/monitor") {
                let is_first = {
                    let mut requests = self.monitor_requests.lock().unwrap();
                    requests.push(Instant::now());
                    requests.len() == 1
                };
                if is_first {
                    match self.first {
                        FirstMonitor::Unavailable => {
                            let response = http::Response::builder()
                                .status(503)
                                .body(String::new())
                                .unwrap();
                            return Ok(reqwest::Response::from(response));
                        }
                        FirstMonitor::Stall(delay) => tokio::time::sleep(delay).await,
                    }
                }
            }
            self.inner.execute(req).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_cycle_retried_on_next_tick() {
        let client = Arc::new(FirstMonitorClient::new(FirstMonitor::Unavailable));
        let (publisher, mut rx) = ChannelPublisher::create();
        let mut scheduler = PollScheduler::new(client.clone(), Arc::new(publisher));

        let mut config = PollConfig::new(["4116"]);
        config.poll_interval_ms = 60_000;
        let start = Instant::now();
        scheduler.configure(config).unwrap();

        let update = rx.recv().await.unwrap();
        assert_eq!(update.channel(), Channel::Stations);
        assert!(start.elapsed() >= Duration::from_secs(60));

        let requests = client.monitor_requests();
        assert_eq!(requests.len(), 2);
        assert_within_a_second(requests[1] - requests[0], Duration::from_secs(60));
        scheduler.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_cycle_does_not_overlap_next() {
        let client = Arc::new(FirstMonitorClient::new(FirstMonitor::Stall(
            Duration::from_secs(100),
        )));
        let (publisher, mut rx) = ChannelPublisher::create();
        let mut scheduler = PollScheduler::new(client.clone(), Arc::new(publisher));

        let mut config = PollConfig::new(["4116"]);
        config.poll_interval_ms = 60_000;
        config.request_timeout_ms = 150_000;
        scheduler.configure(config).unwrap();

        assert_eq!(rx.recv().await.unwrap().channel(), Channel::Stations);
        assert_eq!(client.monitor_requests().len(), 1);

        assert_eq!(rx.recv().await.unwrap().channel(), Channel::Stations);
        assert_eq!(rx.recv().await.unwrap().channel(), Channel::Stations);
        let requests = client.monitor_requests();
        assert_eq!(requests.len(), 3);
        // the overdue tick fires once the first cycle is done
        assert_within_a_second(requests[1] - requests[0], Duration::from_secs(100));
        // then back on the original 60s grid
        assert_within_a_second(requests[2] - requests[0], Duration::from_secs(120));
        scheduler.shutdown();
    }
}
