//! Hand-off of normalized snapshots to the display layer.
//!
//! Delivery is best effort: a publisher never reports failure back to the
//! engine, it logs and moves on.

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::model::{ElevatorNotice, IncidentNotice, StationMap};

/// Logical channel an update is emitted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Stations,
    Elevators,
    Incidents,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Stations => "STATIONS",
            Channel::Elevators => "ELEVATORS",
            Channel::Incidents => "INCIDENTS",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The latest snapshot of one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Update {
    Stations(StationMap),
    Elevators(Vec<ElevatorNotice>),
    Incidents(Vec<IncidentNotice>),
}

impl Update {
    pub fn channel(&self) -> Channel {
        match self {
            Update::Stations(_) => Channel::Stations,
            Update::Elevators(_) => Channel::Elevators,
            Update::Incidents(_) => Channel::Incidents,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Update::Stations(stations) => stations.len(),
            Update::Elevators(elevators) => elevators.len(),
            Update::Incidents(incidents) => incidents.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, update: Update);
}

/// Forwards updates into an unbounded channel.
pub struct ChannelPublisher {
    sender: mpsc::UnboundedSender<Update>,
}

impl ChannelPublisher {
    pub fn new(sender: mpsc::UnboundedSender<Update>) -> Self {
        Self { sender }
    }

    /// Returns the publisher together with the receiving end for the display layer.
    pub fn create() -> (Self, mpsc::UnboundedReceiver<Update>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl Publisher for ChannelPublisher {
    async fn publish(&self, update: Update) {
        let channel = update.channel();
        if self.sender.send(update).is_err() {
            warn!(%channel, "Receiver dropped, update discarded");
        } else {
            debug!(%channel, "Update sent");
        }
    }
}

/// Logs each update as JSON.
#[derive(Debug, Default)]
pub struct LogPublisher {
    pub pretty: bool,
}

#[async_trait]
impl Publisher for LogPublisher {
    async fn publish(&self, update: Update) {
        let channel = update.channel();
        let json = if self.pretty {
            serde_json::to_string_pretty(&update)
        } else {
            serde_json::to_string(&update)
        };
        match json {
            Ok(json) => info!(%channel, entries = update.len(), "{}", json),
            Err(e) => warn!(%channel, error = %e, "Failed to serialize update"),
        }
    }
}
