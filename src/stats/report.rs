//! Server status report served by the admin endpoint

use std::env;
use std::time::{Duration, SystemTime};

use serde::Serialize;

use crate::connection::status::unix_secs;
use crate::connection::ConnectionStatus;
use crate::hub::HubStatus;

/// Platform tag in the node name
const PLATFORM: &str = "rust";

/// Snapshot of a server's state, serialized as the admin JSON document
#[derive(Debug, Clone, Serialize)]
pub struct ReportingStatus {
    /// `<platform>-<env>-<host>`
    pub node: String,
    /// `OK` while running, `SHUTDOWN` once the hub has stopped
    pub status: String,
    /// Unix seconds
    #[serde(rename = "reported_at")]
    pub reported: i64,
    /// Unix seconds
    pub startup_time: i64,
    #[serde(rename = "msgs_broadcast")]
    pub sent_msgs: u64,
    /// Oldest connection first
    pub connections: Vec<ConnectionStatus>,
    #[serde(skip)]
    started_at: SystemTime,
}

impl ReportingStatus {
    /// Build a report from a live hub snapshot
    pub fn from_hub(hub: HubStatus) -> Self {
        Self::build("OK", hub.started_at, hub.sent_msgs, hub.connections)
    }

    /// Report for a hub that is no longer running
    pub fn shut_down(started_at: SystemTime) -> Self {
        Self::build("SHUTDOWN", started_at, 0, Vec::new())
    }

    fn build(
        status: &str,
        started_at: SystemTime,
        sent_msgs: u64,
        connections: Vec<ConnectionStatus>,
    ) -> Self {
        Self {
            node: format!("{}-{}-{}", PLATFORM, environment(), node_name()),
            status: status.to_owned(),
            reported: unix_secs(SystemTime::now()),
            startup_time: unix_secs(started_at),
            sent_msgs,
            connections,
            started_at,
        }
    }

    /// Time since the hub started
    pub fn uptime(&self) -> Duration {
        SystemTime::now()
            .duration_since(self.started_at)
            .unwrap_or_default()
    }

    pub fn is_ok(&self) -> bool {
        self.status == "OK"
    }
}

/// Host identity: `$DYNO` (Heroku), then `$HOSTNAME`, then `unknown`
fn node_name() -> String {
    ["DYNO", "HOSTNAME"]
        .iter()
        .filter_map(|key| env::var(key).ok())
        .find(|v| !v.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Deployment environment from `$SSE_HUB_ENV`, default `development`
fn environment() -> String {
    env::var("SSE_HUB_ENV")
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "development".to_string())
}
