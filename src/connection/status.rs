//! Client metadata and per-connection status records

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use super::Connection;

/// Request details captured when a client subscribes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    /// Full request path, mount prefix included
    pub request_path: String,
    /// Client address, preferring proxy headers over the socket peer
    pub remote_addr: String,
    pub user_agent: String,
}

impl ClientInfo {
    pub fn new(
        request_path: impl Into<String>,
        remote_addr: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            request_path: request_path.into(),
            remote_addr: remote_addr.into(),
            user_agent: user_agent.into(),
        }
    }
}

/// Reporting snapshot of a single connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    #[serde(rename = "request_path")]
    pub path: String,
    pub namespace: String,
    /// Unix seconds
    #[serde(rename = "created_at")]
    pub created: i64,
    pub client_ip: String,
    pub user_agent: String,
    pub msgs_sent: u64,
}

impl ConnectionStatus {
    pub(super) fn new(conn: &Connection) -> Self {
        let client = conn.client();
        Self {
            path: client.request_path.clone(),
            namespace: conn.namespace().to_owned(),
            created: unix_secs(conn.created_at()),
            client_ip: client.remote_addr.clone(),
            user_agent: client.user_agent.clone(),
            msgs_sent: conn.msgs_sent(),
        }
    }
}

/// Seconds since the Unix epoch, zero for earlier times
pub(crate) fn unix_secs(t: SystemTime) -> i64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
