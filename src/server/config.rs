//! Server configuration

use std::net::SocketAddr;
use std::time::Duration;

use axum::http::HeaderValue;

use crate::connection::{DEFAULT_KEEPALIVE_INTERVAL, DEFAULT_QUEUE_CAPACITY};
use crate::error::{Error, Result};

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Path under which subscriptions are accepted; the rest of the request
    /// path is the namespace
    pub mount_path: String,

    /// Outbound queue capacity per connection. A client that falls this
    /// many messages behind is disconnected.
    pub queue_capacity: usize,

    /// Interval between keepalive comments on idle streams
    pub keepalive_interval: Duration,

    /// Value for `Access-Control-Allow-Origin` (header omitted if `None`)
    pub cors_allow_origin: Option<String>,

    /// Maximum concurrent subscribers (0 = unlimited)
    pub max_connections: usize,

    /// Serve `/admin/status.json`
    pub admin_enabled: bool,

    /// Size of the in-memory pipe between a delivery loop and its response
    /// body
    pub write_buffer_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            mount_path: "/subscribe".to_string(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            cors_allow_origin: None,
            max_connections: 0, // Unlimited
            admin_enabled: true,
            write_buffer_size: 16 * 1024, // 16KB
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the subscription mount path. A trailing slash is ignored.
    pub fn mount_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.mount_path = path.trim_end_matches('/').to_string();
        self
    }

    /// Set the per-connection queue capacity
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the keepalive interval
    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    /// Send `Access-Control-Allow-Origin` with this value
    pub fn cors_allow_origin(mut self, origin: impl Into<String>) -> Self {
        self.cors_allow_origin = Some(origin.into());
        self
    }

    /// Set maximum concurrent subscribers
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Disable the admin status endpoint
    pub fn disable_admin(mut self) -> Self {
        self.admin_enabled = false;
        self
    }

    /// Check values the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(Error::Config("queue_capacity must be at least 1".into()));
        }
        if self.keepalive_interval.is_zero() {
            return Err(Error::Config("keepalive_interval must be non-zero".into()));
        }
        if self.write_buffer_size == 0 {
            return Err(Error::Config("write_buffer_size must be at least 1".into()));
        }
        if !self.mount_path.is_empty() && !self.mount_path.starts_with('/') {
            return Err(Error::Config(format!(
                "mount_path must start with '/': {}",
                self.mount_path
            )));
        }
        if let Some(ref origin) = self.cors_allow_origin {
            if HeaderValue::from_str(origin).is_err() {
                return Err(Error::Config(format!(
                    "cors_allow_origin is not a valid header value: {}",
                    origin
                )));
            }
        }
        Ok(())
    }
}
