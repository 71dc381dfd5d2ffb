//! Hub state: the connection registry and namespace router
//!
//! Plain synchronous state, owned and mutated by the coordinator task only.

use std::collections::HashMap;
use std::time::SystemTime;

use crate::connection::{Connection, ConnectionId, ConnectionStatus, PushError};
use crate::message::Message;
use crate::router::{NodeId, Router};

use super::command::Command;

/// Snapshot of hub state for reporting
#[derive(Debug, Clone)]
pub struct HubStatus {
    /// When the hub was started
    pub started_at: SystemTime,
    /// Messages broadcast since startup
    pub sent_msgs: u64,
    /// Live connections, oldest first
    pub connections: Vec<ConnectionStatus>,
}

impl HubStatus {
    /// Number of registered connections
    pub fn subscriber_count(&self) -> usize {
        self.connections.len()
    }
}

pub(crate) struct Registry {
    connections: HashMap<ConnectionId, (Connection, NodeId)>,
    router: Router<Connection>,
    sent_msgs: u64,
    started_at: SystemTime,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            connections: HashMap::new(),
            router: Router::new(),
            sent_msgs: 0,
            started_at: SystemTime::now(),
        }
    }

    pub(crate) fn apply(&mut self, command: Command) {
        match command {
            Command::Register(conn) => self.register(conn),
            Command::Unregister(id) => {
                self.unregister(id);
            }
            Command::Broadcast(msg) => {
                self.broadcast(&msg);
            }
            Command::Status(reply) => {
                // requester may have given up waiting
                let _ = reply.send(self.status());
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.connections.len()
    }

    pub(crate) fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    /// Add a connection. Registering twice keeps a single entry.
    pub(crate) fn register(&mut self, conn: Connection) {
        if self.contains(conn.id()) {
            tracing::debug!(conn_id = %conn.id(), "Connection already registered");
            return;
        }
        if conn.is_closed() {
            tracing::debug!(conn_id = %conn.id(), "Ignoring registration of closed connection");
            return;
        }

        let node = self.router.insert_at(conn.target(), conn.clone());

        tracing::debug!(
            conn_id = %conn.id(),
            namespace = %conn.target(),
            subscribers = self.connections.len() + 1,
            "Connection registered"
        );

        self.connections.insert(conn.id(), (conn, node));
    }

    /// Remove a connection from registry and router. No-op if absent.
    pub(crate) fn unregister(&mut self, id: ConnectionId) -> Option<Connection> {
        let (conn, node) = self.connections.remove(&id)?;
        self.router.remove(node, &conn);

        tracing::debug!(
            conn_id = %id,
            namespace = %conn.target(),
            subscribers = self.connections.len(),
            "Connection unregistered"
        );

        Some(conn)
    }

    /// Unregister a connection, then close its queue so its delivery loop
    /// ends. Unregistering first guarantees nothing is pushed after close.
    pub(crate) fn evict(&mut self, id: ConnectionId) {
        if let Some(conn) = self.unregister(id) {
            conn.close();
        }
    }

    /// Fan a message out to every subscriber at or above its namespace
    ///
    /// Subscribers whose queue is full are evicted; the publisher never
    /// waits. Returns the number of connections the message was queued on.
    pub(crate) fn broadcast(&mut self, msg: &Message) -> usize {
        self.sent_msgs += 1;

        let payload = msg.sse_format();
        let node = self.router.find_nearest(&msg.target());

        let mut delivered = 0;
        let mut dead = Vec::new();
        for conn in self.router.ascending_values(node) {
            match conn.push(payload.clone()) {
                Ok(()) => delivered += 1,
                Err(PushError::Full) => {
                    tracing::warn!(
                        conn_id = %conn.id(),
                        namespace = %conn.target(),
                        "Outbound queue full, evicting slow consumer"
                    );
                    dead.push(conn.id());
                }
                Err(PushError::Closed) => dead.push(conn.id()),
            }
        }

        for id in dead {
            self.evict(id);
        }

        delivered
    }

    /// Evict every registered connection
    pub(crate) fn close_all(&mut self) {
        tracing::debug!(
            subscribers = self.connections.len(),
            "Closing all connections"
        );

        let ids: Vec<ConnectionId> = self.connections.keys().copied().collect();
        for id in ids {
            self.evict(id);
        }
    }

    pub(crate) fn status(&self) -> HubStatus {
        let mut conns: Vec<&Connection> = self.connections.values().map(|(c, _)| c).collect();
        conns.sort_by_key(|c| c.id());

        HubStatus {
            started_at: self.started_at,
            sent_msgs: self.sent_msgs,
            connections: conns.into_iter().map(Connection::status).collect(),
        }
    }
}
