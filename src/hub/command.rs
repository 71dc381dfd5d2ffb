//! Requests accepted by the hub coordinator

use tokio::sync::oneshot;

use crate::connection::{Connection, ConnectionId};
use crate::message::Message;

use super::registry::HubStatus;

/// One unit of work for the coordinator
///
/// All commands travel through a single FIFO queue, so requests made by one
/// caller are applied in the order they were issued.
pub(crate) enum Command {
    Register(Connection),
    Unregister(ConnectionId),
    Broadcast(Message),
    Status(oneshot::Sender<HubStatus>),
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Register(conn) => write!(f, "Register({})", conn.id()),
            Command::Unregister(id) => write!(f, "Unregister({})", id),
            Command::Broadcast(msg) => write!(f, "Broadcast({})", msg.namespace),
            Command::Status(_) => write!(f, "Status"),
        }
    }
}
