//! Hub handle and coordinator task

use std::time::SystemTime;

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::message::Message;

use super::command::Command;
use super::registry::{HubStatus, Registry};

/// Handle to a running hub
///
/// Every method hands a request to the coordinator task and returns without
/// waiting for the registry to change, except [`Hub::status`] and
/// [`Hub::shutdown`] which wait for the coordinator to answer.
///
/// Dropping the hub stops the coordinator and closes all connections.
pub struct Hub {
    tx: mpsc::UnboundedSender<Command>,
    shutdown: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
    started_at: SystemTime,
}

impl Hub {
    /// Start a hub on the current tokio runtime
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let registry = Registry::new();
        let started_at = registry.status().started_at;

        let task = tokio::spawn(run(rx, shutdown.clone(), registry));

        Self {
            tx,
            shutdown,
            task: Mutex::new(Some(task)),
            started_at,
        }
    }

    /// Subscribe a connection at its namespace. Idempotent.
    ///
    /// If the hub is already stopped the connection is closed instead.
    pub fn register(&self, conn: Connection) {
        if let Err(mpsc::error::SendError(Command::Register(conn))) =
            self.tx.send(Command::Register(conn))
        {
            tracing::debug!(conn_id = %conn.id(), "Hub stopped, closing new connection");
            conn.close();
        }
    }

    /// Remove a connection. Safe to call for connections already evicted.
    pub fn unregister(&self, conn: &Connection) {
        let _ = self.tx.send(Command::Unregister(conn.id()));
    }

    /// Queue a message for delivery. Never blocks.
    pub fn broadcast(&self, msg: Message) {
        if self.tx.send(Command::Broadcast(msg)).is_err() {
            tracing::debug!("Hub stopped, dropping message");
        }
    }

    /// A cloneable handle for publishing into this hub
    pub fn publisher(&self) -> Publisher {
        Publisher {
            tx: self.tx.clone(),
        }
    }

    /// When the hub was started
    pub fn started_at(&self) -> SystemTime {
        self.started_at
    }

    /// Consistent snapshot of the registry, taken by the coordinator
    pub async fn status(&self) -> Result<HubStatus> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Command::Status(reply_tx))
            .map_err(|_| Error::HubClosed)?;
        reply_rx.await.map_err(|_| Error::HubClosed)
    }

    /// Whether shutdown has been requested
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Close every connection and stop the coordinator. Idempotent.
    ///
    /// Waits for the coordinator to finish, not for each connection's
    /// delivery loop to unwind.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();

        // Held across the await so concurrent callers wait for the coordinator
        let mut task = self.task.lock().await;
        if let Some(task) = task.take() {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Hub coordinator task failed");
            }
        }
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Hub {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Publishing side of a hub
///
/// Outlives nothing: once the hub is shut down, published messages are
/// silently dropped.
#[derive(Clone)]
pub struct Publisher {
    tx: mpsc::UnboundedSender<Command>,
}

impl Publisher {
    /// Queue a message for delivery. Never blocks.
    pub fn publish(&self, msg: Message) {
        if self.tx.send(Command::Broadcast(msg)).is_err() {
            tracing::debug!("Hub stopped, dropping message");
        }
    }
}

/// Coordinator loop: the only code that touches the registry
async fn run(
    mut rx: mpsc::UnboundedReceiver<Command>,
    shutdown: CancellationToken,
    mut registry: Registry,
) {
    tracing::debug!("Hub coordinator started");

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            command = rx.recv() => match command {
                Some(command) => registry.apply(command),
                None => break,
            },
        }
    }

    tracing::info!(
        subscribers = registry.len(),
        "Hub shutting down, closing connections"
    );
    registry.close_all();

    // Registrations that raced with shutdown still need their requests to end
    rx.close();
    while let Ok(command) = rx.try_recv() {
        if let Command::Register(conn) = command {
            conn.close();
        }
    }

    tracing::debug!("Hub coordinator stopped");
}
