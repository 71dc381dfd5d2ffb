//! Subscriber connections
//!
//! A [`Connection`] is one subscribed client. The hub pushes rendered
//! messages onto its bounded outbound queue; [`Connection::run`] is the only
//! reader of that queue and the only writer to the client's stream.
//!
//! ```text
//!   Hub ──push()──► [ bounded queue ] ──run()──► AsyncWrite ──► client
//!    │                                   ▲
//!    └────────close()────────────────────┘
//! ```
//!
//! Closing a connection is how the hub evicts it: the delivery loop observes
//! the close and returns, which lets the HTTP request finish.

pub mod status;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::message::KEEPALIVE;
use crate::router::Namespace;

pub use status::{ClientInfo, ConnectionStatus};

/// Default capacity of a connection's outbound queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Default interval between keepalive comments
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(15);

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique connection identifier, increasing with creation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a delivery loop returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The hub closed the queue (eviction or shutdown)
    Closed,
    /// The request was cancelled by the transport
    Cancelled,
    /// Writing to the client failed
    WriteFailed,
}

/// Failure to enqueue onto a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PushError {
    /// Queue is at capacity: the client is not keeping up
    Full,
    /// Connection was already closed
    Closed,
}

struct Shared {
    id: ConnectionId,
    namespace: String,
    target: Namespace,
    created_at: SystemTime,
    client: ClientInfo,
    tx: mpsc::Sender<Bytes>,
    closed: CancellationToken,
    msgs_sent: AtomicU64,
}

/// Handle to one subscriber
///
/// Cheap to clone; clones refer to the same connection and compare equal.
#[derive(Clone)]
pub struct Connection {
    shared: Arc<Shared>,
}

/// Receiving half of a connection's outbound queue
///
/// Consumed by [`Connection::run`].
pub struct Outbound {
    rx: mpsc::Receiver<Bytes>,
}

impl Outbound {
    /// Number of messages waiting to be written
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl Connection {
    /// Create a connection subscribed to `namespace`
    ///
    /// The namespace is kept verbatim for reporting and parsed for routing.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(
        namespace: impl Into<String>,
        client: ClientInfo,
        capacity: usize,
    ) -> (Self, Outbound) {
        let (tx, rx) = mpsc::channel(capacity);
        let namespace = namespace.into();
        let target = Namespace::parse(&namespace);

        let shared = Shared {
            id: ConnectionId::next(),
            namespace,
            target,
            created_at: SystemTime::now(),
            client,
            tx,
            closed: CancellationToken::new(),
            msgs_sent: AtomicU64::new(0),
        };

        (
            Self {
                shared: Arc::new(shared),
            },
            Outbound { rx },
        )
    }

    pub fn id(&self) -> ConnectionId {
        self.shared.id
    }

    /// Namespace as requested by the client
    pub fn namespace(&self) -> &str {
        &self.shared.namespace
    }

    /// Parsed namespace used for routing
    pub fn target(&self) -> &Namespace {
        &self.shared.target
    }

    pub fn created_at(&self) -> SystemTime {
        self.shared.created_at
    }

    pub fn client(&self) -> &ClientInfo {
        &self.shared.client
    }

    /// Messages written to the client so far (keepalives excluded)
    pub fn msgs_sent(&self) -> u64 {
        self.shared.msgs_sent.load(Ordering::Relaxed)
    }

    /// Whether the hub has closed this connection
    pub fn is_closed(&self) -> bool {
        self.shared.closed.is_cancelled()
    }

    /// Snapshot for status reporting
    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus::new(self)
    }

    /// Enqueue a rendered message without waiting
    pub(crate) fn push(&self, payload: Bytes) -> Result<(), PushError> {
        if self.is_closed() {
            return Err(PushError::Closed);
        }
        self.shared.tx.try_send(payload).map_err(|e| match e {
            TrySendError::Full(_) => PushError::Full,
            TrySendError::Closed(_) => PushError::Closed,
        })
    }

    /// Close the outbound queue, ending the delivery loop. Idempotent.
    pub(crate) fn close(&self) {
        self.shared.closed.cancel();
    }

    /// Delivery loop
    ///
    /// Writes queued messages to `writer`, flushing after each one, and a
    /// keepalive comment every `keepalive`. Returns when the hub
    /// closes the connection, `cancel` fires, or a write fails. Messages
    /// still queued at that point are dropped.
    pub async fn run<W>(
        &self,
        outbound: Outbound,
        mut writer: W,
        keepalive: Duration,
        cancel: CancellationToken,
    ) -> CloseReason
    where
        W: AsyncWrite + Unpin,
    {
        let mut rx = outbound.rx;
        let mut ticker = time::interval_at(Instant::now() + keepalive, keepalive);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let reason = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break CloseReason::Cancelled,
                _ = self.shared.closed.cancelled() => break CloseReason::Closed,
                payload = rx.recv() => {
                    let Some(payload) = payload else {
                        break CloseReason::Closed;
                    };
                    if let Err(reason) = self.write(&mut writer, &payload, &cancel).await {
                        break reason;
                    }
                    self.shared.msgs_sent.fetch_add(1, Ordering::Relaxed);
                }
                _ = ticker.tick() => {
                    if let Err(reason) = self.write(&mut writer, KEEPALIVE, &cancel).await {
                        break reason;
                    }
                }
            }
        };

        rx.close();

        tracing::debug!(
            conn_id = %self.id(),
            namespace = %self.namespace(),
            reason = ?reason,
            msgs_sent = self.msgs_sent(),
            "Delivery loop finished"
        );

        reason
    }

    /// Write and flush one frame, giving up early if the connection is
    /// closed or cancelled while the client is not reading.
    async fn write<W>(
        &self,
        writer: &mut W,
        frame: &[u8],
        cancel: &CancellationToken,
    ) -> Result<(), CloseReason>
    where
        W: AsyncWrite + Unpin,
    {
        let io = async {
            writer.write_all(frame).await?;
            writer.flush().await
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CloseReason::Cancelled),
            _ = self.shared.closed.cancelled() => Err(CloseReason::Closed),
            result = io => result.map_err(|e| {
                tracing::debug!(conn_id = %self.id(), error = %e, "Write to client failed");
                CloseReason::WriteFailed
            }),
        }
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        self.shared.id == other.shared.id
    }
}

impl Eq for Connection {}

impl Hash for Connection {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.shared.id.hash(state);
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.shared.id)
            .field("namespace", &self.shared.namespace)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{duplex, AsyncReadExt};

    use super::*;

    fn conn(namespace: &str, capacity: usize) -> (Connection, Outbound) {
        Connection::new(namespace, ClientInfo::default(), capacity)
    }

    #[test]
    fn test_identity() {
        let (a, _rx_a) = conn("/a", 4);
        let (b, _rx_b) = conn("/a", 4);

        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert!(a.id() < b.id());
        assert_eq!(a.target(), &Namespace::parse("a"));
    }

    #[test]
    fn test_push_until_full() {
        let (c, rx) = conn("/a", 2);

        assert_eq!(c.push(Bytes::from_static(b"1")), Ok(()));
        assert_eq!(c.push(Bytes::from_static(b"2")), Ok(()));
        assert_eq!(c.push(Bytes::from_static(b"3")), Err(PushError::Full));
        assert_eq!(rx.len(), 2);
    }

    #[test]
    fn test_push_after_close() {
        let (c, rx) = conn("/a", 2);
        c.close();
        c.close();

        assert!(c.is_closed());
        assert_eq!(c.push(Bytes::from_static(b"1")), Err(PushError::Closed));
        assert!(rx.is_empty());
    }

    #[tokio::test]
    async fn test_run_writes_messages_in_order() {
        let (c, outbound) = conn("/a", 8);
        let (writer, mut reader) = duplex(1024);

        c.push(Bytes::from_static(b"data:one\n\n")).unwrap();
        c.push(Bytes::from_static(b"data:two\n\n")).unwrap();

        let task = {
            let c = c.clone();
            tokio::spawn(async move {
                c.run(outbound, writer, DEFAULT_KEEPALIVE_INTERVAL, CancellationToken::new())
                    .await
            })
        };

        let mut buf = vec![0u8; 20];
        reader.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"data:one\n\ndata:two\n\n");

        c.close();
        assert_eq!(task.await.unwrap(), CloseReason::Closed);
        assert_eq!(c.msgs_sent(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keepalive_is_not_counted() {
        let (c, outbound) = conn("/a", 8);
        let (writer, mut reader) = duplex(1024);
        let cancel = CancellationToken::new();

        let task = {
            let c = c.clone();
            let cancel = cancel.clone();
            tokio::spawn(
                async move { c.run(outbound, writer, Duration::from_secs(15), cancel).await },
            )
        };

        let mut buf = vec![0u8; KEEPALIVE.len()];
        reader.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, KEEPALIVE);
        assert_eq!(c.msgs_sent(), 0);

        cancel.cancel();
        assert_eq!(task.await.unwrap(), CloseReason::Cancelled);
    }

    #[tokio::test]
    async fn test_run_ends_on_write_failure() {
        let (c, outbound) = conn("/a", 8);
        let (writer, reader) = duplex(64);
        drop(reader);

        c.push(Bytes::from_static(b"data:lost\n\n")).unwrap();
        let reason = c
            .run(outbound, writer, DEFAULT_KEEPALIVE_INTERVAL, CancellationToken::new())
            .await;

        assert_eq!(reason, CloseReason::WriteFailed);
        assert_eq!(c.msgs_sent(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_ends_on_keepalive_write_failure() {
        let (c, outbound) = conn("/a", 8);
        let (writer, reader) = duplex(64);
        drop(reader);

        let reason = c
            .run(outbound, writer, DEFAULT_KEEPALIVE_INTERVAL, CancellationToken::new())
            .await;

        assert_eq!(reason, CloseReason::WriteFailed);
        assert_eq!(c.msgs_sent(), 0);
    }

    #[tokio::test]
    async fn test_close_unblocks_stalled_writer() {
        let (c, outbound) = conn("/a", 8);
        // reader is kept but never read, so the pipe fills up
        let (writer, _reader) = duplex(4);

        c.push(Bytes::from_static(b"data:too big for the pipe\n\n"))
            .unwrap();

        let task = {
            let c = c.clone();
            tokio::spawn(async move {
                c.run(outbound, writer, DEFAULT_KEEPALIVE_INTERVAL, CancellationToken::new())
                    .await
            })
        };

        tokio::task::yield_now().await;
        c.close();

        assert_eq!(task.await.unwrap(), CloseReason::Closed);
    }

    #[tokio::test]
    async fn test_cancel_before_run() {
        let (c, outbound) = conn("/a", 8);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let reason = c
            .run(outbound, tokio::io::sink(), DEFAULT_KEEPALIVE_INTERVAL, cancel)
            .await;
        assert_eq!(reason, CloseReason::Cancelled);
    }
}
