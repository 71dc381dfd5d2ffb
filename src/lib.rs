//! # sse-hub
//!
//! A namespaced Server-Sent Events broadcast server.
//!
//! Clients subscribe over HTTP to a hierarchical namespace such as
//! `/pets/cats`; messages published to a namespace are streamed to every
//! client subscribed to it or to one of its ancestors (`/pets`, `/`).
//!
//! ```text
//!  publisher ──broadcast()──► Hub ──► Router (namespace tree)
//!                              │
//!               ┌──────────────┼──────────────┐
//!               ▼              ▼              ▼
//!          Connection     Connection     Connection ──► HTTP response
//! ```
//!
//! Delivery is best effort: a client whose outbound queue fills up is
//! disconnected rather than slowing down the publisher or other clients.
//! Message IDs, replay and acknowledgements are not supported.
//!
//! ## Example
//!
//! ```no_run
//! use sse_hub::{Message, Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> sse_hub::Result<()> {
//!     let server = Server::new(ServerConfig::default())?;
//!
//!     let publisher = server.publisher();
//!     tokio::spawn(async move {
//!         loop {
//!             publisher.publish(Message::new("/time", "tick"));
//!             tokio::time::sleep(std::time::Duration::from_secs(1)).await;
//!         }
//!     });
//!
//!     // GET /subscribe/time
//!     server.serve().await
//! }
//! ```

pub mod connection;
pub mod error;
pub mod hub;
pub mod message;
pub mod router;
pub mod server;
pub mod stats;

pub use connection::{ClientInfo, CloseReason, Connection, ConnectionStatus};
pub use error::{Error, Result};
pub use hub::{Hub, HubStatus, Publisher};
pub use message::Message;
pub use router::Namespace;
pub use server::{Server, ServerConfig};
pub use stats::ReportingStatus;
