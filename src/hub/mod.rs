//! Connection hub
//!
//! The hub is the single authority over which connections exist and which
//! namespace each one listens on. A coordinator task owns the registry and
//! router outright; everything else talks to it through one command queue:
//!
//! ```text
//!   register ──┐
//! unregister ──┼──► [ unbounded FIFO ] ──► coordinator ──► Registry + Router
//!  broadcast ──┤                              │
//!     status ──┘                              └─push()─► Connection queues
//! ```
//!
//! No locks guard the registry because nothing else can reach it.
//!
//! # Backpressure
//!
//! Publishing never blocks. When a connection's outbound queue is full at
//! broadcast time the connection is evicted: removed from the registry and
//! its queue closed, which ends its HTTP response. Other subscribers of the
//! same namespace are unaffected.

mod command;
pub mod coordinator;
pub mod registry;

pub use coordinator::{Hub, Publisher};
pub use registry::HubStatus;
