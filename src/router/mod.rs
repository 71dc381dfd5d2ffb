//! Namespace routing
//!
//! Maps hierarchical namespaces to the subscribers registered at them.
//!
//! # Delivery rule
//!
//! A subscriber at namespace `N` receives every message published to `N` or
//! to any namespace below it. Publishing to `/pets/cats` therefore reaches
//! subscribers at `/pets/cats`, `/pets` and `/`, found by walking up the tree
//! from the target node:
//!
//! ```text
//!            /            <- ascending_values(cats) visits
//!          /   \
//!       pets   kids
//!       /  \
//!    cats  dogs
//!     ^
//!   publish
//! ```
//!
//! The cost of resolving a publish is proportional to namespace depth, not
//! to the number of connected subscribers.

pub mod namespace;
pub mod tree;

pub use namespace::Namespace;
pub use tree::{NodeId, Router};
