//! Hierarchical namespace paths
//!
//! A namespace is the slash-delimited topic a client subscribes to and a
//! message is published on, e.g. `/pets/cats`.

use std::fmt;

/// Parsed namespace path
///
/// The root namespace is the empty segment list. Namespaces compare by
/// segment, so `/pets` is an ancestor of `/pets/cats` but not of `/petshop`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Namespace(Vec<String>);

impl Namespace {
    /// The root namespace
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Parse a slash-delimited string
    ///
    /// Leading, trailing and repeated slashes are ignored, as is surrounding
    /// whitespace. Any input is accepted; blank input yields the root.
    pub fn parse(s: &str) -> Self {
        let segments = s
            .trim_matches(|c: char| c == '/' || c == ' ')
            .split('/')
            .filter(|seg| !seg.is_empty())
            .map(str::to_owned)
            .collect();
        Self(segments)
    }

    /// Path segments, outermost first
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Number of segments (0 for the root)
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `self` equals `other` or is one of its ancestors
    pub fn is_prefix_of(&self, other: &Namespace) -> bool {
        other.0.starts_with(&self.0)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0.join("/"))
    }
}

impl From<&str> for Namespace {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl From<Vec<String>> for Namespace {
    fn from(segments: Vec<String>) -> Self {
        Self(segments)
    }
}
