//! Namespace tree
//!
//! Nodes live in an arena and reference each other by [`NodeId`], so every
//! node can reach both its parent and its children without shared ownership.
//! The tree only grows: removing the last value from a node leaves the node
//! in place. Distinct namespaces are expected to be few compared to the
//! number of connections coming and going.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use super::namespace::Namespace;

/// Handle to a node inside a [`Router`]
///
/// Only meaningful for the router that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

const ROOT: NodeId = NodeId(0);

struct Node<V> {
    key: String,
    parent: Option<NodeId>,
    children: HashMap<String, NodeId>,
    values: HashSet<V>,
}

impl<V> Node<V> {
    fn new(parent: Option<NodeId>, key: String) -> Self {
        Self {
            key,
            parent,
            children: HashMap::new(),
            values: HashSet::new(),
        }
    }
}

/// Tree index from namespace to the set of values registered there
pub struct Router<V> {
    nodes: Vec<Node<V>>,
}

impl<V: Eq + Hash> Router<V> {
    /// Create a tree holding only the root node
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new(None, String::new())],
        }
    }

    /// The root node (namespace `/`)
    pub fn root(&self) -> NodeId {
        ROOT
    }

    /// Number of nodes in the tree, root included
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Return the node for `ns`, creating it and any missing ancestors
    pub fn find_or_create(&mut self, ns: &Namespace) -> NodeId {
        let mut current = ROOT;
        for segment in ns.segments() {
            current = match self.nodes[current.0].children.get(segment) {
                Some(&child) => child,
                None => {
                    let child = NodeId(self.nodes.len());
                    self.nodes.push(Node::new(Some(current), segment.clone()));
                    self.nodes[current.0].children.insert(segment.clone(), child);
                    child
                }
            };
        }
        current
    }

    /// Return the node for `ns` if every segment exists
    pub fn find(&self, ns: &Namespace) -> Option<NodeId> {
        ns.segments().iter().try_fold(ROOT, |node, segment| {
            self.nodes[node.0].children.get(segment).copied()
        })
    }

    /// Return the deepest existing node along `ns`
    ///
    /// Falls back to the root when not even the first segment exists.
    pub fn find_nearest(&self, ns: &Namespace) -> NodeId {
        let mut current = ROOT;
        for segment in ns.segments() {
            match self.nodes[current.0].children.get(segment) {
                Some(&child) => current = child,
                None => break,
            }
        }
        current
    }

    /// Add a value to a node. Returns false if it was already present.
    pub fn insert(&mut self, node: NodeId, value: V) -> bool {
        self.nodes[node.0].values.insert(value)
    }

    /// Add a value at `ns`, creating the node if needed
    pub fn insert_at(&mut self, ns: &Namespace, value: V) -> NodeId {
        let node = self.find_or_create(ns);
        self.insert(node, value);
        node
    }

    /// Remove a value from a node. Removing an absent value is a no-op.
    pub fn remove(&mut self, node: NodeId, value: &V) -> bool {
        self.nodes[node.0].values.remove(value)
    }

    /// Values registered exactly at `node`
    pub fn values(&self, node: NodeId) -> impl Iterator<Item = &V> + '_ {
        self.nodes[node.0].values.iter()
    }

    /// Segment key of a node (empty for the root)
    pub fn key(&self, node: NodeId) -> &str {
        &self.nodes[node.0].key
    }

    /// Full namespace of a node, rebuilt by walking up to the root
    pub fn namespace(&self, node: NodeId) -> Namespace {
        let mut segments: Vec<String> = self
            .ascend(node)
            .filter(|&id| id != ROOT)
            .map(|id| self.nodes[id.0].key.clone())
            .collect();
        segments.reverse();
        Namespace::from(segments)
    }

    /// Direct children of a node
    pub fn children(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes[node.0].children.values().copied()
    }

    /// Strict ancestors of a node, nearest first, ending with the root
    pub fn ancestors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.ascend(node).skip(1)
    }

    /// Strict descendants of a node, depth first
    pub fn descendants(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.descend(node).skip(1)
    }

    /// Values at `node` and at every ancestor up to the root
    ///
    /// This is the delivery set for a message published at `node`.
    pub fn ascending_values(&self, node: NodeId) -> impl Iterator<Item = &V> + '_ {
        self.ascend(node)
            .flat_map(move |id| self.nodes[id.0].values.iter())
    }

    /// Values at `node` and at every descendant
    pub fn descending_values(&self, node: NodeId) -> impl Iterator<Item = &V> + '_ {
        self.descend(node)
            .flat_map(move |id| self.nodes[id.0].values.iter())
    }

    fn ascend(&self, node: NodeId) -> Ascend<'_, V> {
        Ascend {
            router: self,
            next: Some(node),
        }
    }

    fn descend(&self, node: NodeId) -> Descend<'_, V> {
        Descend {
            router: self,
            stack: vec![node],
        }
    }
}

impl<V: Eq + Hash> Default for Router<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Walks from a node up to the root, node itself first
struct Ascend<'a, V> {
    router: &'a Router<V>,
    next: Option<NodeId>,
}

impl<V> Iterator for Ascend<'_, V> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.router.nodes[current.0].parent;
        Some(current)
    }
}

/// Depth-first walk of a subtree, subtree root first
struct Descend<'a, V> {
    router: &'a Router<V>,
    stack: Vec<NodeId>,
}

impl<V> Iterator for Descend<'_, V> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.stack.pop()?;
        self.stack
            .extend(self.router.nodes[current.0].children.values().copied());
        Some(current)
    }
}
