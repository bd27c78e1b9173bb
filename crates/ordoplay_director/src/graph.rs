// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph: a named container of nodes and nested sub-graphs.
//!
//! Graphs do not own their nodes; the [`Script`](crate::script::Script)
//! arena does. A graph records which node IDs it contains, partitioned by
//! kind, so the engine can tick and enumerate them in a stable order.

use crate::node::{NodeId, NodeKind};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphId(pub Uuid);

impl GraphId {
    /// Create a new random graph ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GraphId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A graph
#[derive(Debug, Clone)]
pub struct Graph {
    id: GraphId,
    /// Graph name
    pub name: String,
    /// Disabled graphs disable every node they contain, recursively
    pub enabled: bool,
    /// Free-form comment
    pub comment: String,
    /// Editor position of the graph's node in its parent
    pub position: [f32; 2],
    pub(crate) parent: Option<GraphId>,
    pub(crate) events: IndexSet<NodeId>,
    pub(crate) actions: IndexSet<NodeId>,
    pub(crate) values: IndexSet<NodeId>,
    pub(crate) graphs: IndexSet<GraphId>,
}

impl Graph {
    /// Create a new empty graph
    pub(crate) fn new(id: GraphId, name: impl Into<String>, parent: Option<GraphId>) -> Self {
        Self {
            id,
            name: name.into(),
            enabled: true,
            comment: String::new(),
            position: [0.0, 0.0],
            parent,
            events: IndexSet::new(),
            actions: IndexSet::new(),
            values: IndexSet::new(),
            graphs: IndexSet::new(),
        }
    }

    /// Graph ID
    pub fn id(&self) -> GraphId {
        self.id
    }

    /// Parent graph; `None` for the root
    pub fn parent(&self) -> Option<GraphId> {
        self.parent
    }

    /// Event nodes in insertion order
    pub fn event_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.events.iter().copied()
    }

    /// Action nodes in insertion order
    pub fn action_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.actions.iter().copied()
    }

    /// Value and array value nodes in insertion order
    pub fn value_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.values.iter().copied()
    }

    /// All nodes directly contained: events, then actions, then values
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.event_nodes()
            .chain(self.action_nodes())
            .chain(self.value_nodes())
    }

    /// Direct sub-graphs
    pub fn sub_graphs(&self) -> impl Iterator<Item = GraphId> + '_ {
        self.graphs.iter().copied()
    }

    /// Number of nodes directly contained
    pub fn node_count(&self) -> usize {
        self.events.len() + self.actions.len() + self.values.len()
    }

    /// Whether a node is directly contained
    pub fn contains(&self, node: NodeId) -> bool {
        self.events.contains(&node) || self.actions.contains(&node) || self.values.contains(&node)
    }

    pub(crate) fn insert(&mut self, node: NodeId, kind: NodeKind) {
        match kind {
            NodeKind::Event => self.events.insert(node),
            NodeKind::Action => self.actions.insert(node),
            NodeKind::Value | NodeKind::ArrayValue => self.values.insert(node),
        };
    }

    pub(crate) fn remove(&mut self, node: NodeId) -> bool {
        self.events.shift_remove(&node)
            || self.actions.shift_remove(&node)
            || self.values.shift_remove(&node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partitioned_order() {
        let mut graph = Graph::new(GraphId::new(), "Main", None);
        let value = NodeId::new();
        let event = NodeId::new();
        let action = NodeId::new();
        graph.insert(value, NodeKind::Value);
        graph.insert(event, NodeKind::Event);
        graph.insert(action, NodeKind::Action);

        let order: Vec<_> = graph.node_ids().collect();
        assert_eq!(order, vec![event, action, value]);
        assert!(graph.remove(action));
        assert!(!graph.contains(action));
        assert_eq!(graph.node_count(), 2);
    }
}
