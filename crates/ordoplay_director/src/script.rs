// SPDX-License-Identifier: MIT OR Apache-2.0
//! Script: the arena that owns every graph and node.
//!
//! Nodes and graphs are addressed by ID. All link bookkeeping goes through
//! the script so both ends of a connection stay consistent.

use crate::behavior::PortRole;
use crate::error::DirectorError;
use crate::graph::{Graph, GraphId};
use crate::link::{ConnectionError, InputRef, OutputRef, ValueRef};
use crate::node::{Node, NodeId, NodeKind, NodeRegistry};
use crate::property::PropertyBinding;
use indexmap::IndexMap;

/// A loaded behavior script: a root graph, its sub-graphs and their nodes
#[derive(Debug)]
pub struct Script {
    /// Script name
    pub name: String,
    /// Description
    pub description: String,
    root: GraphId,
    graphs: IndexMap<GraphId, Graph>,
    nodes: IndexMap<NodeId, Node>,
}

impl Script {
    /// Create an empty script with a root graph
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_root(name, GraphId::new())
    }

    pub(crate) fn with_root(name: impl Into<String>, root: GraphId) -> Self {
        let name = name.into();
        let mut graphs = IndexMap::new();
        graphs.insert(root, Graph::new(root, name.clone(), None));
        Self {
            name,
            description: String::new(),
            root,
            graphs,
            nodes: IndexMap::new(),
        }
    }

    /// Root graph ID
    pub fn root(&self) -> GraphId {
        self.root
    }

    /// Root graph
    pub fn root_graph(&self) -> Option<&Graph> {
        self.graphs.get(&self.root)
    }

    /// Get a graph by ID
    pub fn graph(&self, id: GraphId) -> Option<&Graph> {
        self.graphs.get(&id)
    }

    /// Get a mutable graph by ID
    pub fn graph_mut(&mut self, id: GraphId) -> Option<&mut Graph> {
        self.graphs.get_mut(&id)
    }

    /// All graphs, root first
    pub fn graphs(&self) -> impl Iterator<Item = &Graph> {
        self.graphs.values()
    }

    /// Get a node by ID
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Get a mutable node by ID
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    /// All nodes
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Add a sub-graph under `parent`
    pub fn add_graph(&mut self, parent: GraphId, name: impl Into<String>) -> Result<GraphId, DirectorError> {
        self.add_graph_with_id(parent, GraphId::new(), name)
    }

    pub(crate) fn add_graph_with_id(
        &mut self,
        parent: GraphId,
        id: GraphId,
        name: impl Into<String>,
    ) -> Result<GraphId, DirectorError> {
        let parent_graph = self
            .graphs
            .get_mut(&parent)
            .ok_or(DirectorError::GraphNotFound(parent))?;
        parent_graph.graphs.insert(id);
        self.graphs.insert(id, Graph::new(id, name, Some(parent)));
        Ok(id)
    }

    /// Remove a sub-graph with all its nodes and nested graphs.
    ///
    /// Returns the removed node IDs. The root graph cannot be removed.
    pub fn remove_graph(&mut self, id: GraphId) -> Result<Vec<NodeId>, DirectorError> {
        if id == self.root {
            return Err(DirectorError::RootGraphRemoval);
        }
        let graph = self.graphs.get(&id).ok_or(DirectorError::GraphNotFound(id))?;
        let parent = graph.parent;

        let doomed = self.graph_nodes_recursive(id);
        for node in &doomed {
            self.remove_node(*node);
        }

        let mut stack = vec![id];
        while let Some(graph_id) = stack.pop() {
            if let Some(graph) = self.graphs.shift_remove(&graph_id) {
                stack.extend(graph.graphs.iter().copied());
            }
        }
        if let Some(parent) = parent.and_then(|p| self.graphs.get_mut(&p)) {
            parent.graphs.shift_remove(&id);
        }
        Ok(doomed)
    }

    /// Add a node to the graph it was created for
    pub fn add_node(&mut self, node: Node) -> Result<NodeId, DirectorError> {
        let id = node.id();
        let graph = self
            .graphs
            .get_mut(&node.graph)
            .ok_or(DirectorError::GraphNotFound(node.graph))?;
        graph.insert(id, node.kind());
        self.nodes.insert(id, node);
        Ok(id)
    }

    /// Create a node of a registered type and add it to `graph`
    pub fn create_node(
        &mut self,
        registry: &NodeRegistry,
        type_name: &str,
        graph: GraphId,
    ) -> Result<NodeId, DirectorError> {
        let node = registry
            .create_node(type_name, graph)
            .ok_or_else(|| DirectorError::UnknownNodeType(type_name.to_string()))?;
        self.add_node(node)
    }

    /// Remove a node, severing every link that touches it
    pub fn remove_node(&mut self, id: NodeId) -> Option<Node> {
        let node = self.nodes.get(&id)?;

        let outgoing: Vec<(String, InputRef)> = node
            .outputs
            .iter()
            .flat_map(|o| o.targets.iter().map(move |t| (o.name.clone(), t.clone())))
            .collect();
        let incoming: Vec<(String, OutputRef)> = node
            .inputs
            .iter()
            .flat_map(|i| i.sources.iter().map(move |s| (i.name.clone(), s.clone())))
            .collect();
        let bound: Vec<(String, NodeId)> = node
            .values
            .iter()
            .flat_map(|l| l.values.iter().map(move |v| (l.name.clone(), *v)))
            .collect();
        let referrers = node.referrers().to_vec();

        for (output, target) in outgoing {
            self.disconnect(id, &output, target.node, &target.input);
        }
        for (input, source) in incoming {
            self.disconnect(source.node, &source.output, id, &input);
        }
        for (link, value) in bound {
            self.unbind_value(id, &link, value);
        }
        for referrer in referrers {
            self.unbind_value(referrer.node, &referrer.link, id);
        }

        let node = self.nodes.shift_remove(&id)?;
        if let Some(graph) = self.graphs.get_mut(&node.graph) {
            graph.remove(id);
        }
        Some(node)
    }

    /// Connect an output link to an input link
    pub fn connect(
        &mut self,
        from: NodeId,
        output: &str,
        to: NodeId,
        input: &str,
    ) -> Result<(), ConnectionError> {
        let target = self.nodes.get(&to).ok_or(ConnectionError::NodeNotFound(to))?;
        if target.input(input).is_none() {
            return Err(ConnectionError::LinkNotFound {
                node: to,
                link: input.to_string(),
            });
        }

        let source = self.nodes.get_mut(&from).ok_or(ConnectionError::NodeNotFound(from))?;
        let link = source.output_mut(output).ok_or_else(|| ConnectionError::LinkNotFound {
            node: from,
            link: output.to_string(),
        })?;
        let target_ref = InputRef {
            node: to,
            input: input.to_string(),
        };
        if link.targets.contains(&target_ref) {
            return Err(ConnectionError::AlreadyConnected(output.to_string()));
        }
        link.targets.push(target_ref);

        if let Some(link) = self
            .nodes
            .get_mut(&to)
            .and_then(|n| n.inputs.iter_mut().find(|l| l.name == input))
        {
            link.sources.push(OutputRef {
                node: from,
                output: output.to_string(),
            });
        }
        Ok(())
    }

    /// Remove a connection; returns false when it did not exist
    pub fn disconnect(&mut self, from: NodeId, output: &str, to: NodeId, input: &str) -> bool {
        let mut removed = false;
        if let Some(link) = self.nodes.get_mut(&from).and_then(|n| n.output_mut(output)) {
            let before = link.targets.len();
            link.targets.retain(|t| !(t.node == to && t.input == input));
            removed = link.targets.len() != before;
        }
        if let Some(link) = self
            .nodes
            .get_mut(&to)
            .and_then(|n| n.inputs.iter_mut().find(|l| l.name == input))
        {
            link.sources.retain(|s| !(s.node == from && s.output == output));
        }
        removed
    }

    /// Check whether `value` may be bound to the value link `link` of `node`
    pub fn can_bind_value(&self, node: NodeId, link: &str, value: NodeId) -> Result<(), ConnectionError> {
        if node == value {
            return Err(ConnectionError::SelfLoop);
        }
        let owner = self.nodes.get(&node).ok_or(ConnectionError::NodeNotFound(node))?;
        let link_def = owner.value_link(link).ok_or_else(|| ConnectionError::LinkNotFound {
            node,
            link: link.to_string(),
        })?;
        let target = self.nodes.get(&value).ok_or(ConnectionError::NodeNotFound(value))?;
        let stored = target.stored_type().ok_or(ConnectionError::NotAValueNode(value))?;

        if target.kind() == NodeKind::ArrayValue && link_def.binding == PropertyBinding::Single {
            return Err(ConnectionError::ArrayIntoScalar(link.to_string()));
        }
        if !link_def.value_type.can_connect_to(&stored) {
            return Err(ConnectionError::IncompatibleValue {
                link: link.to_string(),
                expected: link_def.value_type,
                found: stored,
            });
        }
        Ok(())
    }

    /// Bind a value node to a value link.
    ///
    /// A link that allows a single value drops its previous binding.
    pub fn bind_value(&mut self, node: NodeId, link: &str, value: NodeId) -> Result<(), ConnectionError> {
        self.can_bind_value(node, link, value)?;

        let (allow_multiple, existing) = match self.nodes.get(&node).and_then(|n| n.value_link(link)) {
            Some(l) => (l.allow_multiple, l.values.clone()),
            None => (false, Vec::new()),
        };
        if existing.contains(&value) {
            return Ok(());
        }
        if !allow_multiple {
            for previous in existing {
                self.unbind_value(node, link, previous);
            }
        }

        if let Some(l) = self.nodes.get_mut(&node).and_then(|n| n.value_link_mut(link)) {
            l.values.push(value);
        }
        if let Some(referrers) = self.nodes.get_mut(&value).and_then(Node::referrers_mut) {
            referrers.push(ValueRef {
                node,
                link: link.to_string(),
            });
        }
        Ok(())
    }

    /// Remove a value binding; returns false when it did not exist
    pub fn unbind_value(&mut self, node: NodeId, link: &str, value: NodeId) -> bool {
        let mut removed = false;
        if let Some(l) = self.nodes.get_mut(&node).and_then(|n| n.value_link_mut(link)) {
            let before = l.values.len();
            l.values.retain(|v| *v != value);
            removed = l.values.len() != before;
        }
        if let Some(referrers) = self.nodes.get_mut(&value).and_then(Node::referrers_mut) {
            referrers.retain(|r| !(r.node == node && r.link == link));
        }
        removed
    }

    /// Whether a graph and all of its ancestors are enabled
    pub fn is_graph_enabled(&self, id: GraphId) -> bool {
        let mut current = Some(id);
        while let Some(graph_id) = current {
            match self.graphs.get(&graph_id) {
                Some(graph) if graph.enabled => current = graph.parent,
                _ => return false,
            }
        }
        true
    }

    /// Whether a node is enabled and every graph containing it is enabled
    pub fn is_node_enabled(&self, id: NodeId) -> bool {
        self.nodes
            .get(&id)
            .is_some_and(|n| n.enabled && self.is_graph_enabled(n.graph))
    }

    /// Nodes of a graph and all nested graphs, depth first
    pub fn graph_nodes_recursive(&self, id: GraphId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_graph_nodes(id, &mut out);
        out
    }

    fn collect_graph_nodes(&self, id: GraphId, out: &mut Vec<NodeId>) {
        if let Some(graph) = self.graphs.get(&id) {
            out.extend(graph.node_ids());
            for sub in graph.sub_graphs() {
                self.collect_graph_nodes(sub, out);
            }
        }
    }

    /// Every node in the script in graph order
    pub fn ordered_nodes(&self) -> Vec<NodeId> {
        self.graph_nodes_recursive(self.root)
    }

    fn nodes_with_role(&self, graph: GraphId, role: PortRole) -> Vec<NodeId> {
        self.graphs
            .get(&graph)
            .map(|g| {
                g.node_ids()
                    .filter(|id| self.nodes.get(id).and_then(Node::port_role) == Some(role))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Input port nodes of a graph
    pub fn input_nodes(&self, graph: GraphId) -> Vec<NodeId> {
        self.nodes_with_role(graph, PortRole::Input)
    }

    /// Output port nodes of a graph
    pub fn output_nodes(&self, graph: GraphId) -> Vec<NodeId> {
        self.nodes_with_role(graph, PortRole::Output)
    }

    /// External value proxies of a graph
    pub fn external_value_nodes(&self, graph: GraphId) -> Vec<NodeId> {
        self.nodes_with_role(graph, PortRole::ExternalValue)
    }

    /// Nodes of the given type, in graph order
    pub fn nodes_of_type(&self, type_name: &str) -> Vec<NodeId> {
        self.ordered_nodes()
            .into_iter()
            .filter(|id| self.nodes.get(id).is_some_and(|n| n.type_name() == type_name))
            .collect()
    }

    /// First node with the given display name
    pub fn find_node(&self, name: &str) -> Option<NodeId> {
        self.ordered_nodes()
            .into_iter()
            .find(|id| self.nodes.get(id).is_some_and(|n| n.name == name))
    }

    /// Event nodes responding to a remote event, in graph order
    pub fn event_listeners(&self, event: &str) -> Vec<NodeId> {
        self.ordered_nodes()
            .into_iter()
            .filter(|id| self.nodes.get(id).is_some_and(|n| n.listens_for(event)))
            .collect()
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library;
    use crate::value::ValueType;

    #[test]
    fn test_connect_and_remove() {
        let registry = library::create_default_registry();
        let mut script = Script::new("Test");
        let root = script.root();
        let start = script.create_node(&registry, "Start", root).expect("start");
        let log = script.create_node(&registry, "Log", root).expect("log");

        script.connect(start, "Out", log, "In").expect("connect");
        assert!(matches!(
            script.connect(start, "Out", log, "In"),
            Err(ConnectionError::AlreadyConnected(_))
        ));
        assert!(matches!(
            script.connect(start, "Nope", log, "In"),
            Err(ConnectionError::LinkNotFound { .. })
        ));

        let input = script.node(log).and_then(|n| n.input("In")).map(|l| l.sources().len());
        assert_eq!(input, Some(1));

        script.remove_node(log);
        let targets = script.node(start).and_then(|n| n.output("Out")).map(|l| l.targets().len());
        assert_eq!(targets, Some(0));
        assert!(!script.root_graph().is_some_and(|g| g.contains(log)));
    }

    #[test]
    fn test_value_binding_rules() {
        let registry = library::create_default_registry();
        let mut script = Script::new("Test");
        let root = script.root();
        let delay = script.create_node(&registry, "Delay", root).expect("delay");
        let float = script.create_node(&registry, "Float", root).expect("float");
        let other = script.create_node(&registry, "Int", root).expect("int");
        let vec = script.create_node(&registry, "Vec3", root).expect("vec3");
        let array = script.create_node(&registry, "Float Array", root).expect("array");

        script.bind_value(delay, "Delay", float).expect("bind");
        // Single-value link: the second binding replaces the first
        script.bind_value(delay, "Delay", other).expect("rebind");
        let bound = script.node(delay).and_then(|n| n.value_link("Delay")).map(|l| l.values().to_vec());
        assert_eq!(bound, Some(vec![other]));
        assert!(script.node(float).is_some_and(|n| n.referrers().is_empty()));

        assert!(matches!(
            script.bind_value(delay, "Delay", vec),
            Err(ConnectionError::IncompatibleValue { .. })
        ));
        assert!(matches!(
            script.bind_value(delay, "Delay", array),
            Err(ConnectionError::ArrayIntoScalar(_))
        ));
        assert!(matches!(
            script.bind_value(delay, "Delay", delay),
            Err(ConnectionError::SelfLoop)
        ));
        assert_eq!(script.node(vec).and_then(Node::stored_type), Some(ValueType::Vec3));
    }

    #[test]
    fn test_graph_enable_inherits() {
        let registry = library::create_default_registry();
        let mut script = Script::new("Test");
        let sub = script.add_graph(script.root(), "Sub").expect("sub");
        let nested = script.add_graph(sub, "Nested").expect("nested");
        let node = script.create_node(&registry, "Log", nested).expect("log");
        assert!(script.is_node_enabled(node));

        if let Some(graph) = script.graph_mut(sub) {
            graph.enabled = false;
        }
        assert!(!script.is_node_enabled(node));
        assert!(script.node(node).is_some_and(|n| n.enabled));
    }

    #[test]
    fn test_remove_graph() {
        let registry = library::create_default_registry();
        let mut script = Script::new("Test");
        let root = script.root();
        let sub = script.add_graph(root, "Sub").expect("sub");
        let inner = script.create_node(&registry, "Log", sub).expect("log");
        let start = script.create_node(&registry, "Start", root).expect("start");
        script.connect(start, "Out", inner, "In").expect("connect");

        assert!(matches!(script.remove_graph(root), Err(DirectorError::RootGraphRemoval)));
        let removed = script.remove_graph(sub).expect("remove");
        assert_eq!(removed, vec![inner]);
        assert!(script.graph(sub).is_none());
        assert!(script.node(inner).is_none());
        assert_eq!(script.node(start).and_then(|n| n.output("Out")).map(|l| l.targets().len()), Some(0));
    }

    #[test]
    fn test_port_queries() {
        let registry = library::create_default_registry();
        let mut script = Script::new("Test");
        let sub = script.add_graph(script.root(), "Sub").expect("sub");
        let input = script.create_node(&registry, "Input Link", sub).expect("input");
        let output = script.create_node(&registry, "Output Link", sub).expect("output");
        let external = script.create_node(&registry, "External Value", sub).expect("external");
        script.create_node(&registry, "Log", sub).expect("log");

        assert_eq!(script.input_nodes(sub), vec![input]);
        assert_eq!(script.output_nodes(sub), vec![output]);
        assert_eq!(script.external_value_nodes(sub), vec![external]);
        assert!(script.input_nodes(script.root()).is_empty());
    }
}
