// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions and the node type registry.

use crate::behavior::{ActionBehavior, EventBehavior, PortRole, TakenBehavior};
use crate::graph::GraphId;
use crate::link::{InputLink, LinkSet, OutputLink, ValueLink, ValueRef, DEFAULT_INPUT, DEFAULT_OUTPUT};
use crate::property::{PropertyDef, PropertyMap};
use crate::value::{Value, ValueType};
use crate::value_node::{ArrayValueNode, ValueNode, ValueRole};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Properties stored in the node header rather than the property list
pub const HEADER_PROPERTIES: [&str; 4] = ["Name", "Comment", "Enabled", "Logging"];

/// Unique identifier for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Node type category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeCategory {
    /// Event entry points
    Event,
    /// Flow control and timing
    Flow,
    /// Math and comparison
    Math,
    /// Value storage
    Value,
    /// Array manipulation
    Array,
    /// Graph boundary ports
    Port,
    /// Utility nodes
    Utility,
    /// Custom/user-defined
    Custom,
}

/// Structural kind of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    /// Entry point that starts threads
    Event,
    /// Unit of work executed by threads
    Action,
    /// Single value storage
    Value,
    /// Array storage
    ArrayValue,
}

/// Event-specific node state
pub struct EventNode {
    /// Trigger limit (0 for unlimited)
    pub max_trigger_count: u32,
    pub(crate) trigger_count: u32,
    pub(crate) behavior: Option<Box<dyn EventBehavior>>,
}

impl EventNode {
    /// Number of counted triggers so far
    pub fn trigger_count(&self) -> u32 {
        self.trigger_count
    }
}

impl fmt::Debug for EventNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventNode")
            .field("max_trigger_count", &self.max_trigger_count)
            .field("trigger_count", &self.trigger_count)
            .finish_non_exhaustive()
    }
}

/// Action-specific node state
pub struct ActionNode {
    pub(crate) behavior: Option<Box<dyn ActionBehavior>>,
}

impl fmt::Debug for ActionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionNode")
            .field("busy", &self.behavior.is_none())
            .finish()
    }
}

/// Variant part of a node
#[derive(Debug)]
pub enum NodeBody {
    /// Event node
    Event(EventNode),
    /// Action node
    Action(ActionNode),
    /// Scalar value node
    Value(ValueNode),
    /// Array value node
    ArrayValue(ArrayValueNode),
}

impl NodeBody {
    /// Event body around a behavior
    pub fn event(behavior: impl EventBehavior + 'static) -> Self {
        Self::Event(EventNode {
            max_trigger_count: 0,
            trigger_count: 0,
            behavior: Some(Box::new(behavior)),
        })
    }

    /// Action body around a behavior
    pub fn action(behavior: impl ActionBehavior + 'static) -> Self {
        Self::Action(ActionNode {
            behavior: Some(Box::new(behavior)),
        })
    }

    /// Scalar value body
    pub fn value(value_type: ValueType) -> Self {
        Self::Value(ValueNode::new(value_type))
    }

    /// Array value body
    pub fn array(element_type: ValueType) -> Self {
        Self::ArrayValue(ArrayValueNode::new(element_type))
    }

    /// External value proxy body
    pub fn external_value() -> Self {
        Self::Value(ValueNode::external())
    }

    /// Structural kind
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Event(_) => NodeKind::Event,
            Self::Action(_) => NodeKind::Action,
            Self::Value(_) => NodeKind::Value,
            Self::ArrayValue(_) => NodeKind::ArrayValue,
        }
    }
}

/// A node instance in a script
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    type_name: String,
    pub(crate) graph: GraphId,
    /// Display name
    pub name: String,
    /// Disabled nodes never execute
    pub enabled: bool,
    /// Position in the editor
    pub position: [f32; 2],
    /// Free-form comment
    pub comment: String,
    /// Authors
    pub authors: Vec<String>,
    /// Emit a log line on every execution
    pub logging: bool,
    pub(crate) inputs: Vec<InputLink>,
    pub(crate) outputs: Vec<OutputLink>,
    pub(crate) values: Vec<ValueLink>,
    pub(crate) body: NodeBody,
    properties: PropertyMap,
    port_role: Option<PortRole>,
}

impl Node {
    /// Create a node of the named type around a body.
    ///
    /// Links are declared and the property map is built here, once.
    pub fn new(type_name: impl Into<String>, body: NodeBody, graph: GraphId) -> Self {
        let mut links = LinkSet::new();
        let mut port_role = None;

        match &body {
            NodeBody::Event(event) => {
                links.output(DEFAULT_OUTPUT);
                if let Some(behavior) = &event.behavior {
                    behavior.init(&mut links);
                }
            }
            NodeBody::Action(action) => {
                if let Some(behavior) = &action.behavior {
                    behavior.init(&mut links);
                    port_role = behavior.port_role();
                }
                if links.inputs.is_empty() {
                    links.input(DEFAULT_INPUT);
                }
                if links.outputs.is_empty() {
                    links.output(DEFAULT_OUTPUT);
                }
            }
            NodeBody::Value(value) if value.role() == ValueRole::External => {
                links.value(ValueLink::new("Value", ValueType::Any));
                port_role = Some(PortRole::ExternalValue);
            }
            NodeBody::Value(_) | NodeBody::ArrayValue(_) => {}
        }

        let mut node = Self {
            id: NodeId::new(),
            type_name: type_name.into(),
            graph,
            name: String::new(),
            enabled: true,
            position: [0.0, 0.0],
            comment: String::new(),
            authors: Vec::new(),
            logging: false,
            inputs: links.inputs,
            outputs: links.outputs,
            values: links.values,
            body,
            properties: PropertyMap::new(),
            port_role,
        };
        node.name = node.type_name.clone();
        node.properties = node.build_property_map();
        node
    }

    /// Replace the random ID (used when loading)
    pub(crate) fn with_id(mut self, id: NodeId) -> Self {
        self.id = id;
        self
    }

    /// Set the position
    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = [x, y];
        self
    }

    /// Node ID
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Registered type name
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Graph that contains this node
    pub fn graph(&self) -> GraphId {
        self.graph
    }

    /// Structural kind
    pub fn kind(&self) -> NodeKind {
        self.body.kind()
    }

    /// Variant part
    pub fn body(&self) -> &NodeBody {
        &self.body
    }

    /// Boundary role, if any
    pub fn port_role(&self) -> Option<PortRole> {
        self.port_role
    }

    /// Input links
    pub fn inputs(&self) -> &[InputLink] {
        &self.inputs
    }

    /// Output links
    pub fn outputs(&self) -> &[OutputLink] {
        &self.outputs
    }

    /// Value links
    pub fn value_links(&self) -> &[ValueLink] {
        &self.values
    }

    /// Get an input link by name
    pub fn input(&self, name: &str) -> Option<&InputLink> {
        self.inputs.iter().find(|l| l.name == name)
    }

    /// Index of an input link
    pub fn input_index(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|l| l.name == name)
    }

    /// Get an output link by name
    pub fn output(&self, name: &str) -> Option<&OutputLink> {
        self.outputs.iter().find(|l| l.name == name)
    }

    pub(crate) fn output_mut(&mut self, name: &str) -> Option<&mut OutputLink> {
        self.outputs.iter_mut().find(|l| l.name == name)
    }

    /// Get a value link by name
    pub fn value_link(&self, name: &str) -> Option<&ValueLink> {
        self.values.iter().find(|l| l.name == name)
    }

    pub(crate) fn value_link_mut(&mut self, name: &str) -> Option<&mut ValueLink> {
        self.values.iter_mut().find(|l| l.name == name)
    }

    /// Property definitions
    pub fn properties(&self) -> &PropertyMap {
        &self.properties
    }

    /// Scalar value body
    pub fn as_value(&self) -> Option<&ValueNode> {
        match &self.body {
            NodeBody::Value(value) => Some(value),
            _ => None,
        }
    }

    pub(crate) fn as_value_mut(&mut self) -> Option<&mut ValueNode> {
        match &mut self.body {
            NodeBody::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Array value body
    pub fn as_array(&self) -> Option<&ArrayValueNode> {
        match &self.body {
            NodeBody::ArrayValue(array) => Some(array),
            _ => None,
        }
    }

    pub(crate) fn as_array_mut(&mut self) -> Option<&mut ArrayValueNode> {
        match &mut self.body {
            NodeBody::ArrayValue(array) => Some(array),
            _ => None,
        }
    }

    /// Event body
    pub fn as_event(&self) -> Option<&EventNode> {
        match &self.body {
            NodeBody::Event(event) => Some(event),
            _ => None,
        }
    }

    pub(crate) fn as_event_mut(&mut self) -> Option<&mut EventNode> {
        match &mut self.body {
            NodeBody::Event(event) => Some(event),
            _ => None,
        }
    }

    /// Value links bound to this node, when it is a value node
    pub fn referrers(&self) -> &[ValueRef] {
        match &self.body {
            NodeBody::Value(value) => value.referrers(),
            NodeBody::ArrayValue(array) => array.referrers(),
            _ => &[],
        }
    }

    pub(crate) fn referrers_mut(&mut self) -> Option<&mut Vec<ValueRef>> {
        match &mut self.body {
            NodeBody::Value(value) => Some(&mut value.referrers),
            NodeBody::ArrayValue(array) => Some(&mut array.referrers),
            _ => None,
        }
    }

    /// Type a value binding would store into, for value nodes
    pub fn stored_type(&self) -> Option<ValueType> {
        match &self.body {
            NodeBody::Value(value) => Some(value.value_type()),
            NodeBody::ArrayValue(array) => Some(array.element_type()),
            _ => None,
        }
    }

    /// Whether the behavior asks for a per-frame tick
    pub fn wants_tick(&self) -> bool {
        match &self.body {
            NodeBody::Event(EventNode { behavior: Some(b), .. }) => b.wants_tick(),
            NodeBody::Action(ActionNode { behavior: Some(b) }) => b.wants_tick(),
            _ => false,
        }
    }

    /// Whether this event node responds to the named remote event
    pub fn listens_for(&self, event: &str) -> bool {
        match &self.body {
            NodeBody::Event(EventNode { behavior: Some(b), .. }) => b.listens_for(event),
            _ => false,
        }
    }

    pub(crate) fn take_behavior(&mut self) -> Option<TakenBehavior> {
        match &mut self.body {
            NodeBody::Event(event) => event.behavior.take().map(TakenBehavior::Event),
            NodeBody::Action(action) => action.behavior.take().map(TakenBehavior::Action),
            _ => None,
        }
    }

    pub(crate) fn take_action(&mut self) -> Option<Box<dyn ActionBehavior>> {
        match &mut self.body {
            NodeBody::Action(action) => action.behavior.take(),
            _ => None,
        }
    }

    pub(crate) fn restore_behavior(&mut self, behavior: TakenBehavior) {
        match (&mut self.body, behavior) {
            (NodeBody::Event(event), TakenBehavior::Event(b)) => event.behavior = Some(b),
            (NodeBody::Action(action), TakenBehavior::Action(b)) => action.behavior = Some(b),
            _ => {}
        }
    }

    pub(crate) fn restore_action(&mut self, behavior: Box<dyn ActionBehavior>) {
        if let NodeBody::Action(action) = &mut self.body {
            action.behavior = Some(behavior);
        }
    }

    fn build_property_map(&self) -> PropertyMap {
        let mut map = PropertyMap::new();
        map.add(PropertyDef::new("Name", ValueType::String))
            .add(PropertyDef::new("Comment", ValueType::String))
            .add(PropertyDef::new("Enabled", ValueType::Bool))
            .add(PropertyDef::new("Logging", ValueType::Bool));

        match &self.body {
            NodeBody::Event(event) => {
                map.add(
                    PropertyDef::new("Max Trigger Count", ValueType::Int)
                        .description("Counted triggers allowed (0 for unlimited)"),
                )
                .add(PropertyDef::new("Trigger Count", ValueType::Int).read_only());
                if let Some(b) = &event.behavior {
                    b.build_property_map(&mut map);
                }
            }
            NodeBody::Action(action) => {
                if let Some(b) = &action.behavior {
                    b.build_property_map(&mut map);
                }
            }
            NodeBody::Value(value) => {
                let ty = value.value_type();
                map.add(PropertyDef::new("Initial Value", ty))
                    .add(PropertyDef::new("Value", ty));
            }
            NodeBody::ArrayValue(array) => {
                let ty = array.element_type();
                map.add(PropertyDef::new("Min Size", ValueType::Int))
                    .add(PropertyDef::new("Max Size", ValueType::Int))
                    .add(PropertyDef::new("Initial Value", ty).array())
                    .add(PropertyDef::new("Value", ty).array())
                    .add(PropertyDef::new("Size", ValueType::Int).read_only());
            }
        }
        map
    }

    /// Read a scalar property.
    ///
    /// Array properties are only available as strings, see
    /// [`property_string`](Self::property_string).
    pub fn property(&self, name: &str) -> Option<Value> {
        match name {
            "Name" => return Some(Value::String(self.name.clone())),
            "Comment" => return Some(Value::String(self.comment.clone())),
            "Enabled" => return Some(Value::Bool(self.enabled)),
            "Logging" => return Some(Value::Bool(self.logging)),
            _ => {}
        }

        match &self.body {
            NodeBody::Event(event) => match name {
                "Max Trigger Count" => Some(Value::Int(clamp_i32(event.max_trigger_count as usize))),
                "Trigger Count" => Some(Value::Int(clamp_i32(event.trigger_count as usize))),
                _ => event.behavior.as_ref().and_then(|b| b.property(name)),
            },
            NodeBody::Action(action) => action.behavior.as_ref().and_then(|b| b.property(name)),
            NodeBody::Value(value) => match name {
                "Value" => Some(value.value().clone()),
                "Initial Value" => Some(value.initial_value().clone()),
                _ => None,
            },
            NodeBody::ArrayValue(array) => match name {
                "Min Size" => Some(Value::Int(clamp_i32(array.min_size()))),
                "Max Size" => Some(Value::Int(clamp_i32(array.max_size()))),
                "Size" => Some(Value::Int(clamp_i32(array.len()))),
                _ => None,
            },
        }
    }

    /// Write a scalar property; returns false when unknown, read-only or
    /// not convertible. Writes made here do not notify value link owners.
    pub fn set_property(&mut self, name: &str, value: &Value) -> bool {
        if self.properties.is_read_only(name) {
            tracing::debug!("Node {} '{}': property '{name}' is read-only or unknown", self.id, self.name);
            return false;
        }

        match name {
            "Name" => {
                self.name = value.to_property_string();
                return true;
            }
            "Comment" => {
                self.comment = value.to_property_string();
                return true;
            }
            "Enabled" | "Logging" => {
                let Some(flag) = value.as_bool() else {
                    return false;
                };
                if name == "Enabled" {
                    self.enabled = flag;
                } else {
                    self.logging = flag;
                }
                return true;
            }
            _ => {}
        }

        match &mut self.body {
            NodeBody::Event(event) => match name {
                "Max Trigger Count" => match value.as_int() {
                    Some(max) => {
                        event.max_trigger_count = u32::try_from(max).unwrap_or(0);
                        true
                    }
                    None => false,
                },
                _ => event.behavior.as_mut().is_some_and(|b| b.set_property(name, value)),
            },
            NodeBody::Action(action) => action
                .behavior
                .as_mut()
                .is_some_and(|b| b.set_property(name, value)),
            NodeBody::Value(cell) => match name {
                "Value" => {
                    cell.set_value(value);
                    value.coerce(cell.value_type()).is_some()
                }
                "Initial Value" => cell.set_initial_value(value),
                _ => false,
            },
            NodeBody::ArrayValue(array) => {
                let Some(size) = value.as_int().map(|v| usize::try_from(v).unwrap_or(0)) else {
                    return false;
                };
                match name {
                    "Min Size" => array.set_size_limits(size, array.max_size()),
                    "Max Size" => array.set_size_limits(array.min_size(), size),
                    _ => return false,
                }
                true
            }
        }
    }

    /// Read any property in its canonical string form
    pub fn property_string(&self, name: &str) -> Option<String> {
        let def = self.properties.get(name)?;
        if def.array {
            let array = self.as_array()?;
            return Some(match name {
                "Initial Value" => array.initial_string(),
                _ => array.array_string(),
            });
        }
        self.property(name).map(|v| v.to_property_string())
    }

    /// Write any property from its canonical string form
    pub fn set_property_string(&mut self, name: &str, text: &str) -> bool {
        let Some(def) = self.properties.get(name) else {
            return false;
        };
        if def.read_only {
            tracing::debug!("Node {} '{}': property '{name}' is read-only", self.id, self.name);
            return false;
        }

        if def.array {
            let Some(array) = self.as_array_mut() else {
                return false;
            };
            let values = array.parse_array(text);
            match name {
                "Initial Value" => array.set_initial(&values),
                _ => {
                    array.set_array(&values);
                }
            }
            return true;
        }

        match Value::parse(def.value_type, text) {
            Some(value) => self.set_property(name, &value),
            None => false,
        }
    }
}

fn clamp_i32(value: usize) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// Constructor for a node body
pub type NodeFactory = fn() -> NodeBody;

/// Node type definition
#[derive(Debug, Clone)]
pub struct NodeType {
    /// Unique type name
    pub id: String,
    /// Category
    pub category: NodeCategory,
    /// Description
    pub description: String,
    factory: NodeFactory,
}

impl NodeType {
    /// Create a node type
    pub fn new(
        id: impl Into<String>,
        category: NodeCategory,
        description: impl Into<String>,
        factory: NodeFactory,
    ) -> Self {
        Self {
            id: id.into(),
            category,
            description: description.into(),
            factory,
        }
    }

    /// Instantiate a node of this type inside a graph
    pub fn instantiate(&self, graph: GraphId) -> Node {
        Node::new(self.id.clone(), (self.factory)(), graph)
    }

    /// Kind of the nodes this type produces
    pub fn kind(&self) -> NodeKind {
        (self.factory)().kind()
    }
}

/// Registry of available node types
pub struct NodeRegistry {
    /// Registered node types by name
    types: indexmap::IndexMap<String, NodeType>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            types: indexmap::IndexMap::new(),
        }
    }

    /// Register a node type, replacing any type of the same name
    pub fn register(&mut self, node_type: NodeType) {
        self.types.insert(node_type.id.clone(), node_type);
    }

    /// Get a node type by name
    pub fn get(&self, id: &str) -> Option<&NodeType> {
        self.types.get(id)
    }

    /// Whether a type is registered
    pub fn contains(&self, id: &str) -> bool {
        self.types.contains_key(id)
    }

    /// Get all registered types
    pub fn types(&self) -> impl Iterator<Item = &NodeType> {
        self.types.values()
    }

    /// Get types by category
    pub fn types_in_category(&self, category: NodeCategory) -> impl Iterator<Item = &NodeType> {
        self.types.values().filter(move |t| t.category == category)
    }

    /// Create a node from a type name
    pub fn create_node(&self, type_id: &str, graph: GraphId) -> Option<Node> {
        self.get(type_id).map(|t| t.instantiate(graph))
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NodeContext;
    use crate::behavior::NodeBehavior;

    struct Passthrough;

    impl NodeBehavior for Passthrough {}

    impl ActionBehavior for Passthrough {
        fn update(&mut self, _ctx: &mut NodeContext<'_>) -> bool {
            false
        }
    }

    struct Ping;

    impl NodeBehavior for Ping {}
    impl EventBehavior for Ping {}

    #[test]
    fn test_default_links() {
        let graph = GraphId::new();
        let action = Node::new("Passthrough", NodeBody::action(Passthrough), graph);
        assert_eq!(action.input_index(DEFAULT_INPUT), Some(0));
        assert!(action.output(DEFAULT_OUTPUT).is_some());

        let event = Node::new("Ping", NodeBody::event(Ping), graph);
        assert!(event.inputs().is_empty());
        assert_eq!(event.outputs().len(), 1);
        assert_eq!(event.name, "Ping");
    }

    #[test]
    fn test_header_properties() {
        let mut node = Node::new("Ping", NodeBody::event(Ping), GraphId::new());
        assert!(node.set_property_string("Enabled", "false"));
        assert!(!node.enabled);
        assert!(node.set_property_string("Max Trigger Count", "2"));
        assert_eq!(node.as_event().map(|e| e.max_trigger_count), Some(2));
        assert!(!node.set_property_string("Trigger Count", "5"));
        assert!(!node.set_property_string("Unknown", "1"));
    }

    #[test]
    fn test_array_properties_as_strings() {
        let mut node = Node::new("Int Array", NodeBody::array(ValueType::Int), GraphId::new());
        let text = crate::codec::encode_tokens(["4", "5"]);
        assert!(node.set_property_string("Value", &text));
        assert_eq!(node.property_string("Value").as_deref(), Some(text.as_str()));
        assert_eq!(node.property("Size"), Some(Value::Int(2)));
        assert_eq!(node.property("Value"), None);
    }

    #[test]
    fn test_registry() {
        let mut registry = NodeRegistry::new();
        registry.register(NodeType::new("Ping", NodeCategory::Event, "", || NodeBody::event(Ping)));
        registry.register(NodeType::new("Int", NodeCategory::Value, "", || NodeBody::value(ValueType::Int)));

        assert_eq!(registry.get("Ping").map(NodeType::kind), Some(NodeKind::Event));
        assert_eq!(registry.types_in_category(NodeCategory::Value).count(), 1);
        assert!(registry.create_node("Missing", GraphId::new()).is_none());
        let node = registry.create_node("Int", GraphId::new());
        assert_eq!(node.map(|n| n.kind()), Some(NodeKind::Value));
    }
}
