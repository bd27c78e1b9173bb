// SPDX-License-Identifier: MIT OR Apache-2.0
//! Link definitions: the connection points on a node.
//!
//! Input and output links carry execution flow, value links carry data.
//! Links never own their peers; they store the IDs of the nodes on the other
//! side and the script resolves them.

use crate::node::NodeId;
use crate::property::PropertyBinding;
use crate::value::ValueType;
use serde::{Deserialize, Serialize};

/// Name of the output every event node carries
pub const DEFAULT_OUTPUT: &str = "Out";
/// Name of the input created for actions that declare none
pub const DEFAULT_INPUT: &str = "In";

/// Reference to an output link on another node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputRef {
    /// Owning node
    pub node: NodeId,
    /// Output link name
    pub output: String,
}

/// Reference to an input link on another node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InputRef {
    /// Owning node
    pub node: NodeId,
    /// Input link name
    pub input: String,
}

/// Reference from a value node back to a value link that binds it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValueRef {
    /// Node owning the value link
    pub node: NodeId,
    /// Value link name
    pub link: String,
}

/// Entry point for execution flow
#[derive(Debug, Clone)]
pub struct InputLink {
    /// Link name
    pub name: String,
    /// Outputs connected to this input
    pub(crate) sources: Vec<OutputRef>,
    /// Number of live thread cursors currently on this input
    pub(crate) activation_count: u32,
    /// Shown on the node
    pub visible: bool,
}

impl InputLink {
    /// Create a new input link
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sources: Vec::new(),
            activation_count: 0,
            visible: true,
        }
    }

    /// Outputs connected to this input
    pub fn sources(&self) -> &[OutputRef] {
        &self.sources
    }

    /// Number of live cursors on this input
    pub fn activation_count(&self) -> u32 {
        self.activation_count
    }
}

/// Exit point for execution flow
#[derive(Debug, Clone)]
pub struct OutputLink {
    /// Link name
    pub name: String,
    /// Inputs this output fans out to, in connection order
    pub(crate) targets: Vec<InputRef>,
    /// Set by the owning node during its update, cleared when harvested
    pub(crate) activated: bool,
    /// Whether a thread crossing this link continues in the same frame
    pub immediate: bool,
    /// Shown on the node
    pub visible: bool,
}

impl OutputLink {
    /// Create a new (immediate) output link
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            targets: Vec::new(),
            activated: false,
            immediate: true,
            visible: true,
        }
    }

    /// Inputs connected to this output
    pub fn targets(&self) -> &[InputRef] {
        &self.targets
    }

    /// Whether the output has been activated and not yet harvested
    pub fn is_activated(&self) -> bool {
        self.activated
    }
}

/// Data connection between a node and one or more value nodes
#[derive(Debug, Clone)]
pub struct ValueLink {
    /// Link name (matches the node property it overrides)
    pub name: String,
    /// Bound value nodes
    pub(crate) values: Vec<NodeId>,
    /// Expected value type
    pub value_type: ValueType,
    /// Node reads through this link
    pub readable: bool,
    /// Node writes through this link
    pub writable: bool,
    /// Exposed on the node body
    pub exposed: bool,
    /// More than one value node may be bound
    pub allow_multiple: bool,
    /// How bound arrays map onto slots
    pub binding: PropertyBinding,
    /// Shown on the node
    pub visible: bool,
}

impl ValueLink {
    /// Create a new readable, writable, exposed value link
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
            value_type,
            readable: true,
            writable: true,
            exposed: true,
            allow_multiple: false,
            binding: PropertyBinding::Single,
            visible: true,
        }
    }

    /// Result link: written by the node, never read
    pub fn output(mut self) -> Self {
        self.readable = false;
        self.writable = true;
        self
    }

    /// Parameter link: read by the node, never written
    pub fn input_only(mut self) -> Self {
        self.readable = true;
        self.writable = false;
        self
    }

    /// Allow more than one bound value node
    pub fn multiple(mut self) -> Self {
        self.allow_multiple = true;
        self
    }

    /// One slot per array element
    pub fn per_element(mut self) -> Self {
        self.binding = PropertyBinding::PerElement;
        self
    }

    /// Hide from the node body
    pub fn hidden(mut self) -> Self {
        self.exposed = false;
        self
    }

    /// Bound value nodes, in binding order
    pub fn values(&self) -> &[NodeId] {
        &self.values
    }

    /// Whether any value node is bound
    pub fn is_bound(&self) -> bool {
        !self.values.is_empty()
    }
}

/// The links a node declares when it is initialized
#[derive(Debug, Clone, Default)]
pub struct LinkSet {
    pub(crate) inputs: Vec<InputLink>,
    pub(crate) outputs: Vec<OutputLink>,
    pub(crate) values: Vec<ValueLink>,
}

impl LinkSet {
    /// Create an empty link set
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an input link
    pub fn input(&mut self, name: impl Into<String>) -> &mut Self {
        self.inputs.push(InputLink::new(name));
        self
    }

    /// Declare an immediate output link
    pub fn output(&mut self, name: impl Into<String>) -> &mut Self {
        self.outputs.push(OutputLink::new(name));
        self
    }

    /// Declare an output link whose threads continue on the next frame
    pub fn deferred_output(&mut self, name: impl Into<String>) -> &mut Self {
        let mut link = OutputLink::new(name);
        link.immediate = false;
        self.outputs.push(link);
        self
    }

    /// Declare a value link
    pub fn value(&mut self, link: ValueLink) -> &mut Self {
        self.values.push(link);
        self
    }

    /// Whether an input with this name was declared
    pub fn has_input(&self, name: &str) -> bool {
        self.inputs.iter().any(|l| l.name == name)
    }

    /// Whether an output with this name was declared
    pub fn has_output(&self, name: &str) -> bool {
        self.outputs.iter().any(|l| l.name == name)
    }
}

/// Error when creating a connection
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Link not found on the node
    #[error("Link '{link}' not found on node {node}")]
    LinkNotFound {
        /// Node searched
        node: NodeId,
        /// Missing link
        link: String,
    },

    /// Target of a value binding is not a value node
    #[error("Node {0} is not a value node")]
    NotAValueNode(NodeId),

    /// Value node type cannot satisfy the link
    #[error("Value link '{link}' expects {expected}, found {found}")]
    IncompatibleValue {
        /// Link name
        link: String,
        /// Type the link expects
        expected: ValueType,
        /// Type of the value node
        found: ValueType,
    },

    /// Array value node bound to a single-value link
    #[error("Value link '{0}' takes a single value and cannot bind an array")]
    ArrayIntoScalar(String),

    /// Connection already exists
    #[error("Link '{0}' is already connected to that target")]
    AlreadyConnected(String),

    /// Node bound to itself
    #[error("Self-binding not allowed")]
    SelfLoop,
}
