// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph boundary nodes.
//!
//! Port nodes mark where flow and data cross into and out of a sub-graph.
//! Flow ports are pass-through actions; the external value port is a value
//! proxy that forwards to whatever its own "Value" link binds.

use crate::behavior::{ActionBehavior, NodeBehavior, PortRole};
use crate::context::NodeContext;
use crate::node::{NodeBody, NodeCategory, NodeRegistry, NodeType};

/// Register the port node types
pub fn register(registry: &mut NodeRegistry) {
    registry.register(NodeType::new(
        "Input Link",
        NodeCategory::Port,
        "Entry point of a sub-graph",
        || NodeBody::action(FlowPort::input()),
    ));
    registry.register(NodeType::new(
        "Output Link",
        NodeCategory::Port,
        "Exit point of a sub-graph",
        || NodeBody::action(FlowPort::output()),
    ));
    registry.register(NodeType::new(
        "External Value",
        NodeCategory::Port,
        "Exposes a value link of a sub-graph",
        NodeBody::external_value,
    ));
}

/// Pass-through flow port
#[derive(Debug)]
pub struct FlowPort {
    role: PortRole,
}

impl FlowPort {
    /// Sub-graph entry
    pub fn input() -> Self {
        Self { role: PortRole::Input }
    }

    /// Sub-graph exit
    pub fn output() -> Self {
        Self { role: PortRole::Output }
    }
}

impl NodeBehavior for FlowPort {
    fn port_role(&self) -> Option<PortRole> {
        Some(self.role)
    }
}

impl ActionBehavior for FlowPort {
    fn update(&mut self, _ctx: &mut NodeContext<'_>) -> bool {
        false
    }
}
