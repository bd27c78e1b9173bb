// SPDX-License-Identifier: MIT OR Apache-2.0
//! Built-in node types.
//!
//! Hosts start from [`create_default_registry`] and register their own node
//! types next to these.

pub mod actions;
pub mod arrays;
pub mod events;
pub mod ports;
pub mod values;

use crate::node::NodeRegistry;

/// Create a registry holding every built-in node type
pub fn create_default_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    events::register(&mut registry);
    actions::register(&mut registry);
    arrays::register(&mut registry);
    ports::register(&mut registry);
    values::register(&mut registry);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeCategory, NodeKind};

    #[test]
    fn test_default_registry_contents() {
        let registry = create_default_registry();
        for name in ["Start", "Tick", "Remote Event", "Value Changed"] {
            assert_eq!(registry.get(name).map(|t| t.kind()), Some(NodeKind::Event), "{name}");
        }
        for name in ["Delay", "Timer", "Log", "Set Value", "Compare", "Math", "Call Remote Event"] {
            assert_eq!(registry.get(name).map(|t| t.kind()), Some(NodeKind::Action), "{name}");
        }
        assert_eq!(registry.get("Float").map(|t| t.kind()), Some(NodeKind::Value));
        assert_eq!(registry.get("Int Array").map(|t| t.kind()), Some(NodeKind::ArrayValue));
        assert_eq!(registry.types_in_category(NodeCategory::Port).count(), 3);
    }
}
