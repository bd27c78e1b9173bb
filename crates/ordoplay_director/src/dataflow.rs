// SPDX-License-Identifier: MIT OR Apache-2.0
//! Reading and writing through value links.
//!
//! A value link resolves to an ordered list of slots: one per bound scalar
//! node, one per element of a bound array when the link binds per element.
//! External value proxies forward to whatever their own "Value" link binds.

use crate::node::{NodeBody, NodeId};
use crate::property::PropertyBinding;
use crate::script::Script;
use crate::value::Value;
use crate::value_node::ValueRole;

/// Proxy chains deeper than this are cut off
const MAX_PROXY_DEPTH: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    node: NodeId,
    element: Option<usize>,
}

impl Script {
    fn collect_slots(&self, node: NodeId, link: &str, binding: Option<PropertyBinding>, depth: usize, out: &mut Vec<Slot>) {
        let Some(link) = self.node(node).and_then(|n| n.value_link(link)) else {
            return;
        };
        let binding = binding.unwrap_or(link.binding);

        for &target in link.values() {
            let Some(target_node) = self.node(target) else {
                continue;
            };
            match target_node.body() {
                NodeBody::Value(value) if value.role() == ValueRole::External => {
                    let forwards = target_node.value_link("Value").is_some_and(|l| l.is_bound());
                    if forwards && depth < MAX_PROXY_DEPTH {
                        self.collect_slots(target, "Value", Some(binding), depth + 1, out);
                    } else {
                        out.push(Slot { node: target, element: None });
                    }
                }
                NodeBody::Value(_) => out.push(Slot { node: target, element: None }),
                NodeBody::ArrayValue(array) => match binding {
                    PropertyBinding::PerElement => {
                        out.extend((0..array.len()).map(|i| Slot {
                            node: target,
                            element: Some(i),
                        }));
                    }
                    PropertyBinding::Single if !array.is_empty() => out.push(Slot {
                        node: target,
                        element: Some(0),
                    }),
                    PropertyBinding::Single => {}
                },
                NodeBody::Event(_) | NodeBody::Action(_) => {}
            }
        }
    }

    fn slots(&self, node: NodeId, link: &str) -> Vec<Slot> {
        let mut out = Vec::new();
        self.collect_slots(node, link, None, 0, &mut out);
        out
    }

    fn read_slot(&self, slot: Slot) -> Option<Value> {
        let node = self.node(slot.node)?;
        match (node.body(), slot.element) {
            (NodeBody::Value(value), _) => Some(value.value().clone()),
            (NodeBody::ArrayValue(array), Some(index)) => array.element(index).cloned(),
            _ => None,
        }
    }

    fn write_slot(&mut self, slot: Slot, value: &Value) -> bool {
        let Some(node) = self.node_mut(slot.node) else {
            return false;
        };
        match slot.element {
            Some(index) => node.as_array_mut().is_some_and(|a| a.set_element(index, value)),
            None => node.as_value_mut().is_some_and(|v| v.set_value(value)),
        }
    }

    /// Number of slots a value link resolves to
    pub fn link_value_count(&self, node: NodeId, link: &str) -> usize {
        self.slots(node, link).len()
    }

    /// Value of one slot of a value link
    pub fn link_value_at(&self, node: NodeId, link: &str, index: usize) -> Option<Value> {
        let slot = *self.slots(node, link).get(index)?;
        self.read_slot(slot)
    }

    /// Values of every slot of a value link
    pub fn link_values(&self, node: NodeId, link: &str) -> Vec<Value> {
        self.slots(node, link)
            .into_iter()
            .filter_map(|slot| self.read_slot(slot))
            .collect()
    }

    /// Write a value into every slot of a value link.
    ///
    /// Returns the value nodes whose contents changed, each once.
    pub fn write_link(&mut self, node: NodeId, link: &str, value: &Value) -> Vec<NodeId> {
        let mut changed = Vec::new();
        for slot in self.slots(node, link) {
            if self.write_slot(slot, value) && !changed.contains(&slot.node) {
                changed.push(slot.node);
            }
        }
        changed
    }

    /// Write a value into one slot of a value link.
    ///
    /// Returns the value node when its contents changed.
    pub fn write_link_at(&mut self, node: NodeId, link: &str, index: usize, value: &Value) -> Option<NodeId> {
        let slot = *self.slots(node, link).get(index)?;
        self.write_slot(slot, value).then_some(slot.node)
    }
}

#[cfg(test)]
mod tests {
    use crate::library;
    use crate::script::Script;
    use crate::value::Value;

    #[test]
    fn test_per_element_slots() {
        let registry = library::create_default_registry();
        let mut script = Script::new("Test");
        let root = script.root();
        let size = script.create_node(&registry, "Array Size", root).expect("size");
        let array = script.create_node(&registry, "Int Array", root).expect("array");
        if let Some(node) = script.node_mut(array) {
            let text = crate::codec::encode_tokens(["1", "2", "3"]);
            assert!(node.set_property_string("Value", &text));
        }
        script.bind_value(size, "Array", array).expect("bind");

        assert_eq!(script.link_value_count(size, "Array"), 3);
        assert_eq!(script.link_value_at(size, "Array", 2), Some(Value::Int(3)));
        assert_eq!(script.link_value_at(size, "Array", 3), None);

        // Writing through a per-element link writes every element
        let changed = script.write_link(size, "Array", &Value::Int(7));
        assert_eq!(changed, vec![array]);
        assert_eq!(script.link_values(size, "Array"), vec![Value::Int(7); 3]);
    }

    #[test]
    fn test_external_proxy_forwards() {
        let registry = library::create_default_registry();
        let mut script = Script::new("Test");
        let root = script.root();
        let sub = script.add_graph(root, "Sub").expect("sub");
        let outer = script.create_node(&registry, "Float", root).expect("float");
        let proxy = script.create_node(&registry, "External Value", sub).expect("proxy");
        let delay = script.create_node(&registry, "Delay", sub).expect("delay");

        script.bind_value(proxy, "Value", outer).expect("proxy bind");
        script.bind_value(delay, "Delay", proxy).expect("delay bind");

        assert_eq!(script.write_link(delay, "Delay", &Value::Float(2.5)), vec![outer]);
        assert_eq!(script.node(outer).and_then(|n| n.property("Value")), Some(Value::Float(2.5)));
        assert_eq!(script.link_value_at(delay, "Delay", 0), Some(Value::Float(2.5)));
    }

    #[test]
    fn test_unbound_proxy_holds_value() {
        let registry = library::create_default_registry();
        let mut script = Script::new("Test");
        let root = script.root();
        let proxy = script.create_node(&registry, "External Value", root).expect("proxy");
        let log = script.create_node(&registry, "Log", root).expect("log");
        script.bind_value(log, "Message", proxy).expect("bind");

        script.write_link(log, "Message", &Value::from("hello"));
        assert_eq!(script.link_values(log, "Message"), vec![Value::from("hello")]);
    }
}
