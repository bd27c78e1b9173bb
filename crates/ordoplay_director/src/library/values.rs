// SPDX-License-Identifier: MIT OR Apache-2.0
//! Value and array value node types, one per supported value type.

use crate::node::{NodeBody, NodeCategory, NodeFactory, NodeRegistry, NodeType};
use crate::value::ValueType;

const SCALARS: [(&str, NodeFactory); 10] = [
    ("Boolean", || NodeBody::value(ValueType::Bool)),
    ("Int", || NodeBody::value(ValueType::Int)),
    ("Float", || NodeBody::value(ValueType::Float)),
    ("Double", || NodeBody::value(ValueType::Double)),
    ("String", || NodeBody::value(ValueType::String)),
    ("Vec2", || NodeBody::value(ValueType::Vec2)),
    ("Vec3", || NodeBody::value(ValueType::Vec3)),
    ("Vec4", || NodeBody::value(ValueType::Vec4)),
    ("Actor", || NodeBody::value(ValueType::Actor)),
    ("Resource", || NodeBody::value(ValueType::Resource)),
];

const ARRAYS: [(&str, NodeFactory); 7] = [
    ("Boolean Array", || NodeBody::array(ValueType::Bool)),
    ("Int Array", || NodeBody::array(ValueType::Int)),
    ("Float Array", || NodeBody::array(ValueType::Float)),
    ("Double Array", || NodeBody::array(ValueType::Double)),
    ("String Array", || NodeBody::array(ValueType::String)),
    ("Vec3 Array", || NodeBody::array(ValueType::Vec3)),
    ("Actor Array", || NodeBody::array(ValueType::Actor)),
];

/// Register the value node types
pub fn register(registry: &mut NodeRegistry) {
    for (name, factory) in SCALARS {
        registry.register(NodeType::new(name, NodeCategory::Value, format!("{name} value"), factory));
    }
    for (name, factory) in ARRAYS {
        registry.register(NodeType::new(name, NodeCategory::Array, format!("{name} value"), factory));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphId;

    #[test]
    fn test_value_types_match_names() {
        let mut registry = NodeRegistry::new();
        register(&mut registry);
        let node = registry.create_node("Vec3", GraphId::new());
        assert_eq!(node.and_then(|n| n.stored_type()), Some(ValueType::Vec3));
        let array = registry.create_node("Actor Array", GraphId::new());
        assert_eq!(array.and_then(|n| n.stored_type()), Some(ValueType::Actor));
    }
}
