// SPDX-License-Identifier: MIT OR Apache-2.0
//! Array access nodes.
//!
//! These address elements by explicit index through per-element value
//! links; they never touch an array node's shared property index.

use crate::behavior::{ActionBehavior, NodeBehavior};
use crate::context::NodeContext;
use crate::link::{LinkSet, ValueLink};
use crate::node::{NodeBody, NodeCategory, NodeRegistry, NodeType};
use crate::property::{PropertyDef, PropertyMap};
use crate::value::{Value, ValueType};

/// Register the array node types
pub fn register(registry: &mut NodeRegistry) {
    registry.register(NodeType::new(
        "Get Array Item",
        NodeCategory::Array,
        "Reads one element of an array",
        || NodeBody::action(GetArrayItem::default()),
    ));
    registry.register(NodeType::new(
        "Set Array Item",
        NodeCategory::Array,
        "Writes one element of an array",
        || NodeBody::action(SetArrayItem::default()),
    ));
    registry.register(NodeType::new(
        "Array Size",
        NodeCategory::Array,
        "Counts the elements bound to Array",
        || NodeBody::action(ArraySize),
    ));
}

fn index_property(index: i32, name: &str) -> Option<Value> {
    (name == "Index").then_some(Value::Int(index))
}

fn resolve_index(ctx: &NodeContext<'_>, fallback: i32) -> Option<usize> {
    let index = ctx.int_or("Index", fallback);
    let index = usize::try_from(index).ok()?;
    (index < ctx.property_count("Array")).then_some(index)
}

/// Copies `Array[Index]` into "Item"
#[derive(Debug, Default)]
pub struct GetArrayItem {
    index: i32,
}

impl NodeBehavior for GetArrayItem {
    fn init(&self, links: &mut LinkSet) {
        links
            .input("In")
            .output("Out")
            .output("Out of Range")
            .value(ValueLink::new("Array", ValueType::Any).input_only().per_element())
            .value(ValueLink::new("Index", ValueType::Int).input_only())
            .value(ValueLink::new("Item", ValueType::Any).output().multiple());
    }

    fn build_property_map(&self, map: &mut PropertyMap) {
        map.add(PropertyDef::new("Index", ValueType::Int));
    }

    fn property(&self, name: &str) -> Option<Value> {
        index_property(self.index, name)
    }

    fn set_property(&mut self, name: &str, value: &Value) -> bool {
        match (name, value.as_int()) {
            ("Index", Some(index)) => {
                self.index = index;
                true
            }
            _ => false,
        }
    }
}

impl ActionBehavior for GetArrayItem {
    fn update(&mut self, ctx: &mut NodeContext<'_>) -> bool {
        let item = resolve_index(ctx, self.index).and_then(|i| ctx.get_at("Array", i));
        match item {
            Some(item) => {
                ctx.set("Item", item);
            }
            None => {
                ctx.activate_output("Out of Range");
            }
        }
        false
    }
}

/// Writes "Item" into `Array[Index]`
#[derive(Debug, Default)]
pub struct SetArrayItem {
    index: i32,
    item: String,
}

impl NodeBehavior for SetArrayItem {
    fn init(&self, links: &mut LinkSet) {
        links
            .input("In")
            .output("Out")
            .output("Out of Range")
            .value(ValueLink::new("Array", ValueType::Any).per_element())
            .value(ValueLink::new("Index", ValueType::Int).input_only())
            .value(ValueLink::new("Item", ValueType::Any).input_only());
    }

    fn build_property_map(&self, map: &mut PropertyMap) {
        map.add(PropertyDef::new("Index", ValueType::Int))
            .add(PropertyDef::new("Item", ValueType::String).description("Used when Item is unbound"));
    }

    fn property(&self, name: &str) -> Option<Value> {
        match name {
            "Item" => Some(Value::String(self.item.clone())),
            _ => index_property(self.index, name),
        }
    }

    fn set_property(&mut self, name: &str, value: &Value) -> bool {
        match name {
            "Index" => match value.as_int() {
                Some(index) => {
                    self.index = index;
                    true
                }
                None => false,
            },
            "Item" => {
                self.item = value.to_property_string();
                true
            }
            _ => false,
        }
    }
}

impl ActionBehavior for SetArrayItem {
    fn update(&mut self, ctx: &mut NodeContext<'_>) -> bool {
        let Some(index) = resolve_index(ctx, self.index) else {
            ctx.activate_output("Out of Range");
            return false;
        };
        let item = ctx
            .get("Item")
            .unwrap_or_else(|| Value::String(self.item.clone()));
        ctx.set_at("Array", index, item);
        false
    }
}

/// Writes the number of elements bound to "Array" into "Size"
#[derive(Debug, Default)]
pub struct ArraySize;

impl NodeBehavior for ArraySize {
    fn init(&self, links: &mut LinkSet) {
        links
            .value(ValueLink::new("Array", ValueType::Any).input_only().multiple().per_element())
            .value(ValueLink::new("Size", ValueType::Int).output().multiple());
    }
}

impl ActionBehavior for ArraySize {
    fn update(&mut self, ctx: &mut NodeContext<'_>) -> bool {
        let size = i32::try_from(ctx.property_count("Array")).unwrap_or(i32::MAX);
        ctx.set("Size", size);
        false
    }
}
