// SPDX-License-Identifier: MIT OR Apache-2.0
//! Value nodes: the storage end of every value link.
//!
//! A [`ValueNode`] holds one typed cell, an [`ArrayValueNode`] holds an
//! ordered sequence of cells of one element type. Both remember which
//! value links bind them so that writes can notify the owners.

use crate::codec;
use crate::link::ValueRef;
use crate::value::{Value, ValueType};

/// Role of a scalar value node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueRole {
    /// Stores its own value
    #[default]
    Plain,
    /// Proxy that exposes a value link of the enclosing graph; reads and
    /// writes go through its "Value" link when bound
    External,
}

/// Scalar value node
#[derive(Debug, Clone)]
pub struct ValueNode {
    value_type: ValueType,
    value: Value,
    initial: Value,
    role: ValueRole,
    pub(crate) referrers: Vec<ValueRef>,
}

impl ValueNode {
    /// Create a plain value node of the given type
    pub fn new(value_type: ValueType) -> Self {
        let value = value_type.default_value();
        Self {
            value_type,
            initial: value.clone(),
            value,
            role: ValueRole::Plain,
            referrers: Vec::new(),
        }
    }

    /// Create an external value proxy
    pub fn external() -> Self {
        Self {
            role: ValueRole::External,
            ..Self::new(ValueType::Any)
        }
    }

    /// Type of the stored value
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// Role of this node
    pub fn role(&self) -> ValueRole {
        self.role
    }

    /// Current value
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Store a value, converting it to the node type.
    ///
    /// Returns true when the stored value changed. Values that cannot be
    /// converted are dropped.
    pub fn set_value(&mut self, value: &Value) -> bool {
        let Some(value) = value.coerce(self.value_type) else {
            return false;
        };
        if value == self.value {
            return false;
        }
        self.value = value;
        true
    }

    /// Initial value (restored by [`reset`](Self::reset))
    pub fn initial_value(&self) -> &Value {
        &self.initial
    }

    /// Set the initial value
    pub fn set_initial_value(&mut self, value: &Value) -> bool {
        match value.coerce(self.value_type) {
            Some(value) => {
                self.initial = value;
                true
            }
            None => false,
        }
    }

    /// Restore the initial value; returns true when the value changed
    pub fn reset(&mut self) -> bool {
        let initial = self.initial.clone();
        self.set_value(&initial)
    }

    /// Whether the value equals its initial value (compared as strings)
    pub fn is_default(&self) -> bool {
        self.value.to_property_string() == self.initial.to_property_string()
    }

    /// Value links currently bound to this node
    pub fn referrers(&self) -> &[ValueRef] {
        &self.referrers
    }
}

/// Array value node
#[derive(Debug, Clone)]
pub struct ArrayValueNode {
    element_type: ValueType,
    elements: Vec<Value>,
    initial: Vec<Value>,
    index: usize,
    min_size: usize,
    max_size: usize,
    pub(crate) referrers: Vec<ValueRef>,
}

impl ArrayValueNode {
    /// Create an empty, unbounded array of the given element type
    pub fn new(element_type: ValueType) -> Self {
        Self {
            element_type,
            elements: Vec::new(),
            initial: Vec::new(),
            index: 0,
            min_size: 0,
            max_size: 0,
            referrers: Vec::new(),
        }
    }

    /// Element type
    pub fn element_type(&self) -> ValueType {
        self.element_type
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the array is empty
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// All elements
    pub fn elements(&self) -> &[Value] {
        &self.elements
    }

    /// Element at an explicit index
    pub fn element(&self, index: usize) -> Option<&Value> {
        self.elements.get(index)
    }

    /// Write the element at an explicit index.
    ///
    /// Out of range indices are ignored. Returns true when the element changed.
    pub fn set_element(&mut self, index: usize, value: &Value) -> bool {
        let Some(value) = value.coerce(self.element_type) else {
            return false;
        };
        match self.elements.get_mut(index) {
            Some(slot) if *slot != value => {
                *slot = value;
                true
            }
            _ => false,
        }
    }

    /// Shared element index used by [`value`](Self::value) and
    /// [`set_value`](Self::set_value)
    pub fn property_index(&self) -> usize {
        self.index
    }

    /// Select the element the shared-index accessors operate on.
    ///
    /// The index is node state: two callers interleaving a set-index and a
    /// read can observe each other's index. Prefer [`element`](Self::element).
    pub fn set_property_index(&mut self, index: usize) {
        self.index = index;
    }

    /// Element at the shared index, or the element type default when out of range
    pub fn value(&self) -> Value {
        self.elements
            .get(self.index)
            .cloned()
            .unwrap_or_else(|| self.element_type.default_value())
    }

    /// Write the element at the shared index
    pub fn set_value(&mut self, value: &Value) -> bool {
        self.set_element(self.index, value)
    }

    /// Replace the whole array, clamped to the size limits
    pub fn set_array(&mut self, values: &[Value]) -> bool {
        let mut elements: Vec<Value> = values
            .iter()
            .map(|v| v.coerce(self.element_type).unwrap_or_else(|| self.element_type.default_value()))
            .collect();
        self.clamp(&mut elements);
        if elements == self.elements {
            return false;
        }
        self.elements = elements;
        true
    }

    /// Append an element; fails when the maximum size is reached
    pub fn push(&mut self, value: &Value) -> bool {
        if self.max_size > 0 && self.elements.len() >= self.max_size {
            return false;
        }
        let value = value
            .coerce(self.element_type)
            .unwrap_or_else(|| self.element_type.default_value());
        self.elements.push(value);
        true
    }

    /// Resize, padding with defaults; clamped to the size limits
    pub fn resize(&mut self, len: usize) {
        let default = self.element_type.default_value();
        self.elements.resize(len, default);
        let mut elements = std::mem::take(&mut self.elements);
        self.clamp(&mut elements);
        self.elements = elements;
    }

    /// Minimum size (0 for none)
    pub fn min_size(&self) -> usize {
        self.min_size
    }

    /// Maximum size (0 for unbounded)
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Set the size limits and re-clamp the current contents
    pub fn set_size_limits(&mut self, min_size: usize, max_size: usize) {
        self.min_size = min_size;
        self.max_size = if max_size > 0 { max_size.max(min_size) } else { 0 };
        let mut elements = std::mem::take(&mut self.elements);
        self.clamp(&mut elements);
        self.elements = elements;
        let mut initial = std::mem::take(&mut self.initial);
        self.clamp(&mut initial);
        self.initial = initial;
    }

    /// Initial contents
    pub fn initial(&self) -> &[Value] {
        &self.initial
    }

    /// Set the initial contents, clamped to the size limits
    pub fn set_initial(&mut self, values: &[Value]) {
        let mut initial = values
            .iter()
            .filter_map(|v| v.coerce(self.element_type))
            .collect();
        self.clamp(&mut initial);
        self.initial = initial;
    }

    /// Restore the initial contents; returns true when the array changed
    pub fn reset(&mut self) -> bool {
        let initial = self.initial.clone();
        self.set_array(&initial)
    }

    /// Whether the contents equal the initial contents (compared serialized)
    pub fn is_default(&self) -> bool {
        encode_values(&self.elements) == encode_values(&self.initial)
    }

    /// Contents as a counted token string
    pub fn array_string(&self) -> String {
        encode_values(&self.elements)
    }

    /// Initial contents as a counted token string
    pub fn initial_string(&self) -> String {
        encode_values(&self.initial)
    }

    /// Parse a counted token string; tokens that do not parse become defaults
    pub fn parse_array(&self, text: &str) -> Vec<Value> {
        codec::decode_tokens(text)
            .iter()
            .map(|token| {
                Value::parse(self.element_type, token)
                    .unwrap_or_else(|| self.element_type.default_value())
            })
            .collect()
    }

    /// Value links currently bound to this node
    pub fn referrers(&self) -> &[ValueRef] {
        &self.referrers
    }

    fn clamp(&self, elements: &mut Vec<Value>) {
        if self.max_size > 0 && elements.len() > self.max_size {
            elements.truncate(self.max_size);
        }
        if elements.len() < self.min_size {
            elements.resize(self.min_size, self.element_type.default_value());
        }
    }
}

fn encode_values(values: &[Value]) -> String {
    codec::encode_tokens(values.iter().map(Value::to_property_string))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_set_and_reset() {
        let mut node = ValueNode::new(ValueType::Int);
        assert!(node.set_initial_value(&Value::Int(5)));
        assert!(node.reset());
        assert!(node.is_default());

        assert!(node.set_value(&Value::Float(7.9)));
        assert_eq!(node.value(), &Value::Int(7));
        assert!(!node.set_value(&Value::Int(7)));
        assert!(!node.set_value(&Value::String("nope".into())));
        assert!(!node.is_default());
    }

    #[test]
    fn test_array_limits() {
        let mut array = ArrayValueNode::new(ValueType::Int);
        array.set_size_limits(2, 3);
        assert_eq!(array.len(), 2);

        let values: Vec<Value> = (1..=5).map(Value::Int).collect();
        array.set_array(&values);
        assert_eq!(array.elements(), &[Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert!(!array.push(&Value::Int(4)));

        array.resize(0);
        assert_eq!(array.len(), 2);
    }

    #[test]
    fn test_reset_respects_size_limits() {
        let mut array = ArrayValueNode::new(ValueType::Int);
        array.set_size_limits(3, 4);
        array.set_initial(&[Value::Int(1)]);
        assert_eq!(array.initial(), &[Value::Int(1), Value::Int(0), Value::Int(0)]);
        array.reset();
        assert!(array.is_default());

        // Limits set after the initial contents clamp them too
        array.set_initial(&[Value::Int(1), Value::Int(2), Value::Int(3), Value::Int(4)]);
        array.set_size_limits(0, 2);
        array.reset();
        assert_eq!(array.elements(), &[Value::Int(1), Value::Int(2)]);
        assert!(array.is_default());
    }

    #[test]
    fn test_explicit_index_access() {
        let mut array = ArrayValueNode::new(ValueType::Float);
        array.set_array(&[Value::Float(1.0), Value::Float(2.0)]);
        assert_eq!(array.element(1), Some(&Value::Float(2.0)));
        assert_eq!(array.element(2), None);
        assert!(array.set_element(0, &Value::Int(9)));
        assert_eq!(array.element(0), Some(&Value::Float(9.0)));
        assert!(!array.set_element(5, &Value::Float(1.0)));
    }

    #[test]
    fn test_shared_index_interleaving() {
        // Two readers sharing one array through the legacy accessors
        let mut array = ArrayValueNode::new(ValueType::Int);
        array.set_array(&[Value::Int(10), Value::Int(20)]);

        array.set_property_index(0); // reader A selects element 0
        array.set_property_index(1); // reader B selects element 1 before A reads
        let seen_by_a = array.value();
        assert_eq!(seen_by_a, Value::Int(20));

        // The explicit accessor is unaffected by the shared index
        assert_eq!(array.element(0), Some(&Value::Int(10)));
    }

    #[test]
    fn test_array_string_and_default() {
        let mut array = ArrayValueNode::new(ValueType::String);
        array.set_initial(&[Value::from("a")]);
        array.reset();
        assert!(array.is_default());

        let text = codec::encode_tokens(["x", "y z"]);
        let parsed = array.parse_array(&text);
        assert!(array.set_array(&parsed));
        assert_eq!(array.array_string(), text);
        assert!(!array.is_default());
    }
}
