// SPDX-License-Identifier: MIT OR Apache-2.0
//! Property map: the named, typed property bag each node exposes to the
//! reflection and persistence layers.

use crate::value::ValueType;
use indexmap::IndexMap;

/// How a property maps onto the slots of its value link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PropertyBinding {
    /// One value per bound node; array nodes are rejected
    #[default]
    Single,
    /// One slot per array element (scalar nodes count as one element)
    PerElement,
}

/// Definition of a single node property
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDef {
    /// Property name
    pub name: String,
    /// Value type of the property
    pub value_type: ValueType,
    /// Setter is rejected when set
    pub read_only: bool,
    /// The property holds an array (counted token string)
    pub array: bool,
    /// Slot binding used when the property doubles as a value link default
    pub binding: PropertyBinding,
    /// Description
    pub description: String,
}

impl PropertyDef {
    /// Create a new writable scalar property
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            read_only: false,
            array: false,
            binding: PropertyBinding::Single,
            description: String::new(),
        }
    }

    /// Mark as read-only
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Mark as an array property
    pub fn array(mut self) -> Self {
        self.array = true;
        self.binding = PropertyBinding::PerElement;
        self
    }

    /// Bind one slot per array element
    pub fn per_element(mut self) -> Self {
        self.binding = PropertyBinding::PerElement;
        self
    }

    /// Set description
    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }
}

/// Ordered collection of property definitions.
///
/// Built once per node right after construction; order is preserved and is
/// the order properties are persisted and restored in.
#[derive(Debug, Clone, Default)]
pub struct PropertyMap {
    defs: IndexMap<String, PropertyDef>,
}

impl PropertyMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a property. A later registration with the same name
    /// replaces the earlier definition in place.
    pub fn add(&mut self, def: PropertyDef) -> &mut Self {
        self.defs.insert(def.name.clone(), def);
        self
    }

    /// Get a property definition
    pub fn get(&self, name: &str) -> Option<&PropertyDef> {
        self.defs.get(name)
    }

    /// Whether a property exists
    pub fn contains(&self, name: &str) -> bool {
        self.defs.contains_key(name)
    }

    /// Whether a property is read-only (unknown properties count as read-only)
    pub fn is_read_only(&self, name: &str) -> bool {
        self.defs.get(name).map_or(true, |d| d.read_only)
    }

    /// Iterate definitions in registration order
    pub fn iter(&self) -> impl Iterator<Item = &PropertyDef> {
        self.defs.values()
    }

    /// Number of properties
    pub fn len(&self) -> usize {
        self.defs.len()
    }

    /// Whether the map is empty
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_map_order() {
        let mut map = PropertyMap::new();
        map.add(PropertyDef::new("Min Size", ValueType::Int))
            .add(PropertyDef::new("Value", ValueType::Float).array())
            .add(PropertyDef::new("Size", ValueType::Int).read_only());

        let names: Vec<_> = map.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["Min Size", "Value", "Size"]);
        assert!(map.is_read_only("Size"));
        assert!(map.is_read_only("Missing"));
        assert_eq!(map.get("Value").map(|d| d.binding), Some(PropertyBinding::PerElement));
    }
}
