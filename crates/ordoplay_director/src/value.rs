// SPDX-License-Identifier: MIT OR Apache-2.0
//! Runtime values carried by value nodes and value links.
//!
//! The set of value types is closed: a handful of primitives plus two
//! opaque references (actors and resources). Every value has a canonical
//! string form, which is what the property layer and the persisted script
//! format exchange.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque identifier of an external actor (used as an event instigator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId(pub Uuid);

impl ActorId {
    /// Create a new random actor ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an actor ID from its string form
    pub fn parse(text: &str) -> Option<Self> {
        Uuid::parse_str(text.trim()).ok().map(Self)
    }
}

impl Default for ActorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Type of a value slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    /// Accepts any value (proxies, generic links)
    Any,
    /// Boolean
    Bool,
    /// 32-bit integer
    Int,
    /// 32-bit float
    Float,
    /// 64-bit float
    Double,
    /// String
    String,
    /// 2D vector
    Vec2,
    /// 3D vector
    Vec3,
    /// 4D vector
    Vec4,
    /// Actor reference
    Actor,
    /// Resource reference (opaque path)
    Resource,
}

impl ValueType {
    /// Human readable name, as shown in node type names
    pub fn name(&self) -> &'static str {
        match self {
            Self::Any => "Any",
            Self::Bool => "Boolean",
            Self::Int => "Int",
            Self::Float => "Float",
            Self::Double => "Double",
            Self::String => "String",
            Self::Vec2 => "Vec2",
            Self::Vec3 => "Vec3",
            Self::Vec4 => "Vec4",
            Self::Actor => "Actor",
            Self::Resource => "Resource",
        }
    }

    /// Default value for a freshly created slot of this type
    pub fn default_value(&self) -> Value {
        match self {
            Self::Any => Value::None,
            Self::Bool => Value::Bool(false),
            Self::Int => Value::Int(0),
            Self::Float => Value::Float(0.0),
            Self::Double => Value::Double(0.0),
            Self::String => Value::String(String::new()),
            Self::Vec2 => Value::Vec2([0.0; 2]),
            Self::Vec3 => Value::Vec3([0.0; 3]),
            Self::Vec4 => Value::Vec4([0.0; 4]),
            Self::Actor => Value::Actor(None),
            Self::Resource => Value::Resource(String::new()),
        }
    }

    /// Whether the type is one of the numeric scalars
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Int | Self::Float | Self::Double)
    }

    /// Check if a link of this type may be bound to a slot of `other`
    pub fn can_connect_to(&self, other: &ValueType) -> bool {
        if matches!(self, Self::Any) || matches!(other, Self::Any) {
            return true;
        }
        if self == other {
            return true;
        }
        // Numeric slots convert into each other, strings accept anything
        (self.is_numeric() && other.is_numeric())
            || matches!(self, Self::String)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A runtime value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// No value
    #[default]
    None,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i32),
    /// Float
    Float(f32),
    /// Double
    Double(f64),
    /// String
    String(String),
    /// 2D vector
    Vec2([f32; 2]),
    /// 3D vector
    Vec3([f32; 3]),
    /// 4D vector
    Vec4([f32; 4]),
    /// Actor reference (unset when `None`)
    Actor(Option<ActorId>),
    /// Resource reference
    Resource(String),
}

impl Value {
    /// Get the type of this value
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::None => ValueType::Any,
            Self::Bool(_) => ValueType::Bool,
            Self::Int(_) => ValueType::Int,
            Self::Float(_) => ValueType::Float,
            Self::Double(_) => ValueType::Double,
            Self::String(_) => ValueType::String,
            Self::Vec2(_) => ValueType::Vec2,
            Self::Vec3(_) => ValueType::Vec3,
            Self::Vec4(_) => ValueType::Vec4,
            Self::Actor(_) => ValueType::Actor,
            Self::Resource(_) => ValueType::Resource,
        }
    }

    /// Try to convert to bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Int(i) => Some(*i != 0),
            Self::Float(f) => Some(*f != 0.0),
            Self::Double(d) => Some(*d != 0.0),
            Self::String(s) => parse_bool(s),
            _ => None,
        }
    }

    /// Try to convert to int
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Float(f) => Some(*f as i32),
            Self::Double(d) => Some(*d as i32),
            Self::Bool(b) => Some(i32::from(*b)),
            Self::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Try to convert to float
    pub fn as_float(&self) -> Option<f32> {
        self.as_double().map(|d| d as f32)
    }

    /// Try to convert to double
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Self::Double(d) => Some(*d),
            Self::Float(f) => Some(f64::from(*f)),
            Self::Int(i) => Some(f64::from(*i)),
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Try to get as an actor reference
    pub fn as_actor(&self) -> Option<ActorId> {
        match self {
            Self::Actor(actor) => *actor,
            Self::String(s) => ActorId::parse(s),
            _ => None,
        }
    }

    /// Canonical string form (the property string)
    pub fn to_property_string(&self) -> String {
        match self {
            Self::None => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Double(d) => d.to_string(),
            Self::String(s) | Self::Resource(s) => s.clone(),
            Self::Vec2(v) => join_components(v),
            Self::Vec3(v) => join_components(v),
            Self::Vec4(v) => join_components(v),
            Self::Actor(actor) => actor.map(|a| a.to_string()).unwrap_or_default(),
        }
    }

    /// Parse a property string into a value of the given type
    pub fn parse(value_type: ValueType, text: &str) -> Option<Value> {
        match value_type {
            ValueType::Any => Some(if text.is_empty() {
                Value::None
            } else {
                Value::String(text.to_string())
            }),
            ValueType::Bool => parse_bool(text).map(Value::Bool),
            ValueType::Int => text.trim().parse().ok().map(Value::Int),
            ValueType::Float => text.trim().parse().ok().map(Value::Float),
            ValueType::Double => text.trim().parse().ok().map(Value::Double),
            ValueType::String => Some(Value::String(text.to_string())),
            ValueType::Resource => Some(Value::Resource(text.to_string())),
            ValueType::Vec2 => parse_components::<2>(text).map(Value::Vec2),
            ValueType::Vec3 => parse_components::<3>(text).map(Value::Vec3),
            ValueType::Vec4 => parse_components::<4>(text).map(Value::Vec4),
            ValueType::Actor => {
                if text.trim().is_empty() {
                    Some(Value::Actor(None))
                } else {
                    ActorId::parse(text).map(|a| Value::Actor(Some(a)))
                }
            }
        }
    }

    /// Convert this value into a slot of the given type.
    ///
    /// Numeric types convert into each other, anything converts to a string,
    /// and strings are parsed into the target type.
    pub fn coerce(&self, value_type: ValueType) -> Option<Value> {
        if value_type == ValueType::Any || self.value_type() == value_type {
            return Some(self.clone());
        }
        match value_type {
            ValueType::Bool => self.as_bool().map(Value::Bool),
            ValueType::Int => self.as_int().map(Value::Int),
            ValueType::Float => self.as_float().map(Value::Float),
            ValueType::Double => self.as_double().map(Value::Double),
            ValueType::String => Some(Value::String(self.to_property_string())),
            ValueType::Actor => match self {
                Value::None => Some(Value::Actor(None)),
                _ => self.as_actor().map(|a| Value::Actor(Some(a))),
            },
            _ => Value::parse(value_type, &self.to_property_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_property_string())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Self::Float(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<ActorId> for Value {
    fn from(value: ActorId) -> Self {
        Self::Actor(Some(value))
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn join_components(components: &[f32]) -> String {
    components
        .iter()
        .map(f32::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_components<const N: usize>(text: &str) -> Option<[f32; N]> {
    let mut out = [0.0; N];
    let mut parts = text.split_whitespace();
    for slot in &mut out {
        *slot = parts.next()?.parse().ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_compatibility() {
        assert!(ValueType::Int.can_connect_to(&ValueType::Float));
        assert!(ValueType::Any.can_connect_to(&ValueType::Vec3));
        assert!(ValueType::String.can_connect_to(&ValueType::Actor));
        assert!(!ValueType::Bool.can_connect_to(&ValueType::Vec3));
        assert!(!ValueType::Actor.can_connect_to(&ValueType::Float));
    }

    #[test]
    fn test_property_strings() {
        let v = Value::Vec3([1.0, 2.5, -3.0]);
        let text = v.to_property_string();
        assert_eq!(text, "1 2.5 -3");
        assert_eq!(Value::parse(ValueType::Vec3, &text), Some(v));

        assert_eq!(Value::parse(ValueType::Bool, "1"), Some(Value::Bool(true)));
        assert_eq!(Value::parse(ValueType::Int, " 42 "), Some(Value::Int(42)));
        assert_eq!(Value::parse(ValueType::Vec2, "1 2 3"), None);
        assert_eq!(Value::parse(ValueType::Actor, ""), Some(Value::Actor(None)));
    }

    #[test]
    fn test_coercion() {
        assert_eq!(Value::Float(3.7).coerce(ValueType::Int), Some(Value::Int(3)));
        assert_eq!(Value::Int(2).coerce(ValueType::String), Some(Value::String("2".into())));
        assert_eq!(Value::String("x".into()).coerce(ValueType::Float), None);

        let actor = ActorId::new();
        let as_text = Value::String(actor.to_string());
        assert_eq!(as_text.coerce(ValueType::Actor), Some(Value::Actor(Some(actor))));
    }
}
