//! Literal values and slot addressing
//!
//! [`Value`] is what a template assigns to an attribute or an unconnected
//! input slot. [`SlotRef`] addresses a slot on a node either by name or by
//! position, the same way host node types expose their sockets.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// A literal attribute or default value
///
/// Serialized untagged so that `2` and `2.0` stay distinct in fingerprints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Boolean flag
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String or enum identifier
    Text(String),
    /// Fixed-size numeric vector (colors, coordinates)
    Vector(Vec<f64>),
}

impl Value {
    /// Short name of the value kind, used in diagnostics
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Vector(_) => "vector",
        }
    }

    /// False for NaN or infinite floats and vectors containing them
    #[must_use]
    pub fn is_finite(&self) -> bool {
        match self {
            Self::Float(x) => x.is_finite(),
            Self::Vector(v) => v.iter().all(|x| x.is_finite()),
            Self::Bool(_) | Self::Int(_) | Self::Text(_) => true,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x:?}"),
            Self::Text(s) => write!(f, "'{s}'"),
            Self::Vector(v) => {
                let parts: Vec<String> = v.iter().map(|x| format!("{x:?}")).collect();
                write!(f, "({})", parts.join(", "))
            }
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Self::Float(f64::from(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl<const N: usize> From<[f64; N]> for Value {
    fn from(value: [f64; N]) -> Self {
        Self::Vector(value.to_vec())
    }
}

/// Address of an input or output slot on a node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SlotRef {
    /// Slot addressed by its name
    Name(String),
    /// Slot addressed by its position
    Index(usize),
}

impl SlotRef {
    /// Parse a mapping key: non-negative integers are positions, anything else a name
    #[must_use]
    pub fn parse_key(key: &str) -> Self {
        key.parse::<usize>()
            .map_or_else(|_| Self::Name(key.to_string()), Self::Index)
    }
}

impl Display for SlotRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "'{name}'"),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

impl From<&str> for SlotRef {
    fn from(value: &str) -> Self {
        Self::Name(value.to_string())
    }
}

impl From<String> for SlotRef {
    fn from(value: String) -> Self {
        Self::Name(value)
    }
}

impl From<usize> for SlotRef {
    fn from(value: usize) -> Self {
        Self::Index(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_and_float_serialize_differently() {
        let int = serde_json::to_string(&Value::Int(2)).unwrap();
        let float = serde_json::to_string(&Value::Float(2.0)).unwrap();
        assert_eq!(int, "2");
        assert_eq!(float, "2.0");
    }

    #[test]
    fn slot_key_parsing() {
        assert_eq!(SlotRef::parse_key("0"), SlotRef::Index(0));
        assert_eq!(SlotRef::parse_key("12"), SlotRef::Index(12));
        assert_eq!(SlotRef::parse_key("a"), SlotRef::Name("a".into()));
        assert_eq!(SlotRef::parse_key("-1"), SlotRef::Name("-1".into()));
    }

    #[test]
    fn value_display() {
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
        assert_eq!(Value::from("MULTIPLY").to_string(), "'MULTIPLY'");
        assert_eq!(Value::from([1.0, 0.5]).to_string(), "(1.0, 0.5)");
    }

    #[test]
    fn finiteness() {
        assert!(Value::Float(2.0).is_finite());
        assert!(Value::Int(3).is_finite());
        assert!(!Value::Float(f64::NAN).is_finite());
        assert!(!Value::Vector(vec![0.0, f64::NEG_INFINITY]).is_finite());
        assert_eq!(Value::Float(f64::INFINITY).kind(), "float");
    }
}
