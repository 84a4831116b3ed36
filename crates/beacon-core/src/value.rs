//! Dynamic values stored in instance property sets

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A dynamically typed property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum Value {
    /// No value / null
    #[default]
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(String),
    /// List of values
    List(Vec<Value>),
    /// Nested property bag
    Map(ValueMap),
}

/// A property bag: string keys mapped to dynamic values
///
/// Uses IndexMap so property order is stable, which keeps diffs and dumps
/// deterministic.
pub type ValueMap = IndexMap<String, Value>;

impl Value {
    /// Check if this value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to get this value as a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get this value as an integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get this value as a float (integers widen)
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get this value as a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get this value as a list
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }

    /// Try to get this value as a property bag
    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Look up a property when this value is a map
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map().and_then(|map| map.get(key))
    }

    /// Structural equality, as used for diffing
    ///
    /// Unlike `==`, floats compare by bit pattern, so a `NaN` equals an
    /// identical `NaN`. Lists compare element-wise and maps key by key,
    /// regardless of key order.
    pub fn structural_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.structural_eq(y))
            }
            (Value::Map(a), Value::Map(b)) => maps_structurally_equal(a, b),
            _ => self == other,
        }
    }

    /// Get the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }
}

/// Compare two property bags with [`Value::structural_eq`]
pub(crate) fn maps_structurally_equal(a: &ValueMap, b: &ValueMap) -> bool {
    a.len() == b.len()
        && a.iter()
            .all(|(key, value)| b.get(key).is_some_and(|other| value.structural_eq(other)))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(fl) => write!(f, "{}", fl),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::List(list) => {
                write!(f, "[")?;
                for (i, v) in list.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<ValueMap> for Value {
    fn from(map: ValueMap) -> Self {
        Value::Map(map)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(vec: Vec<T>) -> Self {
        Value::List(vec.into_iter().map(Into::into).collect())
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Value::Map(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_accessors() {
        assert!(Value::Null.is_null());
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Int(42).as_int(), Some(42));
        assert_eq!(Value::Int(42).as_float(), Some(42.0));
        assert_eq!(Value::String("hello".into()).as_str(), Some("hello"));
        assert_eq!(Value::Int(1).as_str(), None);
    }

    #[test]
    fn test_value_map_lookup() {
        let value: Value = [("Name", "Alice"), ("Other", "value1")]
            .into_iter()
            .collect();

        assert_eq!(value.type_name(), "map");
        assert_eq!(value.get("Name").and_then(Value::as_str), Some("Alice"));
        assert!(value.get("Missing").is_none());
        assert!(Value::Int(3).get("Name").is_none());
    }

    #[test]
    fn test_value_display() {
        let value: Value = [("Name", Value::from("Alice")), ("Age", Value::from(30))]
            .into_iter()
            .collect();
        assert_eq!(value.to_string(), "{Name: \"Alice\", Age: 30}");
        assert_eq!(Value::from(vec![1i64, 2]).to_string(), "[1, 2]");
    }

    #[test]
    fn test_structural_eq_handles_nan() {
        let nan = Value::Float(f64::NAN);
        assert_ne!(nan, nan.clone());
        assert!(nan.structural_eq(&nan.clone()));

        let nested: Value = [("Ratio", Value::from(vec![Value::Float(f64::NAN)]))]
            .into_iter()
            .collect();
        assert!(nested.structural_eq(&nested.clone()));

        assert!(!Value::Float(1.0).structural_eq(&Value::Int(1)));
        assert!(!Value::Float(0.0).structural_eq(&Value::Float(-0.0)));
    }

    #[test]
    fn test_value_ron_roundtrip() {
        let value: Value = [("Name", "Alice")].into_iter().collect();
        let text = ron::to_string(&value).expect("serialize");
        let back: Value = ron::from_str(&text).expect("deserialize");
        assert_eq!(back, value);
    }
}
