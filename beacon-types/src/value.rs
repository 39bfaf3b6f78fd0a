//! Scalar values carried in an event's detail data.

use alloc::collections::BTreeMap;
use alloc::string::String;

/// Detail data attached to an event, keyed by field name.
pub type Data = BTreeMap<String, Value>;

/// A scalar detail value.
///
/// Event data is deliberately flat: a handful of keys mapping to primitives.
/// Serialized untagged, so `Value::Int(3)` is just `3` on the wire.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Value {
    /// Returns the string payload, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as a float if it is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the integer payload, if this is an integer value.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v.into())
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        i64::try_from(v).map_or(Value::Float(v as f64), Value::Int)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        i64::try_from(v).map_or(Value::Float(v as f64), Value::Int)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.into())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn large_unsigned_falls_back_to_float() {
        assert_eq!(Value::from(7u64), Value::Int(7));
        assert!(matches!(Value::from(u64::MAX), Value::Float(_)));
    }

    #[test]
    fn accessors() {
        assert_eq!(Value::from("x").as_str(), Some("x"));
        assert_eq!(Value::from(2).as_f64(), Some(2.0));
        assert_eq!(Value::from(2.5).as_i64(), None);
        assert!(Value::from(None::<i64>).is_null());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serializes_untagged() {
        let mut data = Data::new();
        data.insert("a".into(), Value::from(1));
        data.insert("b".into(), Value::from("two"));
        data.insert("c".into(), Value::Null);
        data.insert("d".into(), Value::from(true));

        let json = serde_json::to_string(&data).unwrap();
        assert_eq!(json, r#"{"a":1,"b":"two","c":null,"d":true}"#);

        let parsed: Data = serde_json::from_str(r#"{"x":1.5,"y":3}"#).unwrap();
        assert_eq!(parsed.get("x"), Some(&Value::Float(1.5)));
        assert_eq!(parsed.get("y"), Some(&Value::Int(3)));
    }
}
