//! Recursive context values.

use std::sync::Arc;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::key::Key;
use crate::map::Map;
use crate::object::{LogObject, ANONYMOUS_CLASS};

/// A node in a log context tree.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Seq(Vec<Value>),
    Map(Map),
    /// An object already converted into its public fields.
    Object(ObjectValue),
    /// An application object that has not been converted yet.
    Raw(RawObject),
}

/// A converted object: its type name (`None` for anonymous types) and its
/// public fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectValue {
    pub type_name: Option<String>,
    pub fields: Map,
}

impl ObjectValue {
    pub fn new(type_name: impl Into<String>, fields: Map) -> Self {
        ObjectValue {
            type_name: Some(type_name.into()),
            fields,
        }
    }

    pub fn anonymous(fields: Map) -> Self {
        ObjectValue {
            type_name: None,
            fields,
        }
    }

    /// Type name, or the anonymous marker.
    pub fn display_name(&self) -> &str {
        self.type_name.as_deref().unwrap_or(ANONYMOUS_CLASS)
    }
}

/// Shared handle to an unconverted application object.
#[derive(Clone)]
pub struct RawObject(pub Arc<dyn LogObject>);

impl RawObject {
    pub fn display_name(&self) -> &str {
        self.0.type_name().unwrap_or(ANONYMOUS_CLASS)
    }

    pub fn object(&self) -> &dyn LogObject {
        self.0.as_ref()
    }
}

impl std::fmt::Debug for RawObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RawObject({})", self.display_name())
    }
}

impl PartialEq for RawObject {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Value {
    /// Wrap an application object for later conversion.
    pub fn object<T: LogObject>(object: T) -> Value {
        Value::Raw(RawObject(Arc::new(object)))
    }

    pub fn shared(object: Arc<dyn LogObject>) -> Value {
        Value::Raw(RawObject(object))
    }

    /// Loose truthiness: null, false, zero, empty string, `"0"` and empty
    /// containers are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !(s.is_empty() || s == "0"),
            Value::Seq(items) => !items.is_empty(),
            Value::Map(map) => !map.is_empty(),
            Value::Object(_) | Value::Raw(_) => true,
        }
    }

    /// Type name used in sentinel strings.
    pub fn debug_type(&self) -> &str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Seq(_) | Value::Map(_) => "array",
            Value::Object(obj) => obj.display_name(),
            Value::Raw(raw) => raw.display_name(),
        }
    }

    /// Sequences, maps and converted objects: anything the tree walker
    /// descends into.
    pub fn is_container(&self) -> bool {
        matches!(self, Value::Seq(_) | Value::Map(_) | Value::Object(_))
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, Value::Raw(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectValue> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Child lookup on maps, sequences and object fields.
    pub fn get(&self, key: impl Into<Key>) -> Option<&Value> {
        let key = key.into();
        match self {
            Value::Map(map) => map.get(&key),
            Value::Seq(items) => key.as_index().and_then(|i| items.get(i)),
            Value::Object(obj) => obj.fields.get(&key),
            _ => None,
        }
    }

    /// Convert to a JSON document.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(n) => serializer.serialize_i64(*n),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::String(s) => serializer.serialize_str(s),
            Value::Seq(items) => items.serialize(serializer),
            Value::Map(map) => map.serialize(serializer),
            Value::Object(obj) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(obj.display_name(), &obj.fields)?;
                map.end()
            }
            Value::Raw(raw) => serializer.collect_str(&format_args!("[object {}]", raw.display_name())),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Seq(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(entries) => Value::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (Key::from_text(&k), Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n.into())
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        i64::try_from(n).map_or(Value::Float(n as f64), Value::Int)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::Map(map)
    }
}

impl From<ObjectValue> for Value {
    fn from(obj: ObjectValue) -> Self {
        Value::Object(obj)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Seq(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map;

    #[derive(Debug)]
    struct Token;

    impl LogObject for Token {
        fn type_name(&self) -> Option<&str> {
            Some("Token")
        }

        fn fields(&self) -> Map {
            map! { "value" => "abc" }
        }
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(!Value::from("0").is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::Seq(vec![]).is_truthy());
        assert!(Value::from("00").is_truthy());
        assert!(Value::object(Token).is_truthy());
    }

    #[test]
    fn test_debug_type() {
        assert_eq!(Value::Int(1).debug_type(), "int");
        assert_eq!(Value::Map(Map::new()).debug_type(), "array");
        assert_eq!(Value::object(Token).debug_type(), "Token");
        assert_eq!(
            Value::Object(ObjectValue::anonymous(Map::new())).debug_type(),
            ANONYMOUS_CLASS
        );
    }

    #[test]
    fn test_serialize_object_wrapper_shape() {
        let value = Value::Object(ObjectValue::new("App\\User", map! { "name" => "bob" }));
        assert_eq!(
            value.to_json(),
            serde_json::json!({ "App\\User": { "name": "bob" } })
        );
        assert_eq!(Value::object(Token).to_json(), serde_json::json!("[object Token]"));
    }

    #[test]
    fn test_from_json_coerces_numeric_keys() {
        let value = Value::from(serde_json::json!({ "10": "a", "name": [1, 2.5] }));
        assert_eq!(value.get(10), Some(&Value::from("a")));
        assert_eq!(value.get("name").and_then(|v| v.get(1)), Some(&Value::Float(2.5)));
    }
}
