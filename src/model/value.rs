//! Scalar and structured values carried by configuration nodes.

use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{ConfigNode, KeyedList};

/// A configuration value.
///
/// Enumerations are carried as [`Value::Str`]; the engine has no knowledge of
/// domain types.
/// Deserialization is by shape: a map carrying `$key` is always a
/// [`KeyedList`], so its invariants are enforced instead of the map falling
/// back to a plain node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Boolean leaf
    Bool(bool),
    /// Integer leaf
    Int(i64),
    /// String or enumeration leaf
    Str(String),
    /// Leaf-list of values, compared as a whole
    List(Vec<Value>),
    /// List of nodes keyed by an identity field
    Keyed(KeyedList),
    /// Nested subtree
    Node(ConfigNode),
}

impl Value {
    /// Returns true for leaf values (bool, int, string).
    pub fn is_scalar(&self) -> bool {
        matches!(self, Value::Bool(_) | Value::Int(_) | Value::Str(_))
    }

    /// Stringified form of a scalar, `None` for structured values.
    pub fn as_scalar_string(&self) -> Option<String> {
        match self {
            Value::Bool(b) => Some(b.to_string()),
            Value::Int(i) => Some(i.to_string()),
            Value::Str(s) => Some(s.clone()),
            _ => None,
        }
    }

    /// Borrow as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow as an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Borrow as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Borrow as a nested node.
    pub fn as_node(&self) -> Option<&ConfigNode> {
        match self {
            Value::Node(n) => Some(n),
            _ => None,
        }
    }

    /// Borrow as a keyed list.
    pub fn as_keyed(&self) -> Option<&KeyedList> {
        match self {
            Value::Keyed(l) => Some(l),
            _ => None,
        }
    }

    /// Truthiness used by template conditions: false, empty strings and
    /// empty collections are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(_) => true,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Keyed(list) => !list.is_empty(),
            Value::Node(node) => !node.is_empty(),
        }
    }

    /// Short type name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Keyed(_) => "keyed list",
            Value::Node(_) => "node",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Str(s) => write!(f, "{}", s),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Value::Keyed(list) => write!(f, "<{} entries keyed by {}>", list.len(), list.key()),
            Value::Node(node) => write!(f, "<node with {} fields>", node.len()),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a boolean, integer, string, list or map")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Value, E> {
        Ok(Value::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Value, E> {
        i64::try_from(v)
            .map(Value::Int)
            .map_err(|_| E::custom(format!("integer {} out of range", v)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Value, E> {
        Ok(Value::Str(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<Value, E> {
        Ok(Value::Str(v))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Value, A::Error> {
        let mut items = Vec::new();
        while let Some(item) = seq.next_element::<Value>()? {
            items.push(item);
        }
        Ok(Value::List(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Value, A::Error> {
        let mut node = ConfigNode::new();
        while let Some((name, value)) = map.next_entry::<String, Value>()? {
            node = node.with(name, value);
        }
        if !node.contains(KEY_MARKER) {
            return Ok(Value::Node(node));
        }
        keyed_list(node).map(Value::Keyed).map_err(de::Error::custom)
    }
}

const KEY_MARKER: &str = "$key";

/// Build a keyed list from its serialized form, `{"$key": .., "entries": [..]}`.
fn keyed_list(raw: ConfigNode) -> crate::error::Result<KeyedList> {
    let invalid = |message: String| crate::error::Error::InvalidData(message);
    let mut key = None;
    let mut entries = Vec::new();
    for (name, value) in raw.iter() {
        match (name.as_str(), value) {
            (KEY_MARKER, Value::Str(k)) => key = Some(k.clone()),
            (KEY_MARKER, other) => {
                return Err(invalid(format!("'$key' must be a string, not {}", other.kind())))
            }
            ("entries", Value::List(items)) => {
                for item in items {
                    match item {
                        Value::Node(entry) => entries.push(entry.clone()),
                        other => {
                            return Err(invalid(format!(
                                "keyed list entries must be maps, not {}",
                                other.kind()
                            )))
                        }
                    }
                }
            }
            ("entries", other) => {
                return Err(invalid(format!("'entries' must be a list, not {}", other.kind())))
            }
            (other, _) => return Err(invalid(format!("unknown keyed list field '{}'", other))),
        }
    }
    let key = key.ok_or_else(|| invalid("keyed list is missing '$key'".to_string()))?;
    KeyedList::from_entries(key, entries)
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
        Value::Int(i64::from(i))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<ConfigNode> for Value {
    fn from(n: ConfigNode) -> Self {
        Value::Node(n)
    }
}

impl From<KeyedList> for Value {
    fn from(l: KeyedList) -> Self {
        Value::Keyed(l)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

/// Explicit three-valued setting: leave unspecified, clear, or set.
///
/// Replaces nullable booleans and string sentinels such as `"FALSE"`;
/// `Unset` and `Clear` are never collapsed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tristate<T> {
    /// Nothing to say about this setting
    #[default]
    Unset,
    /// Explicitly remove/negate the setting
    Clear,
    /// Set to the given value
    Set(T),
}

impl<T> Tristate<T> {
    /// True when no value is carried and nothing should be emitted.
    pub fn is_unset(&self) -> bool {
        matches!(self, Tristate::Unset)
    }

    /// True when the setting must be negated.
    pub fn is_clear(&self) -> bool {
        matches!(self, Tristate::Clear)
    }

    /// True when a value is carried.
    pub fn is_set(&self) -> bool {
        matches!(self, Tristate::Set(_))
    }

    /// Borrow the carried value.
    pub fn as_ref(&self) -> Tristate<&T> {
        match self {
            Tristate::Unset => Tristate::Unset,
            Tristate::Clear => Tristate::Clear,
            Tristate::Set(v) => Tristate::Set(v),
        }
    }

    /// Map the carried value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Tristate<U> {
        match self {
            Tristate::Unset => Tristate::Unset,
            Tristate::Clear => Tristate::Clear,
            Tristate::Set(v) => Tristate::Set(f(v)),
        }
    }

    /// The carried value, if any.
    pub fn set_value(self) -> Option<T> {
        match self {
            Tristate::Set(v) => Some(v),
            _ => None,
        }
    }
}

impl<T> From<Option<T>> for Tristate<T> {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => Tristate::Set(v),
            None => Tristate::Unset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_strings() {
        assert_eq!(Value::from(12).as_scalar_string().unwrap(), "12");
        assert_eq!(Value::from(true).as_scalar_string().unwrap(), "true");
        assert_eq!(Value::from("abc").as_scalar_string().unwrap(), "abc");
        assert!(Value::from(vec!["a", "b"]).as_scalar_string().is_none());
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::from(false).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(Value::from("FALSE").is_truthy());
        assert!(Value::from(0).is_truthy());
        assert!(!Value::List(vec![]).is_truthy());
    }

    #[test]
    fn test_tristate() {
        let t: Tristate<bool> = None.into();
        assert!(t.is_unset());
        assert!(Tristate::<bool>::Clear.is_clear());
        assert_eq!(Tristate::Set(2).map(|v| v * 2), Tristate::Set(4));
        assert_eq!(Tristate::Set("x").set_value(), Some("x"));
    }

    #[test]
    fn test_untagged_json() {
        let v: Value = serde_json::from_str("12").unwrap();
        assert_eq!(v, Value::Int(12));
        let v: Value = serde_json::from_str("\"a870.5d28.b3c8\"").unwrap();
        assert_eq!(v, Value::from("a870.5d28.b3c8"));
        let v: Value = serde_json::from_str("[\"65000:1\", \"65000:2\"]").unwrap();
        assert_eq!(v, Value::from(vec!["65000:1", "65000:2"]));
    }
}
