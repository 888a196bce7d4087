//! Core data types shared by the backends and the formatter

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single result row, column name to value, in backend column order
pub type Row = IndexMap<String, Value>;

/// Backend-neutral value decoded from a result row
///
/// Floats are kept as-is, including NaN and the infinities; the formatter
/// is responsible for making them JSON-safe.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL
    Null,
    /// Boolean value
    Boolean(bool),
    /// 64-bit signed integer
    Integer(i64),
    /// 64-bit floating point number
    Float(f64),
    /// UTF-8 string
    Text(String),
    /// Binary data
    Blob(Vec<u8>),
    /// Sequence (JSON arrays)
    List(Vec<Value>),
    /// Mapping (JSON objects), insertion ordered
    Map(IndexMap<String, Value>),
}

impl Value {
    /// Try to borrow this value as a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => n.as_f64().map_or(Value::Null, Value::Float),
            },
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => write!(f, "{}", s),
            Value::Blob(b) => write!(f, "<{} bytes>", b.len()),
            Value::List(items) => write!(f, "[{} items]", items.len()),
            Value::Map(map) => write!(f, "{{{} entries}}", map.len()),
        }
    }
}

/// Column metadata as reported by schema introspection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Column name
    pub column_name: String,
    /// Backend-declared type, verbatim (e.g. `INTEGER`, `varchar(64)`)
    pub column_type: String,
}

/// Table summary served to clients that build their column definitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub table_name: String,
    pub total_rows: u64,
    pub columns: Vec<ColumnInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_from_json_keeps_nesting_and_order() {
        let json = serde_json::json!({"b": [1, 2.5, null], "a": {"x": "y"}});
        let value = Value::from(json);

        let Value::Map(map) = value else {
            panic!("Expected map");
        };
        let keys: Vec<_> = map.keys().cloned().collect();
        assert_eq!(keys, vec!["b".to_string(), "a".to_string()]);
        assert_eq!(
            map["b"],
            Value::List(vec![Value::Integer(1), Value::Float(2.5), Value::Null])
        );
    }

    #[test]
    fn test_value_as_str() {
        assert_eq!(Value::Text("a".into()).as_str(), Some("a"));
        assert_eq!(Value::Integer(3).as_str(), None);
        assert_eq!(Value::Null.as_str(), None);
    }
}
