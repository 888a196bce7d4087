//! Result row formatting
//!
//! Converts backend rows into JSON objects that are always serializable:
//! non-finite floats become `null`, binary data becomes base64 text, nested
//! lists and maps are cleaned recursively.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{Map, Number, Value as JsonValue};

use crate::types::{Row, Value};

/// JSON object for one formatted row
pub type JsonRow = Map<String, JsonValue>;

/// Make a single value JSON-safe
pub fn clean(value: &Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Boolean(b) => JsonValue::Bool(*b),
        Value::Integer(i) => JsonValue::Number((*i).into()),
        // NaN and the infinities have no JSON representation
        Value::Float(f) => Number::from_f64(*f).map_or(JsonValue::Null, JsonValue::Number),
        Value::Text(s) => JsonValue::String(s.clone()),
        Value::Blob(bytes) => JsonValue::String(BASE64.encode(bytes)),
        Value::List(items) => JsonValue::Array(items.iter().map(clean).collect()),
        Value::Map(entries) => JsonValue::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), clean(v)))
                .collect(),
        ),
    }
}

/// Clean one row, keeping column order
pub fn format_row(row: &Row) -> JsonRow {
    row.iter().map(|(k, v)| (k.clone(), clean(v))).collect()
}

/// Clean every row; the output has the same length and order as the input
pub fn format_rows(rows: &[Row]) -> Vec<JsonRow> {
    rows.iter().map(format_row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use serde_json::json;

    fn row(entries: Vec<(&str, Value)>) -> Row {
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    #[test]
    fn test_non_finite_floats_become_null() {
        let rows = vec![row(vec![
            ("a", Value::Float(f64::NAN)),
            ("b", Value::Float(f64::INFINITY)),
            ("c", Value::Float(f64::NEG_INFINITY)),
            ("d", Value::Float(1.5)),
        ])];

        let formatted = format_rows(&rows);
        assert_eq!(
            JsonValue::Object(formatted[0].clone()),
            json!({"a": null, "b": null, "c": null, "d": 1.5})
        );
    }

    #[test]
    fn test_nested_values_are_cleaned() {
        let mut inner = IndexMap::new();
        inner.insert("x".to_string(), Value::Float(f64::NAN));
        inner.insert("y".to_string(), Value::Integer(2));

        let value = Value::List(vec![
            Value::Integer(1),
            Value::Float(f64::INFINITY),
            Value::Map(inner),
        ]);
        assert_eq!(clean(&value), json!([1, null, {"x": null, "y": 2}]));
    }

    #[test]
    fn test_other_values_pass_through() {
        assert_eq!(clean(&Value::Null), JsonValue::Null);
        assert_eq!(clean(&Value::Boolean(true)), json!(true));
        assert_eq!(clean(&Value::Text("Acme".into())), json!("Acme"));
        assert_eq!(clean(&Value::Integer(-7)), json!(-7));
        assert_eq!(clean(&Value::Blob(b"hi".to_vec())), json!("aGk="));
    }

    #[test]
    fn test_row_order_and_column_order_preserved() {
        let rows = vec![
            row(vec![("z", Value::Integer(1)), ("a", Value::Integer(2))]),
            row(vec![("z", Value::Integer(3)), ("a", Value::Integer(4))]),
        ];
        let formatted = format_rows(&rows);
        assert_eq!(formatted.len(), 2);
        let keys: Vec<_> = formatted[0].keys().cloned().collect();
        assert_eq!(keys, vec!["z", "a"]);
        assert_eq!(formatted[1]["z"], json!(3));
    }

    #[test]
    fn test_empty_input() {
        assert!(format_rows(&[]).is_empty());
    }
}
