//! Column filter descriptors and their WHERE predicates
//!
//! A filter model entry is dispatched on its `filterType` into one of the
//! closed set of variants below. Entries whose type is not recognised are
//! kept as [`ColumnFilter::Unsupported`] and contribute no predicate.

use serde::{Deserialize, Deserializer};
use serde_json::Value as JsonValue;

use super::sql::{SqlParam, Statement};
use crate::{Error, Result};

/// One entry of the filter model
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnFilter {
    Text(TextFilter),
    Number(NumberFilter),
    Set(SetFilter),
    /// Unrecognised `filterType`; dropped when building the WHERE clause
    Unsupported { filter_type: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFilter {
    pub operator: TextOperator,
    pub filter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextOperator {
    Contains,
    Equals,
    StartsWith,
    EndsWith,
    NotContains,
    Blank,
    NotBlank,
    Other(String),
}

impl TextOperator {
    fn parse(name: &str) -> Self {
        match name {
            "contains" => TextOperator::Contains,
            "equals" => TextOperator::Equals,
            "startsWith" => TextOperator::StartsWith,
            "endsWith" => TextOperator::EndsWith,
            "notContains" => TextOperator::NotContains,
            "blank" => TextOperator::Blank,
            "notBlank" => TextOperator::NotBlank,
            other => TextOperator::Other(other.to_string()),
        }
    }
}

/// Number filter; operands stay raw until the predicate is built
#[derive(Debug, Clone, PartialEq)]
pub struct NumberFilter {
    pub operator: NumberOperator,
    pub filter: Option<JsonValue>,
    pub filter_to: Option<JsonValue>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NumberOperator {
    Equals,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
    InRange,
    Blank,
    NotBlank,
    Other(String),
}

impl NumberOperator {
    fn parse(name: &str) -> Self {
        match name {
            "equals" => NumberOperator::Equals,
            "greaterThan" => NumberOperator::GreaterThan,
            "lessThan" => NumberOperator::LessThan,
            "greaterThanOrEqual" => NumberOperator::GreaterThanOrEqual,
            "lessThanOrEqual" => NumberOperator::LessThanOrEqual,
            "inRange" => NumberOperator::InRange,
            "blank" => NumberOperator::Blank,
            "notBlank" => NumberOperator::NotBlank,
            other => NumberOperator::Other(other.to_string()),
        }
    }

    fn comparison(&self) -> Option<&'static str> {
        match self {
            NumberOperator::Equals => Some("="),
            NumberOperator::GreaterThan => Some(">"),
            NumberOperator::LessThan => Some("<"),
            NumberOperator::GreaterThanOrEqual => Some(">="),
            NumberOperator::LessThanOrEqual => Some("<="),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetFilter {
    pub values: Vec<JsonValue>,
}

impl ColumnFilter {
    /// Dispatch a raw filter descriptor on its `filterType`
    pub fn from_json(raw: &JsonValue) -> std::result::Result<Self, String> {
        let obj = raw
            .as_object()
            .ok_or_else(|| format!("filter descriptor must be an object, got {}", raw))?;

        let filter_type = obj
            .get("filterType")
            .and_then(JsonValue::as_str)
            .unwrap_or("text");
        let operator = obj.get("type").and_then(JsonValue::as_str);

        match filter_type {
            "text" => Ok(ColumnFilter::Text(TextFilter {
                operator: TextOperator::parse(operator.unwrap_or("contains")),
                filter: text_operand(obj.get("filter"))?,
            })),
            "number" => Ok(ColumnFilter::Number(NumberFilter {
                operator: NumberOperator::parse(operator.unwrap_or("equals")),
                filter: obj.get("filter").cloned(),
                filter_to: obj.get("filterTo").cloned(),
            })),
            "set" => {
                let values = match obj.get("values") {
                    None | Some(JsonValue::Null) => Vec::new(),
                    Some(JsonValue::Array(values)) => values.clone(),
                    Some(other) => {
                        return Err(format!("set filter values must be a list, got {}", other))
                    }
                };
                Ok(ColumnFilter::Set(SetFilter { values }))
            }
            other => Ok(ColumnFilter::Unsupported {
                filter_type: other.to_string(),
            }),
        }
    }

    /// Predicate for `column` (already quoted), or `None` if the filter
    /// contributes nothing
    pub fn to_predicate(&self, column: &str, column_name: &str) -> Result<Option<Statement>> {
        match self {
            ColumnFilter::Text(text) => Ok(text.to_predicate(column)),
            ColumnFilter::Number(number) => number.to_predicate(column, column_name),
            ColumnFilter::Set(set) => set.to_predicate(column, column_name),
            ColumnFilter::Unsupported { .. } => Ok(None),
        }
    }
}

impl<'de> Deserialize<'de> for ColumnFilter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = JsonValue::deserialize(deserializer)?;
        ColumnFilter::from_json(&raw).map_err(serde::de::Error::custom)
    }
}

impl TextFilter {
    fn to_predicate(&self, column: &str) -> Option<Statement> {
        match self.operator {
            TextOperator::NotBlank => {
                return Some(Statement::raw(format!(
                    "{c} IS NOT NULL AND {c} != ''",
                    c = column
                )))
            }
            TextOperator::Blank => {
                return Some(Statement::raw(format!("({c} IS NULL OR {c} = '')", c = column)))
            }
            _ => {}
        }

        let value = self.filter.as_deref().filter(|v| !v.is_empty())?;
        let (op, pattern) = match self.operator {
            TextOperator::Contains => ("LIKE", format!("%{}%", value)),
            TextOperator::Equals => ("=", value.to_string()),
            TextOperator::StartsWith => ("LIKE", format!("{}%", value)),
            TextOperator::EndsWith => ("LIKE", format!("%{}", value)),
            TextOperator::NotContains => ("NOT LIKE", format!("%{}%", value)),
            _ => return None,
        };

        let mut stmt = Statement::raw(format!("{} {} ", column, op));
        stmt.push_param(SqlParam::Text(pattern));
        Some(stmt)
    }
}

impl NumberFilter {
    fn to_predicate(&self, column: &str, column_name: &str) -> Result<Option<Statement>> {
        match &self.operator {
            NumberOperator::NotBlank => Ok(Some(Statement::raw(format!(
                "{c} IS NOT NULL AND {c} != 0",
                c = column
            )))),
            NumberOperator::Blank => Ok(Some(Statement::raw(format!(
                "({c} IS NULL OR {c} = 0)",
                c = column
            )))),
            NumberOperator::InRange => {
                let from = numeric_operand(self.filter.as_ref(), column_name)?;
                let to = match self.filter_to.as_ref() {
                    Some(raw) if !raw.is_null() => numeric_operand(Some(raw), column_name)?,
                    _ => from.clone(),
                };
                let mut stmt = Statement::raw(format!("{} BETWEEN ", column));
                stmt.push_param(from);
                stmt.push_sql(" AND ");
                stmt.push_param(to);
                Ok(Some(stmt))
            }
            NumberOperator::Other(_) => Ok(None),
            op => {
                let Some(symbol) = op.comparison() else {
                    return Ok(None);
                };
                let mut stmt = Statement::raw(format!("{} {} ", column, symbol));
                stmt.push_param(numeric_operand(self.filter.as_ref(), column_name)?);
                Ok(Some(stmt))
            }
        }
    }
}

impl SetFilter {
    fn to_predicate(&self, column: &str, column_name: &str) -> Result<Option<Statement>> {
        let mut members = Vec::with_capacity(self.values.len());
        let mut includes_null = false;

        for value in &self.values {
            match value {
                JsonValue::Null => includes_null = true,
                JsonValue::String(s) => members.push(SqlParam::Text(s.clone())),
                JsonValue::Number(n) => members.push(SqlParam::Text(n.to_string())),
                JsonValue::Bool(b) => members.push(SqlParam::Text(b.to_string())),
                other => {
                    return Err(Error::build(format!(
                        "set filter on '{}' contains a non-scalar value {}",
                        column_name, other
                    )))
                }
            }
        }

        if members.is_empty() {
            return Ok(includes_null.then(|| Statement::raw(format!("{} IS NULL", column))));
        }

        let mut membership = Statement::raw(format!("{} IN (", column));
        for (i, member) in members.into_iter().enumerate() {
            if i > 0 {
                membership.push_sql(", ");
            }
            membership.push_param(member);
        }
        membership.push_sql(")");

        if !includes_null {
            return Ok(Some(membership));
        }

        let mut stmt = Statement::raw("(");
        stmt.append(membership);
        stmt.push_sql(format!(" OR {} IS NULL)", column));
        Ok(Some(stmt))
    }
}

fn text_operand(raw: Option<&JsonValue>) -> std::result::Result<Option<String>, String> {
    match raw {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::String(s)) => Ok(Some(s.clone())),
        Some(JsonValue::Number(n)) => Ok(Some(n.to_string())),
        Some(JsonValue::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(format!("text filter value must be a scalar, got {}", other)),
    }
}

/// Missing operands compare against 0
fn numeric_operand(raw: Option<&JsonValue>, column_name: &str) -> Result<SqlParam> {
    let invalid = |v: &JsonValue| {
        Error::build(format!(
            "number filter on '{}' has non-numeric value {}",
            column_name, v
        ))
    };

    match raw {
        None | Some(JsonValue::Null) => Ok(SqlParam::Integer(0)),
        Some(JsonValue::Number(n)) => match n.as_i64() {
            Some(i) => Ok(SqlParam::Integer(i)),
            None => n
                .as_f64()
                .map(SqlParam::Real)
                .ok_or_else(|| invalid(&JsonValue::Number(n.clone()))),
        },
        Some(JsonValue::String(s)) => {
            let trimmed = s.trim();
            if let Ok(i) = trimmed.parse::<i64>() {
                return Ok(SqlParam::Integer(i));
            }
            match trimmed.parse::<f64>() {
                Ok(f) if f.is_finite() => Ok(SqlParam::Real(f)),
                _ => Err(invalid(&JsonValue::String(s.clone()))),
            }
        }
        Some(other) => Err(invalid(other)),
    }
}
