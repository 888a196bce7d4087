//! Grid-state request model
//!
//! Typed form of the payload a server-side row model grid sends for every
//! block it needs: the row window, sort order, column filters, grouping state
//! and aggregation columns. Parsing is lenient the same way the grid's own
//! backends are: missing collections are empty, malformed row bounds are
//! treated as missing instead of rejected.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};

use super::filter::ColumnFilter;
use crate::{Error, Result};

/// `endRow` used when the request does not carry one
pub const DEFAULT_END_ROW: i64 = 500;

/// Page size used when a row bound is missing or the window is not positive
pub const FALLBACK_PAGE_SIZE: u64 = 100;

/// Column filters keyed by column id, in request order
pub type FilterModel = IndexMap<String, ColumnFilter>;

/// One server-side row model block request
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridRequest {
    /// First row of the window (inclusive)
    #[serde(default = "default_start_row", deserialize_with = "lenient_bound")]
    pub start_row: Option<i64>,

    /// End of the window (exclusive)
    #[serde(default = "default_end_row", deserialize_with = "lenient_bound")]
    pub end_row: Option<i64>,

    /// Sort order, highest precedence first
    #[serde(default, deserialize_with = "null_as_default")]
    pub sort_model: Vec<SortModelItem>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub filter_model: FilterModel,

    /// Grouping columns, outermost first
    #[serde(default, deserialize_with = "null_as_default")]
    pub row_group_cols: Vec<ColumnVo>,

    /// Values of the expanded group path, outermost first
    #[serde(default, deserialize_with = "null_as_default")]
    pub group_keys: Vec<GroupKey>,

    /// Columns to aggregate when grouping
    #[serde(default, deserialize_with = "null_as_default")]
    pub value_cols: Vec<ValueColumn>,
}

impl Default for GridRequest {
    fn default() -> Self {
        Self {
            start_row: default_start_row(),
            end_row: default_end_row(),
            sort_model: Vec::new(),
            filter_model: FilterModel::new(),
            row_group_cols: Vec::new(),
            group_keys: Vec::new(),
            value_cols: Vec::new(),
        }
    }
}

impl GridRequest {
    /// Parse a request from a JSON value
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| Error::invalid_request(e.to_string()))
    }

    /// Parse a request from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::invalid_request(e.to_string()))
    }

    /// True iff any grouping column is configured
    pub fn is_grouping_active(&self) -> bool {
        !self.row_group_cols.is_empty()
    }

    /// Column grouped at the current drill depth, or `None` at leaf level
    pub fn current_group_column(&self) -> Option<&ColumnVo> {
        self.row_group_cols.get(self.group_keys.len())
    }

    /// Group columns already drilled into plus the one being grouped now
    pub fn applied_group_columns(&self) -> &[ColumnVo] {
        let depth = (self.group_keys.len() + 1).min(self.row_group_cols.len());
        &self.row_group_cols[..depth]
    }

    /// Requested number of rows, never above `i64::MAX`
    pub fn effective_page_size(&self) -> u64 {
        match (self.start_row, self.end_row) {
            (Some(start), Some(end)) => match end.checked_sub(start) {
                Some(len) if len > 0 => len as u64,
                _ => FALLBACK_PAGE_SIZE,
            },
            _ => FALLBACK_PAGE_SIZE,
        }
    }

    /// Row offset of the window
    pub fn offset(&self) -> u64 {
        self.start_row.unwrap_or(0).max(0) as u64
    }

    /// `startRow == 0 && endRow == 0` asks for every matching row
    pub fn is_unpaginated(&self) -> bool {
        self.start_row == Some(0) && self.end_row == Some(0)
    }
}

/// One entry of the sort model
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortModelItem {
    pub col_id: String,
    #[serde(default)]
    pub sort: SortDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl<'de> Deserialize<'de> for SortDirection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw.as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("asc") => Ok(SortDirection::Asc),
            Some("desc") => Ok(SortDirection::Desc),
            Some(other) => Err(serde::de::Error::custom(format!(
                "unknown sort direction '{}'",
                other
            ))),
        }
    }
}

/// Column descriptor used for grouping columns
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnVo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl ColumnVo {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Column name: `id`, falling back to `field`
    pub fn name(&self) -> Result<&str> {
        first_non_empty(&self.id, &self.field)
            .ok_or_else(|| Error::build("group column has neither id nor field"))
    }

    /// Column the expanded group path is matched on: `field`, falling back
    /// to `id`
    pub fn field_name(&self) -> Result<&str> {
        first_non_empty(&self.field, &self.id)
            .ok_or_else(|| Error::build("group column has neither field nor id"))
    }
}

/// Column to aggregate while grouping
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueColumn {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub agg_func: Option<String>,
}

impl ValueColumn {
    pub fn new(field: impl Into<String>, agg_func: impl Into<String>) -> Self {
        Self {
            id: None,
            field: Some(field.into()),
            agg_func: Some(agg_func.into()),
        }
    }

    /// Column name: `field`, falling back to `id`
    pub fn name(&self) -> Result<&str> {
        first_non_empty(&self.field, &self.id)
            .ok_or_else(|| Error::build("value column has neither field nor id"))
    }

    /// Requested aggregation; anything unsupported becomes `sum`
    pub fn aggregation(&self) -> AggregationFunction {
        self.agg_func
            .as_deref()
            .map_or(AggregationFunction::Sum, AggregationFunction::from_name)
    }
}

/// Supported aggregation functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationFunction {
    Sum,
    Avg,
    Count,
    Min,
    Max,
}

impl AggregationFunction {
    /// Lenient lookup: unknown names fall back to `Sum`
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "avg" => AggregationFunction::Avg,
            "count" => AggregationFunction::Count,
            "min" => AggregationFunction::Min,
            "max" => AggregationFunction::Max,
            _ => AggregationFunction::Sum,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            AggregationFunction::Sum => "sum",
            AggregationFunction::Avg => "avg",
            AggregationFunction::Count => "count",
            AggregationFunction::Min => "min",
            AggregationFunction::Max => "max",
        }
    }
}

/// One value of the expanded group path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupKey {
    /// The group of rows whose value is NULL
    Null,
    /// Any other group, compared as text
    Value(String),
}

impl<'de> Deserialize<'de> for GroupKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::Null => Ok(GroupKey::Null),
            serde_json::Value::String(s) => Ok(GroupKey::Value(s)),
            serde_json::Value::Number(n) => Ok(GroupKey::Value(n.to_string())),
            serde_json::Value::Bool(b) => Ok(GroupKey::Value(b.to_string())),
            other => Err(serde::de::Error::custom(format!(
                "group key must be a scalar, got {}",
                other
            ))),
        }
    }
}

impl From<&str> for GroupKey {
    fn from(value: &str) -> Self {
        GroupKey::Value(value.to_string())
    }
}

fn first_non_empty<'a>(primary: &'a Option<String>, fallback: &'a Option<String>) -> Option<&'a str> {
    primary
        .as_deref()
        .filter(|s| !s.is_empty())
        .or_else(|| fallback.as_deref().filter(|s| !s.is_empty()))
}

fn default_start_row() -> Option<i64> {
    Some(0)
}

fn default_end_row() -> Option<i64> {
    Some(DEFAULT_END_ROW)
}

/// Accept integers, floats and numeric strings; anything else is "missing"
fn lenient_bound<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<i64>, D::Error> {
    let raw = serde_json::Value::deserialize(deserializer)?;
    Ok(match raw {
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
        serde_json::Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f as i64)
            })
        }
        _ => None,
    })
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
