//! Table schema whitelist
//!
//! Column identifiers in a grid request are user input and cannot be bound as
//! parameters. When a whitelist is available every identifier the builder
//! emits must name a real column of the target table.

use std::collections::HashSet;

use crate::types::ColumnInfo;

/// Set of column names known to exist in the target table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnWhitelist {
    names: HashSet<String>,
}

impl ColumnWhitelist {
    /// Build from introspected column metadata
    pub fn from_columns(columns: &[ColumnInfo]) -> Self {
        Self::from_names(columns.iter().map(|c| c.column_name.as_str()))
    }

    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            names: names.into_iter().map(str::to_lowercase).collect(),
        }
    }

    /// Column names compare case-insensitively, as both backends do
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(&name.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
