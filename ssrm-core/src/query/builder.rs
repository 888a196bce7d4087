//! SQL query builder for server-side row model requests
//!
//! Pure translation from a [`GridRequest`] to a main statement and a count
//! statement. No I/O happens here. Clauses are always concatenated in the
//! fixed order SELECT, WHERE, GROUP BY, ORDER BY, LIMIT.

use std::collections::HashSet;

use tracing::debug;

use super::request::{GridRequest, GroupKey};
use super::sql::{Dialect, SqlParam, Statement, TableRef};
use crate::schema::ColumnWhitelist;
use crate::{Error, Result};

/// Main and count statements built from one request snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    /// Page of rows (or groups)
    pub query: Statement,
    /// Total matching rows (or distinct groups), same WHERE predicate
    pub count_query: Statement,
}

/// Builds SQL for one grid request against one table
#[derive(Debug, Clone)]
pub struct QueryBuilder<'a> {
    request: &'a GridRequest,
    table: &'a TableRef,
    dialect: Dialect,
    base_query: Option<&'a str>,
    whitelist: Option<&'a ColumnWhitelist>,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(request: &'a GridRequest, table: &'a TableRef, dialect: Dialect) -> Self {
        Self {
            request,
            table,
            dialect,
            base_query: None,
            whitelist: None,
        }
    }

    /// Use a caller-supplied `SELECT ... FROM ...` for non-grouped requests
    pub fn with_base_query(mut self, base_query: Option<&'a str>) -> Self {
        self.base_query = base_query;
        self
    }

    /// Reject identifiers that are not in `whitelist`
    pub fn with_whitelist(mut self, whitelist: Option<&'a ColumnWhitelist>) -> Self {
        self.whitelist = whitelist;
        self
    }

    /// Build both statements
    pub fn build(&self) -> Result<QueryPlan> {
        let plan = QueryPlan {
            query: self.build_query()?,
            count_query: self.build_count_query()?,
        };
        debug!(
            table = %self.table,
            query = %plan.query,
            count_query = %plan.count_query,
            "Built grid query"
        );
        Ok(plan)
    }

    /// SELECT + WHERE + GROUP BY + ORDER BY + LIMIT
    pub fn build_query(&self) -> Result<Statement> {
        let mut stmt = self.select_clause()?;
        stmt.append(self.where_clause()?);
        stmt.append(self.group_by_clause()?);
        stmt.append(self.order_by_clause()?);
        stmt.append(self.limit_clause());
        Ok(stmt)
    }

    /// Row count for non-grouped requests, distinct group count otherwise
    pub fn build_count_query(&self) -> Result<Statement> {
        let table = self.dialect.quote_table(self.table);
        let mut stmt = match self.grouping_column()? {
            Some(group_col) => Statement::raw(format!(
                "SELECT COUNT(DISTINCT {}) FROM {}",
                group_col, table
            )),
            None => Statement::raw(format!("SELECT COUNT(*) FROM {}", table)),
        };
        stmt.append(self.where_clause()?);
        Ok(stmt)
    }

    pub fn select_clause(&self) -> Result<Statement> {
        let table = self.dialect.quote_table(self.table);

        if !self.request.is_grouping_active() {
            return Ok(match self.base_query.map(str::trim) {
                Some(base) if base.to_ascii_lowercase().starts_with("select") => {
                    Statement::raw(base)
                }
                _ => Statement::raw(format!("SELECT * FROM {}", table)),
            });
        }

        let Some(group_col) = self.grouping_column()? else {
            // drilled down to the leaf level
            return Ok(Statement::raw(format!("SELECT * FROM {}", table)));
        };

        let mut columns = vec![group_col];
        for value_col in &self.request.value_cols {
            let field = self.column(value_col.name()?)?;
            columns.push(format!(
                "{}({}) AS {}",
                value_col.aggregation().as_sql(),
                field,
                field
            ));
        }
        if self.request.value_cols.is_empty() {
            columns.push(format!("count(*) AS {}", self.dialect.quote_ident("count")));
        }

        Ok(Statement::raw(format!(
            "SELECT {} FROM {}",
            columns.join(", "),
            table
        )))
    }

    /// Group-path constraints followed by column filters, AND-combined
    pub fn where_clause(&self) -> Result<Statement> {
        let mut parts = Vec::new();

        for (group_col, key) in self.request.row_group_cols.iter().zip(&self.request.group_keys) {
            let column = self.column(group_col.field_name()?)?;
            let part = match key {
                GroupKey::Null => Statement::raw(format!("{} IS NULL", column)),
                GroupKey::Value(value) => {
                    let mut stmt = Statement::raw(format!("{} = ", column));
                    stmt.push_param(SqlParam::Text(value.clone()));
                    stmt
                }
            };
            parts.push(part);
        }

        for (field, filter) in &self.request.filter_model {
            let column = self.column(field)?;
            if let Some(predicate) = filter.to_predicate(&column, field)? {
                parts.push(predicate);
            }
        }

        if parts.is_empty() {
            return Ok(Statement::new());
        }

        let mut stmt = Statement::raw(" WHERE ");
        stmt.append(Statement::join(parts, " AND "));
        Ok(stmt)
    }

    pub fn group_by_clause(&self) -> Result<Statement> {
        Ok(match self.grouping_column()? {
            Some(group_col) => Statement::raw(format!(" GROUP BY {}", group_col)),
            None => Statement::new(),
        })
    }

    /// Grouped requests may only sort by projected columns; other entries
    /// are dropped
    pub fn order_by_clause(&self) -> Result<Statement> {
        if self.request.sort_model.is_empty() {
            return Ok(Statement::new());
        }

        let allowed: Option<HashSet<&str>> = if self.request.is_grouping_active() {
            let mut allowed = HashSet::new();
            for group_col in self.request.applied_group_columns() {
                allowed.insert(group_col.name()?);
            }
            for value_col in &self.request.value_cols {
                allowed.insert(value_col.name()?);
            }
            Some(allowed)
        } else {
            None
        };

        let mut parts = Vec::with_capacity(self.request.sort_model.len());
        for item in &self.request.sort_model {
            if let Some(allowed) = &allowed {
                if !allowed.contains(item.col_id.as_str()) {
                    continue;
                }
            }
            parts.push(format!(
                "{} {}",
                self.column(&item.col_id)?,
                item.sort.as_sql()
            ));
        }

        if parts.is_empty() {
            return Ok(Statement::new());
        }
        Ok(Statement::raw(format!(" ORDER BY {}", parts.join(", "))))
    }

    pub fn limit_clause(&self) -> Statement {
        if self.request.is_unpaginated() {
            return Statement::new();
        }
        Statement::raw(format!(
            " LIMIT {} OFFSET {}",
            self.request.effective_page_size(),
            self.request.offset()
        ))
    }

    /// Quoted current group column, `None` when not grouping or at leaf level
    fn grouping_column(&self) -> Result<Option<String>> {
        if !self.request.is_grouping_active() {
            return Ok(None);
        }
        match self.request.current_group_column() {
            Some(group_col) => Ok(Some(self.column(group_col.name()?)?)),
            None => Ok(None),
        }
    }

    /// Validate against the whitelist and quote
    fn column(&self, name: &str) -> Result<String> {
        if let Some(whitelist) = self.whitelist {
            if !whitelist.contains(name) {
                return Err(Error::unknown_column(name));
            }
        }
        Ok(self.dialect.quote_ident(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(value: serde_json::Value) -> GridRequest {
        GridRequest::from_value(value).unwrap()
    }

    fn plan(value: serde_json::Value) -> QueryPlan {
        let req = request(value);
        let table = TableRef::new("demo_data");
        QueryBuilder::new(&req, &table, Dialect::default())
            .build()
            .unwrap()
    }

    #[test]
    fn test_plain_request() {
        let plan = plan(json!({"startRow": 0, "endRow": 100}));
        assert_eq!(
            plan.query.to_inline_sql(),
            "SELECT * FROM \"demo_data\" LIMIT 100 OFFSET 0"
        );
        assert_eq!(
            plan.count_query.to_inline_sql(),
            "SELECT COUNT(*) FROM \"demo_data\""
        );
    }

    #[test]
    fn test_zero_window_omits_limit() {
        let plan = plan(json!({"startRow": 0, "endRow": 0}));
        assert_eq!(plan.query.to_inline_sql(), "SELECT * FROM \"demo_data\"");
    }

    #[test]
    fn test_pagination_window() {
        let plan = plan(json!({"startRow": 100, "endRow": 150}));
        assert!(plan.query.to_inline_sql().ends_with(" LIMIT 50 OFFSET 100"));
    }

    #[test]
    fn test_missing_end_row_falls_back_to_100() {
        let plan = plan(json!({"startRow": 20, "endRow": null}));
        assert!(plan.query.to_inline_sql().ends_with(" LIMIT 100 OFFSET 20"));
    }

    #[test]
    fn test_text_filter_clause() {
        let plan = plan(json!({
            "filterModel": {"name": {"filterType": "text", "type": "contains", "filter": "Corp"}}
        }));
        let sql = plan.query.to_inline_sql();
        assert!(sql.contains(" WHERE \"name\" LIKE '%Corp%'"), "{}", sql);
        assert_eq!(plan.query.sql(), "SELECT * FROM \"demo_data\" WHERE \"name\" LIKE ? LIMIT 500 OFFSET 0");
    }

    #[test]
    fn test_number_in_range_clause() {
        let plan = plan(json!({
            "filterModel": {"price": {"filterType": "number", "type": "inRange", "filter": 10, "filterTo": 20}}
        }));
        assert!(plan
            .query
            .to_inline_sql()
            .contains("\"price\" BETWEEN 10 AND 20"));
    }

    #[test]
    fn test_filters_and_combined_in_request_order() {
        let plan = plan(json!({
            "filterModel": {
                "name": {"filterType": "text", "type": "startsWith", "filter": "A"},
                "price": {"filterType": "number", "type": "greaterThan", "filter": 5},
                "sector": {"filterType": "set", "values": []},
                "listed": {"filterType": "date", "dateFrom": "2020-01-01"}
            }
        }));
        assert_eq!(
            plan.count_query.to_inline_sql(),
            "SELECT COUNT(*) FROM \"demo_data\" WHERE \"name\" LIKE 'A%' AND \"price\" > 5"
        );
    }

    #[test]
    fn test_injection_value_is_escaped() {
        let plan = plan(json!({
            "filterModel": {"name": {"filterType": "text", "type": "equals", "filter": "O'Brien"}}
        }));
        assert!(plan
            .query
            .to_inline_sql()
            .contains("\"name\" = 'O''Brien'"));
        // executed form never carries the literal
        assert!(!plan.query.sql().contains("Brien"));
    }

    #[test]
    fn test_sorting_non_grouped_allows_any_column() {
        let plan = plan(json!({
            "sortModel": [{"colId": "firm", "sort": "asc"}, {"colId": "price", "sort": "desc"}]
        }));
        assert!(plan
            .query
            .to_inline_sql()
            .contains(" ORDER BY \"firm\" ASC, \"price\" DESC LIMIT"));
    }

    #[test]
    fn test_grouped_top_level() {
        let plan = plan(json!({
            "startRow": 0,
            "endRow": 50,
            "rowGroupCols": [{"id": "sector", "field": "sector"}],
            "valueCols": [{"field": "revenue", "aggFunc": "sum"}, {"field": "price", "aggFunc": "median"}]
        }));
        assert_eq!(
            plan.query.to_inline_sql(),
            "SELECT \"sector\", sum(\"revenue\") AS \"revenue\", sum(\"price\") AS \"price\" \
             FROM \"demo_data\" GROUP BY \"sector\" LIMIT 50 OFFSET 0"
        );
        assert_eq!(
            plan.count_query.to_inline_sql(),
            "SELECT COUNT(DISTINCT \"sector\") FROM \"demo_data\""
        );
    }

    #[test]
    fn test_grouped_without_value_cols_counts() {
        let plan = plan(json!({"rowGroupCols": [{"id": "sector"}]}));
        assert!(plan
            .query
            .to_inline_sql()
            .starts_with("SELECT \"sector\", count(*) AS \"count\" FROM \"demo_data\""));
    }

    #[test]
    fn test_grouped_sort_whitelist_drops_unrelated_columns() {
        let dropped = plan(json!({
            "rowGroupCols": [{"id": "sector"}],
            "valueCols": [{"field": "revenue", "aggFunc": "sum"}],
            "sortModel": [{"colId": "unrelated_col", "sort": "asc"}]
        }));
        assert!(!dropped.query.to_inline_sql().contains("ORDER BY"));

        let kept = plan(json!({
            "rowGroupCols": [{"id": "sector"}],
            "valueCols": [{"field": "revenue", "aggFunc": "sum"}],
            "sortModel": [
                {"colId": "unrelated_col", "sort": "asc"},
                {"colId": "revenue", "sort": "desc"},
                {"colId": "sector", "sort": "asc"}
            ]
        }));
        assert!(kept
            .query
            .to_inline_sql()
            .contains(" ORDER BY \"revenue\" DESC, \"sector\" ASC"));
    }

    #[test]
    fn test_second_level_drill_down() {
        let plan = plan(json!({
            "rowGroupCols": [{"id": "sector"}, {"id": "industry"}],
            "groupKeys": ["Technology"],
            "sortModel": [{"colId": "sector", "sort": "asc"}, {"colId": "industry", "sort": "desc"}]
        }));
        assert_eq!(
            plan.query.to_inline_sql(),
            "SELECT \"industry\", count(*) AS \"count\" FROM \"demo_data\" \
             WHERE \"sector\" = 'Technology' GROUP BY \"industry\" \
             ORDER BY \"sector\" ASC, \"industry\" DESC LIMIT 500 OFFSET 0"
        );
        assert_eq!(
            plan.count_query.to_inline_sql(),
            "SELECT COUNT(DISTINCT \"industry\") FROM \"demo_data\" WHERE \"sector\" = 'Technology'"
        );
    }

    #[test]
    fn test_leaf_level_drill_down() {
        let plan = plan(json!({
            "rowGroupCols": [{"id": "sector"}],
            "groupKeys": ["Technology"],
            "valueCols": [{"field": "revenue", "aggFunc": "sum"}]
        }));
        assert_eq!(
            plan.query.to_inline_sql(),
            "SELECT * FROM \"demo_data\" WHERE \"sector\" = 'Technology' LIMIT 500 OFFSET 0"
        );
        assert_eq!(
            plan.count_query.to_inline_sql(),
            "SELECT COUNT(*) FROM \"demo_data\" WHERE \"sector\" = 'Technology'"
        );
    }

    #[test]
    fn test_null_group_key() {
        let plan = plan(json!({
            "rowGroupCols": [{"id": "sector"}, {"id": "industry"}],
            "groupKeys": [null]
        }));
        assert!(plan
            .query
            .to_inline_sql()
            .contains(" WHERE \"sector\" IS NULL GROUP BY \"industry\""));
    }

    #[test]
    fn test_group_path_matches_on_field() {
        let plan = plan(json!({
            "rowGroupCols": [{"id": "a", "field": "b"}, {"id": "c", "field": "d"}],
            "groupKeys": ["x"]
        }));
        assert_eq!(
            plan.query.to_inline_sql(),
            "SELECT \"c\", count(*) AS \"count\" FROM \"demo_data\" \
             WHERE \"b\" = 'x' GROUP BY \"c\" LIMIT 500 OFFSET 0"
        );
    }

    #[test]
    fn test_extreme_window_emits_valid_limit() {
        let saturated = plan(json!({"startRow": -1e19, "endRow": 1e19}));
        assert!(saturated.query.to_inline_sql().ends_with(" LIMIT 100 OFFSET 0"));

        let widest = plan(json!({"startRow": 0, "endRow": i64::MAX}));
        assert!(widest
            .query
            .to_inline_sql()
            .ends_with(&format!(" LIMIT {} OFFSET 0", i64::MAX)));
    }

    #[test]
    fn test_group_key_quote_escaped() {
        let plan = plan(json!({
            "rowGroupCols": [{"id": "firm"}],
            "groupKeys": ["Macy's"]
        }));
        assert!(plan.query.to_inline_sql().contains("\"firm\" = 'Macy''s'"));
    }

    #[test]
    fn test_base_query_used_when_not_grouping() {
        let req = request(json!({"startRow": 0, "endRow": 10}));
        let table = TableRef::new("demo_data");

        let stmt = QueryBuilder::new(&req, &table, Dialect::default())
            .with_base_query(Some("  select id, name FROM \"demo_data\" "))
            .build_query()
            .unwrap();
        assert_eq!(
            stmt.to_inline_sql(),
            "select id, name FROM \"demo_data\" LIMIT 10 OFFSET 0"
        );

        let stmt = QueryBuilder::new(&req, &table, Dialect::default())
            .with_base_query(Some("DELETE FROM demo_data"))
            .build_query()
            .unwrap();
        assert!(stmt.to_inline_sql().starts_with("SELECT * FROM \"demo_data\""));
    }

    #[test]
    fn test_mysql_dialect_and_schema() {
        let req = request(json!({
            "rowGroupCols": [{"id": "sector"}],
            "sortModel": [{"colId": "sector", "sort": "desc"}]
        }));
        let table = TableRef {
            schema: Some("market".into()),
            name: "trades".into(),
        };
        let stmt = QueryBuilder::new(&req, &table, Dialect::new('`'))
            .build_query()
            .unwrap();
        assert_eq!(
            stmt.to_inline_sql(),
            "SELECT `sector`, count(*) AS `count` FROM `market`.`trades` \
             GROUP BY `sector` ORDER BY `sector` DESC LIMIT 500 OFFSET 0"
        );
    }

    #[test]
    fn test_whitelist_rejects_unknown_identifiers() {
        let whitelist = ColumnWhitelist::from_names(["name", "price"]);
        let table = TableRef::new("demo_data");

        let req = request(json!({
            "filterModel": {"name\" = '' OR 1=1 --": {"filterType": "text", "filter": "x"}}
        }));
        let err = QueryBuilder::new(&req, &table, Dialect::default())
            .with_whitelist(Some(&whitelist))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::UnknownColumn(_)));

        let req = request(json!({"sortModel": [{"colId": "price", "sort": "asc"}]}));
        assert!(QueryBuilder::new(&req, &table, Dialect::default())
            .with_whitelist(Some(&whitelist))
            .build()
            .is_ok());
    }

    #[test]
    fn test_malformed_number_filter_propagates() {
        let req = request(json!({
            "filterModel": {"price": {"filterType": "number", "filter": {"nested": 1}}}
        }));
        let table = TableRef::new("demo_data");
        let err = QueryBuilder::new(&req, &table, Dialect::default())
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Build(_)));
    }

    #[test]
    fn test_build_is_idempotent() {
        let req = request(json!({
            "startRow": 40,
            "endRow": 80,
            "rowGroupCols": [{"id": "sector"}, {"id": "industry"}],
            "groupKeys": ["Energy"],
            "valueCols": [{"field": "revenue", "aggFunc": "avg"}],
            "filterModel": {
                "firm": {"filterType": "text", "type": "contains", "filter": "Oil"},
                "price": {"filterType": "number", "type": "lessThan", "filter": 99.5},
                "region": {"filterType": "set", "values": ["EU", "US"]}
            },
            "sortModel": [{"colId": "revenue", "sort": "desc"}]
        }));
        let table = TableRef::new("demo_data");
        let builder = QueryBuilder::new(&req, &table, Dialect::default());
        assert_eq!(builder.build().unwrap(), builder.build().unwrap());
    }
}
