//! Property tests for SQL generation

use proptest::prelude::*;
use serde_json::json;

use ssrm_core::query::sql::quote_literal;
use ssrm_core::query::{Dialect, QueryBuilder, TableRef};
use ssrm_core::GridRequest;

fn build(request: &GridRequest) -> (String, String) {
    let table = TableRef::new("demo_data");
    let plan = QueryBuilder::new(request, &table, Dialect::default())
        .build()
        .unwrap();
    (plan.query.to_inline_sql(), plan.count_query.to_inline_sql())
}

proptest! {
    #[test]
    fn prop_build_is_idempotent(
        start in 0i64..10_000,
        len in 0i64..1_000,
        value in "[a-zA-Z' %_]{0,16}",
        group_depth in 0usize..3,
    ) {
        let group_cols = ["sector", "industry"];
        let request = GridRequest::from_value(json!({
            "startRow": start,
            "endRow": start + len,
            "rowGroupCols": group_cols.iter().map(|c| json!({"id": c})).collect::<Vec<_>>(),
            "groupKeys": vec![json!("Technology"); group_depth],
            "filterModel": {"name": {"filterType": "text", "type": "contains", "filter": value}},
            "sortModel": [{"colId": "sector", "sort": "desc"}]
        }))
        .unwrap();

        prop_assert_eq!(build(&request), build(&request));
    }

    #[test]
    fn prop_limit_matches_window(start in 1i64..10_000, len in 1i64..1_000) {
        let request = GridRequest::from_value(json!({"startRow": start, "endRow": start + len})).unwrap();
        let (query, _) = build(&request);
        let expected = format!(" LIMIT {} OFFSET {}", len, start);
        prop_assert!(query.ends_with(&expected));
    }

    #[test]
    fn prop_text_values_are_escaped(value in "[a-zA-Z0-9' ]{1,24}") {
        let request = GridRequest::from_value(json!({
            "filterModel": {"name": {"filterType": "text", "type": "equals", "filter": value.clone()}}
        }))
        .unwrap();

        let (query, count) = build(&request);
        let literal = quote_literal(&value);
        let expected = format!("\"name\" = {}", literal);
        prop_assert!(query.contains(&expected));
        prop_assert!(count.ends_with(&expected));
        // quotes in the literal always come in pairs
        prop_assert_eq!(literal[1..literal.len() - 1].matches('\'').count() % 2, 0);
    }

    #[test]
    fn prop_identifiers_are_quoted(name in "[a-z\"]{1,12}") {
        let quoted = Dialect::default().quote_ident(&name);
        let embedded = name.matches('"').count();
        prop_assert_eq!(quoted.matches('"').count(), embedded * 2 + 2);
        prop_assert!(quoted.starts_with('"') && quoted.ends_with('"'));
    }
}
