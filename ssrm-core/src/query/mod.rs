//! Grid query pipeline
//!
//! This module turns a server-side row model request into SQL and runs it:
//!
//! - Request parsing with lenient defaults ([`request`])
//! - Per-column filter predicates ([`filter`])
//! - Statement assembly with bound parameters ([`sql`])
//! - Clause composition ([`builder`])
//! - Count + page execution against a backend ([`engine`])

pub mod builder;
pub mod engine;
pub mod filter;
pub mod request;
pub mod sql;

pub use builder::{QueryBuilder, QueryPlan};
pub use engine::{QueryEngine, QueryOutcome, QueryStats, SsrmResponse};
pub use filter::{
    ColumnFilter, NumberFilter, NumberOperator, SetFilter, TextFilter, TextOperator,
};
pub use request::{
    AggregationFunction, ColumnVo, FilterModel, GridRequest, GroupKey, SortDirection,
    SortModelItem, ValueColumn,
};
pub use sql::{Dialect, SqlParam, Statement, TableRef};
