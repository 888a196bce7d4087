//! SQL text assembly with bound parameters
//!
//! Statements are kept as a sequence of raw SQL fragments and parameter
//! slots. Execution uses [`Statement::sql`] (with `?` placeholders) together
//! with [`Statement::params`]; logging and `explain` use
//! [`Statement::to_inline_sql`], which substitutes escaped literals.
//!
//! Identifiers can never be bound, so they go through [`Dialect::quote_ident`].

use std::fmt;

/// Identifier quoting rules of a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    quote: char,
}

impl Default for Dialect {
    fn default() -> Self {
        Self::new('"')
    }
}

impl Dialect {
    pub fn new(quote: char) -> Self {
        Self { quote }
    }

    pub fn quote(&self) -> char {
        self.quote
    }

    /// Wrap an identifier in the quote character, doubling any embedded quote
    pub fn quote_ident(&self, name: &str) -> String {
        let q = self.quote;
        let mut out = String::with_capacity(name.len() + 2);
        out.push(q);
        for c in name.chars() {
            if c == q {
                out.push(q);
            }
            out.push(c);
        }
        out.push(q);
        out
    }

    /// Render a (possibly schema-qualified) table reference
    pub fn quote_table(&self, table: &TableRef) -> String {
        match &table.schema {
            Some(schema) => format!(
                "{}.{}",
                self.quote_ident(schema),
                self.quote_ident(&table.name)
            ),
            None => self.quote_ident(&table.name),
        }
    }
}

/// Render a string literal, doubling embedded single quotes
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Target table of a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub schema: Option<String>,
    pub name: String,
}

impl TableRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A value bound into a statement
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl SqlParam {
    /// Literal form used by the inline rendering
    pub fn to_inline(&self) -> String {
        match self {
            SqlParam::Null => "NULL".to_string(),
            SqlParam::Integer(i) => i.to_string(),
            SqlParam::Real(f) => f.to_string(),
            SqlParam::Text(s) => quote_literal(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Fragment {
    Sql(String),
    Param(SqlParam),
}

/// SQL statement made of raw text and parameter slots
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statement {
    fragments: Vec<Fragment>,
}

impl Statement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Statement consisting of raw SQL text only
    pub fn raw(sql: impl Into<String>) -> Self {
        let mut stmt = Self::new();
        stmt.push_sql(sql);
        stmt
    }

    pub fn push_sql(&mut self, sql: impl Into<String>) -> &mut Self {
        let sql = sql.into();
        if sql.is_empty() {
            return self;
        }
        match self.fragments.last_mut() {
            Some(Fragment::Sql(last)) => last.push_str(&sql),
            _ => self.fragments.push(Fragment::Sql(sql)),
        }
        self
    }

    pub fn push_param(&mut self, param: SqlParam) -> &mut Self {
        self.fragments.push(Fragment::Param(param));
        self
    }

    /// Append another statement's fragments
    pub fn append(&mut self, other: Statement) -> &mut Self {
        for fragment in other.fragments {
            match fragment {
                Fragment::Sql(sql) => {
                    self.push_sql(sql);
                }
                Fragment::Param(param) => {
                    self.push_param(param);
                }
            }
        }
        self
    }

    /// Join statements with a raw separator
    pub fn join(parts: impl IntoIterator<Item = Statement>, separator: &str) -> Statement {
        let mut joined = Statement::new();
        for (i, part) in parts.into_iter().enumerate() {
            if i > 0 {
                joined.push_sql(separator);
            }
            joined.append(part);
        }
        joined
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// SQL text with `?` placeholders
    pub fn sql(&self) -> String {
        self.fragments
            .iter()
            .map(|fragment| match fragment {
                Fragment::Sql(sql) => sql.as_str(),
                Fragment::Param(_) => "?",
            })
            .collect()
    }

    /// Bound parameters in placeholder order
    pub fn params(&self) -> impl Iterator<Item = &SqlParam> {
        self.fragments.iter().filter_map(|fragment| match fragment {
            Fragment::Param(param) => Some(param),
            Fragment::Sql(_) => None,
        })
    }

    /// SQL text with every parameter substituted as an escaped literal
    pub fn to_inline_sql(&self) -> String {
        let mut out = String::new();
        for fragment in &self.fragments {
            match fragment {
                Fragment::Sql(sql) => out.push_str(sql),
                Fragment::Param(param) => out.push_str(&param.to_inline()),
            }
        }
        out
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_inline_sql())
    }
}
