//! Statement generation for the condition-based helpers
//!
//! Builds plain SELECT/INSERT/UPDATE/DELETE text with automatic parameter
//! binding. WHERE clauses are equality-only and combined with AND; anything
//! richer goes through the raw `execute`/`fetch_*` methods.

use super::value::Value;

/// Placeholder style of the target engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `?` placeholders
    Sqlite,
    /// `$1`, `$2`, ... placeholders
    Postgres,
}

impl Dialect {
    /// Placeholder text for the n-th parameter (1-based)
    fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::Sqlite => "?".to_string(),
            Dialect::Postgres => format!("${index}"),
        }
    }
}

/// ` WHERE a = ? AND b = ?` for the given conditions, numbering placeholders
/// from `start`; empty conditions produce no clause at all.
fn where_clause(dialect: Dialect, conditions: &[(String, Value)], start: usize) -> String {
    if conditions.is_empty() {
        return String::new();
    }
    let clauses: Vec<String> = conditions
        .iter()
        .enumerate()
        .map(|(i, (column, _))| format!("{} = {}", column, dialect.placeholder(start + i)))
        .collect();
    format!(" WHERE {}", clauses.join(" AND "))
}

/// `SELECT * FROM table [WHERE ...]`
#[derive(Debug, Clone)]
pub struct SelectStatement {
    table: String,
    conditions: Vec<(String, Value)>,
}

impl SelectStatement {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            conditions: Vec::new(),
        }
    }

    /// Add an equality condition; multiple conditions are ANDed
    #[must_use]
    pub fn where_eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.conditions.push((column.to_string(), value.into()));
        self
    }

    /// Build the SQL text
    pub fn build(&self, dialect: Dialect) -> String {
        let mut sql = format!("SELECT * FROM {}", self.table);
        sql.push_str(&where_clause(dialect, &self.conditions, 1));
        sql
    }

    /// Parameter values in placeholder order
    pub fn params(&self) -> Vec<Value> {
        self.conditions.iter().map(|(_, v)| v.clone()).collect()
    }
}

/// `INSERT INTO table (cols...) VALUES (...) RETURNING *`
#[derive(Debug, Clone)]
pub struct InsertStatement {
    table: String,
    columns: Vec<String>,
    values: Vec<Value>,
}

impl InsertStatement {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Add a column-value pair
    #[must_use]
    pub fn value(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.columns.push(column.to_string());
        self.values.push(value.into());
        self
    }

    /// Build the SQL text
    pub fn build(&self, dialect: Dialect) -> String {
        let placeholders: Vec<String> = (0..self.values.len())
            .map(|i| dialect.placeholder(i + 1))
            .collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
            self.table,
            self.columns.join(", "),
            placeholders.join(", ")
        )
    }

    /// Parameter values in placeholder order
    pub fn params(&self) -> Vec<Value> {
        self.values.clone()
    }
}

/// `UPDATE table SET col = ... [WHERE ...] RETURNING *`
#[derive(Debug, Clone)]
pub struct UpdateStatement {
    table: String,
    set_columns: Vec<String>,
    set_values: Vec<Value>,
    conditions: Vec<(String, Value)>,
}

impl UpdateStatement {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            set_columns: Vec::new(),
            set_values: Vec::new(),
            conditions: Vec::new(),
        }
    }

    /// Set a column value
    #[must_use]
    pub fn set(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.set_columns.push(column.to_string());
        self.set_values.push(value.into());
        self
    }

    /// Add an equality condition; multiple conditions are ANDed
    #[must_use]
    pub fn where_eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.conditions.push((column.to_string(), value.into()));
        self
    }

    /// Build the SQL text
    pub fn build(&self, dialect: Dialect) -> String {
        let set_clauses: Vec<String> = self
            .set_columns
            .iter()
            .enumerate()
            .map(|(i, column)| format!("{} = {}", column, dialect.placeholder(i + 1)))
            .collect();

        let mut sql = format!("UPDATE {} SET {}", self.table, set_clauses.join(", "));
        sql.push_str(&where_clause(
            dialect,
            &self.conditions,
            self.set_values.len() + 1,
        ));
        sql.push_str(" RETURNING *");
        sql
    }

    /// Parameter values in placeholder order (SET values, then WHERE values)
    pub fn params(&self) -> Vec<Value> {
        let mut params = self.set_values.clone();
        params.extend(self.conditions.iter().map(|(_, v)| v.clone()));
        params
    }
}

/// `DELETE FROM table [WHERE ...] RETURNING *`
#[derive(Debug, Clone)]
pub struct DeleteStatement {
    table: String,
    conditions: Vec<(String, Value)>,
}

impl DeleteStatement {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            conditions: Vec::new(),
        }
    }

    /// Add an equality condition; multiple conditions are ANDed
    #[must_use]
    pub fn where_eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.conditions.push((column.to_string(), value.into()));
        self
    }

    /// Build the SQL text
    pub fn build(&self, dialect: Dialect) -> String {
        let mut sql = format!("DELETE FROM {}", self.table);
        sql.push_str(&where_clause(dialect, &self.conditions, 1));
        sql.push_str(" RETURNING *");
        sql
    }

    /// Parameter values in placeholder order
    pub fn params(&self) -> Vec<Value> {
        self.conditions.iter().map(|(_, v)| v.clone()).collect()
    }
}
