//! Normalized result rows
//!
//! A `Row` is an ordered column name to value mapping, produced fresh per
//! fetched record. Column order is the order the engine returned.

use super::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One database record, normalized to an ordered column -> value mapping
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Row {
    columns: IndexMap<String, Value>,
}

impl Row {
    /// Create an empty row
    pub fn new() -> Self {
        Self {
            columns: IndexMap::new(),
        }
    }

    /// Append a column value; replaces the value if the column already exists
    pub fn insert(&mut self, column: impl Into<String>, value: Value) {
        self.columns.insert(column.into(), value);
    }

    /// Get a column value by name
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.get(column)
    }

    /// Check whether a column is present
    pub fn contains_column(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    /// Column names in engine order
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Iterate over (column, value) pairs in engine order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Check whether the row has no columns
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Row {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_insert_get() {
        let mut row = Row::new();
        row.insert("id", Value::Long(1));
        row.insert("username", Value::from("mal"));

        assert_eq!(row.get("id"), Some(&Value::Long(1)));
        assert_eq!(row.get("username").and_then(Value::as_str), Some("mal"));
        assert_eq!(row.get("missing"), None);
        assert_eq!(row.len(), 2);
    }

    #[test]
    fn test_row_preserves_column_order() {
        let mut row = Row::new();
        row.insert("id", Value::Long(1));
        row.insert("username", Value::from("zoe"));
        row.insert("name", Value::from("Zoe Washburne"));
        row.insert("role", Value::from("First Mate"));

        let columns: Vec<&str> = row.columns().collect();
        assert_eq!(columns, vec!["id", "username", "name", "role"]);
    }

    #[test]
    fn test_row_replaces_duplicate_column() {
        let mut row = Row::new();
        row.insert("role", Value::from("Pilot"));
        row.insert("role", Value::from("Comic Relief"));

        assert_eq!(row.len(), 1);
        assert_eq!(row.get("role").and_then(Value::as_str), Some("Comic Relief"));
    }

    #[test]
    fn test_row_equality_ignores_insertion_history() {
        let a: Row = [
            ("id".to_string(), Value::Long(1)),
            ("username".to_string(), Value::from("mal")),
        ]
        .into_iter()
        .collect();
        let b: Row = [
            ("username".to_string(), Value::from("mal")),
            ("id".to_string(), Value::Long(1)),
        ]
        .into_iter()
        .collect();

        assert_eq!(a, b);
    }
}
