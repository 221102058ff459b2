//! Flat rows as produced by a query collaborator.

use std::ops::Index;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// One row of a tabular result: an ordered, fixed-length run of cells.
///
/// Column names are shared between all rows of a result set. Several
/// entities may occupy disjoint, contiguous slices of the same row when it
/// comes from a join.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// Create a row with shared column names.
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    /// Create a row without column names (positional access only).
    pub fn from_values(values: Vec<Value>) -> Self {
        Self {
            columns: Arc::from(Vec::new()),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Case-insensitive lookup of a column's position.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }

    pub fn get_named(&self, name: &str) -> Option<&Value> {
        self.index_of(name).and_then(|i| self.values.get(i))
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    pub(crate) fn shared_columns(&self) -> &Arc<[String]> {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

impl AsRef<[Value]> for Row {
    fn as_ref(&self) -> &[Value] {
        &self.values
    }
}

impl Index<usize> for Row {
    type Output = Value;

    fn index(&self, index: usize) -> &Value {
        &self.values[index]
    }
}

/// A result set kept as raw cells plus field names, for ad hoc queries that
/// have no entity type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowSet {
    pub field_names: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl RowSet {
    /// Collect rows, dropping the first `skip_columns` cells of each (e.g. a
    /// leading row-number column).
    pub fn from_rows(rows: Vec<Row>, skip_columns: usize) -> Self {
        let field_names = rows
            .first()
            .map(|r| r.shared_columns().iter().skip(skip_columns).cloned().collect())
            .unwrap_or_default();
        let rows = rows
            .into_iter()
            .map(|r| r.into_values().into_iter().skip(skip_columns).collect())
            .collect();
        Self { field_names, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Arc<[String]> {
        Arc::from(vec!["rn".to_string(), "ID".to_string(), "Name".to_string()])
    }

    #[test]
    fn test_named_lookup_is_case_insensitive() {
        let row = Row::new(
            columns(),
            vec![Value::BigInt(1), Value::BigInt(9), Value::Text("a".into())],
        );
        assert_eq!(row.index_of("id"), Some(1));
        assert_eq!(row.get_named("NAME"), Some(&Value::Text("a".into())));
        assert!(row.get_named("missing").is_none());
        assert_eq!(row[0], Value::BigInt(1));
    }

    #[test]
    fn test_row_set_skips_leading_columns() {
        let cols = columns();
        let rows = vec![
            Row::new(Arc::clone(&cols), vec![Value::BigInt(1), Value::BigInt(9), Value::Null]),
            Row::new(cols, vec![Value::BigInt(2), Value::BigInt(10), Value::Null]),
        ];
        let set = RowSet::from_rows(rows, 1);
        assert_eq!(set.field_names, vec!["ID".to_string(), "Name".to_string()]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.rows[1], vec![Value::BigInt(10), Value::Null]);
    }

    #[test]
    fn test_empty_row_set() {
        let set = RowSet::from_rows(Vec::new(), 1);
        assert!(set.is_empty());
        assert!(set.field_names.is_empty());
    }
}
