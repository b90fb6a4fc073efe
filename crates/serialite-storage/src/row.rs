// SPDX-FileCopyrightText: 2026 Serialite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Owned result rows addressable by column name.

use std::sync::Arc;

use rusqlite::types::{FromSql, FromSqlError, Value, ValueRef};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use thiserror::Error;

/// Failure reading a typed value out of a [`Row`].
#[derive(Debug, Error)]
pub enum ColumnError {
    #[error("no column named `{0}`")]
    Missing(String),

    #[error("cannot decode column `{column}`: {source}")]
    Decode {
        column: String,
        source: FromSqlError,
    },
}

/// One record of a result set.
///
/// Column names are shared by every row of the same fetch. A row is detached
/// from the connection; it stays valid after the gate is released.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    pub(crate) fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    /// Read every column of the current rusqlite row.
    pub(crate) fn read(columns: &Arc<[String]>, row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let values = (0..columns.len())
            .map(|i| row.get::<_, Value>(i))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Self::new(Arc::clone(columns), values))
    }

    /// Column names in select order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of the first column called `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.position(name).map(|i| &self.values[i])
    }

    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Decode the column called `name` into any rusqlite [`FromSql`] type.
    pub fn get_as<T: FromSql>(&self, name: &str) -> Result<T, ColumnError> {
        let value = self
            .get(name)
            .ok_or_else(|| ColumnError::Missing(name.to_string()))?;
        T::column_result(ValueRef::from(value)).map_err(|source| ColumnError::Decode {
            column: name.to_string(),
            source,
        })
    }

    /// `(column, value)` pairs in select order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// JSON-friendly view of a SQLite value.
struct SqlValue<'a>(&'a Value);

impl Serialize for SqlValue<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Value::Null => serializer.serialize_none(),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Real(f) => serializer.serialize_f64(*f),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Blob(b) => serializer.serialize_bytes(b),
        }
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (column, value) in self.iter() {
            map.serialize_entry(column, &SqlValue(value))?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Row {
        let columns: Arc<[String]> = vec!["id".to_string(), "name".to_string(), "score".to_string()].into();
        Row::new(
            columns,
            vec![
                Value::Integer(7),
                Value::Text("a".to_string()),
                Value::Null,
            ],
        )
    }

    #[test]
    fn get_by_name_and_index() {
        let row = sample();
        assert_eq!(row.get("name"), Some(&Value::Text("a".to_string())));
        assert_eq!(row.get_index(0), Some(&Value::Integer(7)));
        assert_eq!(row.get("missing"), None);
        assert_eq!(row.columns(), ["id", "name", "score"]);
    }

    #[test]
    fn typed_access() {
        let row = sample();
        assert_eq!(row.get_as::<i64>("id").unwrap(), 7);
        assert_eq!(row.get_as::<String>("name").unwrap(), "a");
        assert_eq!(row.get_as::<Option<f64>>("score").unwrap(), None);
    }

    #[test]
    fn typed_access_errors() {
        let row = sample();
        assert!(matches!(row.get_as::<i64>("nope"), Err(ColumnError::Missing(c)) if c == "nope"));
        assert!(matches!(
            row.get_as::<i64>("name"),
            Err(ColumnError::Decode { column, .. }) if column == "name"
        ));
    }

    #[test]
    fn duplicate_column_names_resolve_to_first() {
        let columns: Arc<[String]> = vec!["x".to_string(), "x".to_string()].into();
        let row = Row::new(columns, vec![Value::Integer(1), Value::Integer(2)]);
        assert_eq!(row.get_as::<i64>("x").unwrap(), 1);
    }

    #[test]
    fn serializes_as_ordered_object() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert_eq!(json, r#"{"id":7,"name":"a","score":null}"#);
    }
}
