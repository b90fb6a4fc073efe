// SPDX-FileCopyrightText: 2026 Serialite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The "zero or one row" contract.
//!
//! [`Cardinality`] keeps "nothing found" and "lookup was not unique" apart.
//! [`Database::fetch_one`](crate::Database::fetch_one) collapses it into
//! `Option<Row>` or [`StoreError::TooManyRows`].

use crate::error::StoreError;
use crate::row::Row;

/// Shape of a result set checked against a single-row expectation.
#[derive(Debug, Clone, PartialEq)]
pub enum Cardinality {
    Absent,
    Present(Row),
    /// More than one row came back; carries the actual count.
    TooMany(usize),
}

impl Cardinality {
    pub fn from_rows(mut rows: Vec<Row>) -> Self {
        match rows.len() {
            0 => Self::Absent,
            1 => rows.pop().map_or(Self::Absent, Self::Present),
            n => Self::TooMany(n),
        }
    }

    /// `Absent` is `Ok(None)`, not an error.
    pub fn into_result(self) -> Result<Option<Row>, StoreError> {
        match self {
            Self::Absent => Ok(None),
            Self::Present(row) => Ok(Some(row)),
            Self::TooMany(count) => Err(StoreError::TooManyRows { count }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use proptest::prelude::*;
    use rusqlite::types::Value;

    use super::*;

    fn rows(n: usize) -> Vec<Row> {
        let columns: Arc<[String]> = vec!["n".to_string()].into();
        (0..n)
            .map(|i| Row::new(Arc::clone(&columns), vec![Value::Integer(i as i64)]))
            .collect()
    }

    #[test]
    fn empty_is_absent_not_error() {
        assert_eq!(Cardinality::from_rows(vec![]), Cardinality::Absent);
        assert!(Cardinality::Absent.into_result().unwrap().is_none());
    }

    #[test]
    fn single_row_is_returned() {
        let row = Cardinality::from_rows(rows(1)).into_result().unwrap().unwrap();
        assert_eq!(row.get_as::<i64>("n").unwrap(), 0);
    }

    proptest! {
        #[test]
        fn two_or_more_rows_report_exact_count(n in 2usize..200) {
            let shape = Cardinality::from_rows(rows(n));
            prop_assert_eq!(&shape, &Cardinality::TooMany(n));
            match shape.into_result() {
                Err(StoreError::TooManyRows { count }) => prop_assert_eq!(count, n),
                other => prop_assert!(false, "unexpected result: {:?}", other),
            }
        }
    }
}
