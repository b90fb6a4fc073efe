// SPDX-FileCopyrightText: 2026 Serialite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Owned statement parameters.
//!
//! Parameters travel to the connection thread by value, so they are held as
//! owned [`Value`]s and bound only once the statement is prepared there.

use rusqlite::types::{ToSql, Value};
use rusqlite::{Rows, Statement};

/// Parameters for one statement: none, positional (`?`, `?1`), or named (`:name`).
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Params {
    #[default]
    None,
    Positional(Vec<Value>),
    Named(Vec<(String, Value)>),
}

impl Params {
    /// Positional parameters, bound in order.
    pub fn positional<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::Positional(values.into_iter().map(Into::into).collect())
    }

    /// Named parameters. Names include their prefix (`:id`, `@id`, `$id`).
    pub fn named<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self::Named(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Number of bound values.
    pub fn len(&self) -> usize {
        match self {
            Self::None => 0,
            Self::Positional(values) => values.len(),
            Self::Named(pairs) => pairs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bind to `stmt` and start stepping it.
    pub(crate) fn query<'s>(&self, stmt: &'s mut Statement<'_>) -> rusqlite::Result<Rows<'s>> {
        match self {
            Self::None => stmt.query([]),
            Self::Positional(values) => stmt.query(rusqlite::params_from_iter(values.iter())),
            Self::Named(pairs) => {
                let named: Vec<(&str, &dyn ToSql)> = pairs
                    .iter()
                    .map(|(name, value)| (name.as_str(), value as &dyn ToSql))
                    .collect();
                stmt.query(named.as_slice())
            }
        }
    }
}

impl From<()> for Params {
    fn from(_: ()) -> Self {
        Self::None
    }
}

impl From<Vec<Value>> for Params {
    fn from(values: Vec<Value>) -> Self {
        Self::Positional(values)
    }
}

impl From<Value> for Params {
    fn from(value: Value) -> Self {
        Self::Positional(vec![value])
    }
}

impl<V: Into<Value>, const N: usize> From<[V; N]> for Params {
    fn from(values: [V; N]) -> Self {
        Self::positional(values)
    }
}
