// SPDX-FileCopyrightText: 2026 Serialite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for serialite integration tests.
//!
//! [`TestDatabase`] opens a [`serialite_storage::Database`] on a file in a
//! fresh temp directory, so tests are isolated and order-insensitive.

pub mod harness;

pub use harness::{TestDatabase, TestDatabaseBuilder, NAMES_TABLE};
