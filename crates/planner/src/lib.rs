// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Compiles relational `SELECT` statements over delimited text files into
//! shell pipelines of `tail`, `awk`, `sort` and `join`.
//!
//! The planner never reads row data. It reads header lines through a
//! [`Catalog`], accumulates operations on virtual [`Table`]s, orders joins
//! so each join's operands exist when it runs, and renders the result as a
//! single pipeline string.

pub mod ast;
pub mod catalog;
pub mod column;
pub mod condition;
pub mod config;
mod error;
pub mod expression;
pub mod join;
pub mod plan;
pub mod query;
pub mod table;

pub use ast::{ConditionDescriptor, ConditionToken, RelationDescriptor, SelectStatement};
pub use catalog::{Catalog, FileCatalog, MemoryCatalog};
pub use column::{Column, ColumnName};
pub use condition::Condition;
pub use config::Config;
pub use error::{Diagnostic, Error, Result};
pub use expression::{Expression, Operand, Operator};
pub use plan::{PriorityPolicy, UniformPriority};
pub use query::Query;
pub use table::Table;

/// Compiles `statement` with `config`, reading headers from `catalog`.
pub fn compile(statement: SelectStatement, config: Config, catalog: &dyn Catalog) -> Result<String> {
	Query::new(statement, config).compile(catalog)
}
