// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! SQL front end: turns `SELECT` text into a [`SelectStatement`] for the
//! planner.

mod parse;
pub mod token;

use sqltxt_planner::{Catalog, Config, Diagnostic, SelectStatement};
use tracing::{debug, instrument};

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("syntax error: {0}")]
	Syntax(String),
	#[error(transparent)]
	Plan(#[from] sqltxt_planner::Error),
}

impl Error {
	pub fn diagnostic(&self) -> Diagnostic {
		match self {
			Error::Syntax(message) => Diagnostic {
				code: "SQL_001".to_string(),
				message: format!("syntax error: {message}"),
				help: Some("supported form: SELECT items FROM relations [WHERE ...] [TABLESAMPLE (n)]"
					.to_string()),
			},
			Error::Plan(err) => err.diagnostic(),
		}
	}
}

#[instrument(name = "sql::parse", level = "debug", skip_all)]
pub fn parse(sql: &str) -> Result<SelectStatement, Error> {
	let tokens = token::tokenize(sql)?;
	debug!(tokens = tokens.len(), "tokenized");
	parse::Parser::new(tokens).parse_select()
}

/// Parses `sql` and compiles it to a shell pipeline.
pub fn compile(sql: &str, config: Config, catalog: &dyn Catalog) -> Result<String, Error> {
	let statement = parse(sql)?;
	Ok(sqltxt_planner::compile(statement, config, catalog)?)
}
