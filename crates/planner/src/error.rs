// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	fmt,
	fmt::{Display, Formatter},
	io,
};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("invalid column name '{name}'")]
	InvalidColumnName {
		name: String,
	},

	#[error("unknown column '{name}'")]
	UnknownColumnName {
		name: String,
	},

	#[error("ambiguous column reference '{name}' matches {}", candidates.join(", "))]
	AmbiguousColumnName {
		name: String,
		candidates: Vec<String>,
	},

	#[error("duplicate column '{name}' in relation '{relation}'")]
	DuplicateColumnName {
		relation: String,
		name: String,
	},

	#[error("unknown relation '{qualifier}'")]
	UnknownRelation {
		qualifier: String,
	},

	#[error("the query names no relation")]
	NoRelations,

	#[error("relation alias '{alias}' is used more than once")]
	DuplicateRelation {
		alias: String,
	},

	#[error("unsupported join predicate {predicate}: {reason}")]
	UnsupportedJoinPredicate {
		predicate: String,
		reason: String,
	},

	#[error("malformed condition tree: {reason}")]
	MalformedConditionTree {
		reason: String,
	},

	#[error("invalid operator '{operator}'")]
	InvalidOperator {
		operator: String,
	},

	#[error("unsupported aggregate: {reason}")]
	UnsupportedAggregate {
		reason: String,
	},

	#[error("failed to read the header of '{path}'")]
	Catalog {
		path: String,
		#[source]
		source: io::Error,
	},
}

impl Error {
	pub(crate) fn malformed(reason: impl Into<String>) -> Self {
		Error::MalformedConditionTree {
			reason: reason.into(),
		}
	}

	pub(crate) fn unsupported_join(predicate: impl Display, reason: impl Into<String>) -> Self {
		Error::UnsupportedJoinPredicate {
			predicate: predicate.to_string(),
			reason: reason.into(),
		}
	}

	pub fn diagnostic(&self) -> Diagnostic {
		let (code, help) = match self {
			Error::InvalidColumnName {
				..
			} => ("COLUMN_001", "column names start with a letter or underscore followed by letters, digits or underscores"),
			Error::UnknownColumnName {
				..
			} => ("COLUMN_002", "check for typos or ensure the column exists in the header of one of the relations"),
			Error::AmbiguousColumnName {
				..
			} => ("COLUMN_003", "qualify the column with the relation alias, e.g. ta.col_a"),
			Error::DuplicateColumnName {
				..
			} => ("COLUMN_004", "every field in a header line must have a distinct name"),
			Error::UnknownRelation {
				..
			} => ("RELATION_001", "qualified wildcards must name a relation path or alias from the FROM clause"),
			Error::NoRelations => ("RELATION_002", "name at least one relation in the FROM clause"),
			Error::DuplicateRelation {
				..
			} => ("RELATION_003", "give each relation a distinct alias, e.g. FROM a.csv x JOIN a.csv y ON ..."),
			Error::UnsupportedJoinPredicate {
				..
			} => ("JOIN_001", "relations can only be joined on equality between columns of two different relations"),
			Error::MalformedConditionTree {
				..
			} => ("CONDITION_001", "conditions are comparisons combined with AND, OR and parentheses"),
			Error::InvalidOperator {
				..
			} => ("CONDITION_002", "supported comparison operators are =, !=, <>, <, <=, >, >="),
			Error::UnsupportedAggregate {
				..
			} => ("AGGREGATE_001", "only a single COUNT(*) or COUNT(column) may be selected"),
			Error::Catalog {
				..
			} => ("CATALOG_001", "make sure the file exists and is readable"),
		};

		Diagnostic {
			code: code.to_string(),
			message: self.to_string(),
			help: Some(help.to_string()),
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
	pub code: String,
	pub message: String,
	pub help: Option<String>,
}

impl Display for Diagnostic {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "error[{}]: {}", self.code, self.message)?;
		if let Some(help) = &self.help {
			write!(f, "\n  help: {help}")?;
		}
		Ok(())
	}
}
