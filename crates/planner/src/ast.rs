// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! The normalized statement handed to the planner.
//!
//! Produced by the SQL front end, or deserialized from JSON by callers that
//! bring their own grammar:
//!
//! ```json
//! {
//!   "columns": ["ta.col_a", "col_z"],
//!   "relations": [{"path": "a.csv", "alias": "ta"}, {"path": "b.csv"}],
//!   "conditions": [
//!     {"atom": {"left_operand": "ta.col_a", "operator": "=", "right_operand": "col_a"}},
//!     "and",
//!     {"group": [{"atom": {"left_operand": "col_z", "operator": "!=", "right_operand": "'x'"}}]}
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectStatement {
	/// `*`, `q.*`, `count(*)`, `count(name)` or a possibly qualified name.
	pub columns: Vec<String>,
	pub relations: Vec<RelationDescriptor>,
	#[serde(default)]
	pub conditions: Vec<ConditionToken>,
	#[serde(default)]
	pub sample: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationDescriptor {
	pub path: String,
	#[serde(default)]
	pub alias: Option<String>,
}

impl RelationDescriptor {
	pub fn new(path: impl Into<String>) -> Self {
		Self {
			path: path.into(),
			alias: None,
		}
	}

	pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
		self.alias = Some(alias.into());
		self
	}

	/// The alias, or the path when none was given.
	pub fn alias(&self) -> &str {
		self.alias.as_deref().unwrap_or(&self.path)
	}
}

/// A flat, left-to-right condition sequence. Parenthesized sub-expressions
/// are nested groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionToken {
	Atom(ConditionDescriptor),
	And,
	Or,
	Group(Vec<ConditionToken>),
}

impl ConditionToken {
	pub fn atom(left: impl Into<String>, operator: impl Into<String>, right: impl Into<String>) -> Self {
		ConditionToken::Atom(ConditionDescriptor {
			left_operand: left.into(),
			operator: operator.into(),
			right_operand: right.into(),
		})
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionDescriptor {
	pub left_operand: String,
	pub operator: String,
	pub right_operand: String,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_deserialize_statement() {
		let json = r#"{
			"columns": ["ta.col_a", "col_z"],
			"relations": [{"path": "a.csv", "alias": "ta"}, {"path": "b.csv"}],
			"conditions": [
				{"atom": {"left_operand": "ta.col_a", "operator": "=", "right_operand": "col_a"}},
				"and",
				{"group": [{"atom": {"left_operand": "col_z", "operator": "!=", "right_operand": "'x'"}}]}
			]
		}"#;

		let statement: SelectStatement = serde_json::from_str(json).unwrap();
		assert_eq!(statement.columns, vec!["ta.col_a", "col_z"]);
		assert_eq!(statement.relations[0].alias(), "ta");
		assert_eq!(statement.relations[1].alias(), "b.csv");
		assert_eq!(statement.sample, None);
		assert_eq!(
			statement.conditions,
			vec![
				ConditionToken::atom("ta.col_a", "=", "col_a"),
				ConditionToken::And,
				ConditionToken::Group(vec![ConditionToken::atom("col_z", "!=", "'x'")]),
			]
		);
	}
}
