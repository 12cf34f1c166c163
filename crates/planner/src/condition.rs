// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Boolean composition of comparisons and its conjunctive normal form.

use std::{
	fmt,
	fmt::{Display, Formatter},
};

use crate::{
	Error, Result,
	ast::ConditionToken,
	column::ColumnName,
	expression::Expression,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
	Comparison(Expression),
	And(Vec<Condition>),
	Or(Vec<Condition>),
}

impl Condition {
	/// Builds a condition tree from a flat token sequence. `and` binds
	/// tighter than `or`; groups are parenthesized sub-expressions. Returns
	/// `None` for an empty sequence.
	pub fn from_tokens(tokens: &[ConditionToken]) -> Result<Option<Condition>> {
		if tokens.is_empty() {
			return Ok(None);
		}
		let mut parser = TokenParser {
			tokens,
			position: 0,
		};
		let condition = parser.parse_or()?;
		match parser.tokens.get(parser.position) {
			None => Ok(Some(condition)),
			Some(ConditionToken::Atom(_)) | Some(ConditionToken::Group(_)) => {
				Err(Error::malformed("adjacent conditions without a connective"))
			}
			Some(_) => Err(Error::malformed("dangling connective")),
		}
	}

	/// Rewrites the tree into conjunctive normal form by distributing `or`
	/// over `and`. Repeated comparisons within a clause and repeated clauses
	/// are dropped.
	pub fn to_cnf(&self) -> Condition {
		let mut clauses: Vec<Vec<Expression>> = Vec::new();
		for clause in self.clauses() {
			let mut deduped: Vec<Expression> = Vec::with_capacity(clause.len());
			for expression in clause {
				if !deduped.contains(&expression) {
					deduped.push(expression);
				}
			}
			if !clauses.iter().any(|existing| same_clause(existing, &deduped)) {
				clauses.push(deduped);
			}
		}

		let mut conjuncts: Vec<Condition> = clauses
			.into_iter()
			.map(|mut clause| {
				if clause.len() == 1 {
					Condition::Comparison(clause.remove(0))
				} else {
					Condition::Or(clause.into_iter().map(Condition::Comparison).collect())
				}
			})
			.collect();

		if conjuncts.len() == 1 {
			conjuncts.remove(0)
		} else {
			Condition::And(conjuncts)
		}
	}

	fn clauses(&self) -> Vec<Vec<Expression>> {
		match self {
			Condition::Comparison(expression) => vec![vec![expression.clone()]],
			Condition::And(children) => children.iter().flat_map(Condition::clauses).collect(),
			Condition::Or(children) => {
				let mut product: Vec<Vec<Expression>> = vec![Vec::new()];
				for child in children {
					let child_clauses = child.clauses();
					product = product
						.iter()
						.flat_map(|prefix| {
							child_clauses.iter().map(move |clause| {
								prefix.iter().chain(clause).cloned().collect::<Vec<_>>()
							})
						})
						.collect();
				}
				product
			}
		}
	}

	/// The top-level conjuncts of a tree in conjunctive normal form.
	pub fn into_conjuncts(self) -> Result<Vec<Condition>> {
		fn is_clause(condition: &Condition) -> bool {
			match condition {
				Condition::Comparison(_) => true,
				Condition::Or(children) => children.iter().all(|c| matches!(c, Condition::Comparison(_))),
				Condition::And(_) => false,
			}
		}

		match self {
			Condition::And(children) => {
				if let Some(bad) = children.iter().find(|c| !is_clause(c)) {
					return Err(Error::malformed(format!("'{bad}' is not a disjunction of comparisons")));
				}
				Ok(children)
			}
			clause if is_clause(&clause) => Ok(vec![clause]),
			other => Err(Error::malformed(format!("'{other}' is not in conjunctive normal form"))),
		}
	}

	pub fn as_comparison(&self) -> Option<&Expression> {
		match self {
			Condition::Comparison(expression) => Some(expression),
			_ => None,
		}
	}

	/// Every column name referenced anywhere in the tree, in order.
	pub fn columns(&self) -> Vec<&ColumnName> {
		match self {
			Condition::Comparison(expression) => expression.columns().collect(),
			Condition::And(children) | Condition::Or(children) => {
				children.iter().flat_map(Condition::columns).collect()
			}
		}
	}

	pub fn map_columns<F>(&self, f: &mut F) -> Result<Condition>
	where
		F: FnMut(&ColumnName) -> Result<ColumnName>,
	{
		Ok(match self {
			Condition::Comparison(expression) => Condition::Comparison(expression.map_columns(f)?),
			Condition::And(children) => {
				Condition::And(children.iter().map(|c| c.map_columns(f)).collect::<Result<_>>()?)
			}
			Condition::Or(children) => {
				Condition::Or(children.iter().map(|c| c.map_columns(f)).collect::<Result<_>>()?)
			}
		})
	}

	/// Renders the condition as an awk boolean expression. Nested lists are
	/// parenthesized.
	pub fn to_awk<F>(&self, position: &mut F) -> Result<String>
	where
		F: FnMut(&ColumnName) -> Result<usize>,
	{
		match self {
			Condition::Comparison(expression) => expression.to_awk(position),
			Condition::And(children) => Ok(format!("({})", join_awk(children, " && ", position)?)),
			Condition::Or(children) => Ok(format!("({})", join_awk(children, " || ", position)?)),
		}
	}

	/// True when no operand is a column.
	pub fn is_constant(&self) -> bool {
		self.columns().is_empty()
	}
}

fn join_awk<F>(children: &[Condition], separator: &str, position: &mut F) -> Result<String>
where
	F: FnMut(&ColumnName) -> Result<usize>,
{
	let rendered = children.iter().map(|c| c.to_awk(position)).collect::<Result<Vec<_>>>()?;
	Ok(rendered.join(separator))
}

fn same_clause(a: &[Expression], b: &[Expression]) -> bool {
	a.len() == b.len() && a.iter().all(|e| b.contains(e))
}

/// Splits CNF conjuncts into join conditions (single cross-relation
/// equalities) and filters (everything else).
pub fn classify(conjuncts: Vec<Condition>) -> (Vec<Expression>, Vec<Condition>) {
	let mut joins = Vec::new();
	let mut filters = Vec::new();
	for conjunct in conjuncts {
		match conjunct {
			Condition::Comparison(expression) if expression.can_join() => joins.push(expression),
			other => filters.push(other),
		}
	}
	(joins, filters)
}

impl Display for Condition {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		let (children, separator) = match self {
			Condition::Comparison(expression) => return Display::fmt(expression, f),
			Condition::And(children) => (children, " and "),
			Condition::Or(children) => (children, " or "),
		};
		f.write_str("(")?;
		for (i, child) in children.iter().enumerate() {
			if i > 0 {
				f.write_str(separator)?;
			}
			Display::fmt(child, f)?;
		}
		f.write_str(")")
	}
}

impl From<Expression> for Condition {
	fn from(expression: Expression) -> Self {
		Condition::Comparison(expression)
	}
}

struct TokenParser<'a> {
	tokens: &'a [ConditionToken],
	position: usize,
}

impl TokenParser<'_> {
	fn parse_or(&mut self) -> Result<Condition> {
		let mut terms = vec![self.parse_and()?];
		while matches!(self.tokens.get(self.position), Some(ConditionToken::Or)) {
			self.position += 1;
			terms.push(self.parse_and()?);
		}
		Ok(collapse(terms, Condition::Or))
	}

	fn parse_and(&mut self) -> Result<Condition> {
		let mut terms = vec![self.parse_term()?];
		while matches!(self.tokens.get(self.position), Some(ConditionToken::And)) {
			self.position += 1;
			terms.push(self.parse_term()?);
		}
		Ok(collapse(terms, Condition::And))
	}

	fn parse_term(&mut self) -> Result<Condition> {
		let token = self.tokens.get(self.position).ok_or_else(|| Error::malformed("dangling connective"))?;
		self.position += 1;
		match token {
			ConditionToken::Atom(descriptor) => Ok(Condition::Comparison(Expression::from_descriptor(descriptor)?)),
			ConditionToken::Group(tokens) => {
				Condition::from_tokens(tokens)?.ok_or_else(|| Error::malformed("empty group"))
			}
			ConditionToken::And | ConditionToken::Or => Err(Error::malformed("dangling connective")),
		}
	}
}

fn collapse(mut terms: Vec<Condition>, wrap: fn(Vec<Condition>) -> Condition) -> Condition {
	if terms.len() == 1 {
		terms.remove(0)
	} else {
		wrap(terms)
	}
}
