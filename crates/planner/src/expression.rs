// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	fmt,
	fmt::{Display, Formatter},
};

use crate::{Error, Result, ast::ConditionDescriptor, column::ColumnName};

#[derive(Debug, Clone)]
pub enum Operand {
	Column(ColumnName),
	Literal(String),
}

impl Operand {
	/// Anything that parses as a column name is a column; numbers, quoted
	/// strings and every other token are literals.
	pub fn parse(text: &str) -> Self {
		let text = text.trim();
		match ColumnName::parse(text) {
			Ok(name) => Operand::Column(name),
			Err(_) => Operand::Literal(text.to_string()),
		}
	}

	pub fn column(&self) -> Option<&ColumnName> {
		match self {
			Operand::Column(name) => Some(name),
			Operand::Literal(_) => None,
		}
	}

	/// The literal as awk reads it: single-quoted SQL strings become
	/// double-quoted awk strings. The awk program is itself single-quoted
	/// in the shell, so a quote inside the string is written as `\047`.
	pub fn awk_literal(literal: &str) -> String {
		let Some(inner) = literal.strip_prefix('\'').and_then(|rest| rest.strip_suffix('\'')) else {
			return literal.to_string();
		};
		let mut result = String::with_capacity(inner.len() + 2);
		result.push('"');
		for c in inner.replace("''", "'").chars() {
			match c {
				'\\' => result.push_str("\\\\"),
				'"' => result.push_str("\\\""),
				'\'' => result.push_str("\\047"),
				c => result.push(c),
			}
		}
		result.push('"');
		result
	}
}

impl PartialEq for Operand {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Operand::Column(l), Operand::Column(r)) => l.identical(r),
			(Operand::Literal(l), Operand::Literal(r)) => l == r,
			_ => false,
		}
	}
}

impl Display for Operand {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Operand::Column(name) => f.write_str(&name.qualified()),
			Operand::Literal(literal) => f.write_str(literal),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
	Eq,
	NotEq,
	Lt,
	LtEq,
	Gt,
	GtEq,
}

impl Operator {
	pub fn parse(text: &str) -> Result<Self> {
		let operator = match text.trim().to_ascii_lowercase().as_str() {
			"=" | "==" | "eq" => Operator::Eq,
			"!=" | "<>" | "ne" => Operator::NotEq,
			"<" | "lt" => Operator::Lt,
			"<=" | "le" => Operator::LtEq,
			">" | "gt" => Operator::Gt,
			">=" | "ge" => Operator::GtEq,
			_ => {
				return Err(Error::InvalidOperator {
					operator: text.to_string(),
				});
			}
		};
		Ok(operator)
	}

	pub fn symbol(&self) -> &'static str {
		match self {
			Operator::Eq => "==",
			Operator::NotEq => "!=",
			Operator::Lt => "<",
			Operator::LtEq => "<=",
			Operator::Gt => ">",
			Operator::GtEq => ">=",
		}
	}

	pub fn negate(&self) -> Self {
		match self {
			Operator::Eq => Operator::NotEq,
			Operator::NotEq => Operator::Eq,
			Operator::Lt => Operator::GtEq,
			Operator::LtEq => Operator::Gt,
			Operator::Gt => Operator::LtEq,
			Operator::GtEq => Operator::Lt,
		}
	}
}

impl Display for Operator {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str(self.symbol())
	}
}

/// An atomic comparison between two operands.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
	pub left: Operand,
	pub operator: Operator,
	pub right: Operand,
}

impl Expression {
	pub fn new(left: Operand, operator: Operator, right: Operand) -> Self {
		Self {
			left,
			operator,
			right,
		}
	}

	pub fn from_descriptor(descriptor: &ConditionDescriptor) -> Result<Self> {
		Ok(Self::new(
			Operand::parse(&descriptor.left_operand),
			Operator::parse(&descriptor.operator)?,
			Operand::parse(&descriptor.right_operand),
		))
	}

	/// True for an equality between columns of two different relations.
	pub fn can_join(&self) -> bool {
		match (&self.left, &self.right) {
			(Operand::Column(l), Operand::Column(r)) => {
				self.operator == Operator::Eq && l.qualifiers() != r.qualifiers()
			}
			_ => false,
		}
	}

	pub fn negate(&self) -> Self {
		Self::new(self.left.clone(), self.operator.negate(), self.right.clone())
	}

	pub fn columns(&self) -> impl Iterator<Item = &ColumnName> {
		self.left.column().into_iter().chain(self.right.column())
	}

	/// Rewrites every column operand through `f`.
	pub fn map_columns<F>(&self, f: &mut F) -> Result<Self>
	where
		F: FnMut(&ColumnName) -> Result<ColumnName>,
	{
		let mut map = |operand: &Operand| -> Result<Operand> {
			Ok(match operand {
				Operand::Column(name) => Operand::Column(f(name)?),
				literal => literal.clone(),
			})
		};
		Ok(Self::new(map(&self.left)?, self.operator, map(&self.right)?))
	}

	/// Renders the comparison as awk, with `position` mapping a column name
	/// to its 1-based field number.
	pub fn to_awk<F>(&self, position: &mut F) -> Result<String>
	where
		F: FnMut(&ColumnName) -> Result<usize>,
	{
		let mut render = |operand: &Operand| -> Result<String> {
			Ok(match operand {
				Operand::Column(name) => format!("${}", position(name)?),
				Operand::Literal(literal) => Operand::awk_literal(literal),
			})
		};
		Ok(format!("{} {} {}", render(&self.left)?, self.operator, render(&self.right)?))
	}
}

impl Display for Expression {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "{} {} {}", self.left, self.operator, self.right)
	}
}
