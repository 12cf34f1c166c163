// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Column identity across relations.
//!
//! A [`ColumnName`] is what a query author writes (`col_a`, `ta.col_a`,
//! `data/table_a.txt.col_a`); a [`Column`] is what a table carries. Columns
//! answer to every name they were ever known by, so after a join the merged
//! key column can be addressed through either side's qualifier.

use std::{
	fmt,
	fmt::{Display, Formatter},
	hash::{Hash, Hasher},
};

use indexmap::IndexSet;

use crate::{Error, Result};

/// Returns true if `text` is a plain column identifier: a letter or
/// underscore followed by letters, digits or underscores.
pub fn is_identifier(text: &str) -> bool {
	let mut chars = text.chars();
	match chars.next() {
		Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
		_ => return false,
	}
	chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A case-insensitive column identifier, optionally qualified by the names
/// and aliases of the relations it may belong to.
///
/// Equality is deliberately loose: an unqualified name equals every name
/// with the same plain name, and two qualified names are equal when their
/// qualifier sets intersect. The relation is not transitive, which is why
/// `ColumnName` implements neither `Eq` nor `Ord`.
#[derive(Debug, Clone)]
pub struct ColumnName {
	name: String,
	cased: String,
	qualifiers: IndexSet<String>,
}

impl ColumnName {
	/// Parses `name` or `qualifier.name`. Everything before the last dot is
	/// a single qualifier, so file paths can qualify columns directly.
	pub fn parse(text: &str) -> Result<Self> {
		match text.rsplit_once('.') {
			Some((qualifier, name)) if !qualifier.is_empty() => Self::new(name, [qualifier]),
			Some(_) => Err(Error::InvalidColumnName {
				name: text.to_string(),
			}),
			None => Self::new(text, std::iter::empty::<&str>()),
		}
	}

	pub fn new<I, S>(name: &str, qualifiers: I) -> Result<Self>
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		if !is_identifier(name) {
			return Err(Error::InvalidColumnName {
				name: name.to_string(),
			});
		}

		Ok(Self {
			name: name.to_ascii_lowercase(),
			cased: name.to_string(),
			qualifiers: qualifiers.into_iter().map(|q| q.as_ref().to_ascii_lowercase()).collect(),
		})
	}

	/// Returns a copy of this name that is additionally qualified by
	/// `qualifiers`.
	pub fn with_qualifiers<I, S>(&self, qualifiers: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let mut result = self.clone();
		result.qualifiers.extend(qualifiers.into_iter().map(|q| q.as_ref().to_ascii_lowercase()));
		result
	}

	/// The lower-cased plain name.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// The plain name as it was written.
	pub fn cased(&self) -> &str {
		&self.cased
	}

	pub fn qualifiers(&self) -> &IndexSet<String> {
		&self.qualifiers
	}

	pub fn is_qualified(&self) -> bool {
		!self.qualifiers.is_empty()
	}

	/// An unqualified name is looser than a qualified name with the same
	/// plain name.
	pub fn is_looser_than(&self, other: &ColumnName) -> bool {
		self.name == other.name && !self.is_qualified() && other.is_qualified()
	}

	pub fn is_tighter_than(&self, other: &ColumnName) -> bool {
		other.is_looser_than(self)
	}

	/// True if this name is at least as loose as `other`, i.e. a reference
	/// written as `self` may denote a column called `other`.
	pub fn matches(&self, other: &ColumnName) -> bool {
		self.is_looser_than(other) || self == other
	}

	/// Every candidate this name matches. The result is not commutative:
	/// `a.match_names([b])` returns `b`, `b.match_names([a])` returns `a`.
	pub fn match_names<'a, I>(&self, candidates: I) -> Vec<&'a ColumnName>
	where
		I: IntoIterator<Item = &'a ColumnName>,
	{
		candidates.into_iter().filter(|candidate| self.matches(candidate)).collect()
	}

	/// Strict identity: same plain name and the same qualifier set.
	pub fn identical(&self, other: &ColumnName) -> bool {
		self.name == other.name && self.qualifiers == other.qualifiers
	}

	/// The name with its qualifiers spelled out, e.g. `(table_a.txt|ta).col_a`.
	pub fn qualified(&self) -> String {
		match self.qualifiers.len() {
			0 => self.name.clone(),
			1 => format!("{}.{}", self.qualifiers[0], self.name),
			_ => {
				let mut qualifiers: Vec<&str> = self.qualifiers.iter().map(String::as_str).collect();
				qualifiers.sort_unstable();
				format!("({}).{}", qualifiers.join("|"), self.name)
			}
		}
	}
}

impl PartialEq for ColumnName {
	fn eq(&self, other: &Self) -> bool {
		self.name == other.name
			&& (self.qualifiers.is_empty()
				|| other.qualifiers.is_empty()
				|| self.qualifiers.iter().any(|q| other.qualifiers.contains(q)))
	}
}

impl Hash for ColumnName {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.name.hash(state);
	}
}

impl Display for ColumnName {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str(&self.cased)
	}
}

/// A column of a [`crate::Table`].
///
/// The first name is the primary name; a join appends the other side's
/// names so the merged column keeps answering to both qualifiers. The alias
/// is what the header line prints.
#[derive(Debug, Clone)]
pub struct Column {
	names: Vec<ColumnName>,
	alias: ColumnName,
}

impl Column {
	pub fn new(name: ColumnName) -> Self {
		Self {
			alias: name.clone(),
			names: vec![name],
		}
	}

	/// A column read from a header field of the relation known as
	/// `qualifiers` (typically its path and alias).
	pub fn from_field<I, S>(field: &str, qualifiers: I) -> Result<Self>
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		Ok(Self::new(ColumnName::new(field.trim(), qualifiers)?))
	}

	pub fn with_alias(mut self, alias: ColumnName) -> Self {
		self.alias = alias;
		self
	}

	pub fn names(&self) -> &[ColumnName] {
		&self.names
	}

	pub fn primary(&self) -> &ColumnName {
		&self.names[0]
	}

	pub fn alias(&self) -> &ColumnName {
		&self.alias
	}

	/// True if a reference written as `name` may denote this column.
	pub fn matches(&self, name: &ColumnName) -> bool {
		self.names.iter().any(|own| name.matches(own))
	}

	/// Every candidate that at least one of this column's names matches.
	pub fn match_columns<'a, I>(&self, candidates: I) -> Vec<&'a Column>
	where
		I: IntoIterator<Item = &'a Column>,
	{
		candidates
			.into_iter()
			.filter(|candidate| self.names.iter().any(|own| candidate.names.iter().any(|n| own.matches(n))))
			.collect()
	}

	/// The column produced when `left` and `right` are joined on equality:
	/// it carries the names of both inputs and the alias of the left one.
	pub fn merge(left: &Column, right: &Column) -> Column {
		let mut names = left.names.clone();
		for name in &right.names {
			if !names.iter().any(|n| n.identical(name)) {
				names.push(name.clone());
			}
		}
		Column {
			names,
			alias: left.alias.clone(),
		}
	}

	/// Every name of this column with its qualifiers, for diagnostics.
	pub fn describe(&self) -> String {
		self.names.iter().map(ColumnName::qualified).collect::<Vec<_>>().join(" = ")
	}
}

impl PartialEq for Column {
	fn eq(&self, other: &Self) -> bool {
		self.names.len() == other.names.len()
			&& self.names.iter().zip(&other.names).all(|(a, b)| a.identical(b))
			&& self.alias.identical(&other.alias)
	}
}

impl Eq for Column {}

impl Hash for Column {
	fn hash<H: Hasher>(&self, state: &mut H) {
		for name in &self.names {
			name.hash(state);
		}
		self.alias.hash(state);
	}
}

impl Display for Column {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		Display::fmt(&self.alias, f)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn name(text: &str) -> ColumnName {
		ColumnName::parse(text).unwrap()
	}

	fn qualified(text: &str, qualifiers: &[&str]) -> ColumnName {
		ColumnName::new(text, qualifiers).unwrap()
	}

	#[test]
	fn test_same_name_is_equal() {
		assert_eq!(name("col_a"), name("col_a"));
		assert_ne!(name("col_a"), name("col_b"));
	}

	#[test]
	fn test_case_insensitive() {
		assert_eq!(name("Col_A"), name("col_a"));
		assert_eq!(name("Table_A.col_a"), name("table_a.COL_A"));
		assert_eq!(name("Col_A").to_string(), "Col_A");
	}

	#[test]
	fn test_qualified_names() {
		assert_eq!(name("table_a.col_a"), name("table_a.col_a"));
		assert_ne!(name("table_b.col_a"), name("table_a.col_a"));
		assert_ne!(name("table_a.col_a"), name("table_a.col_b"));
	}

	#[test]
	fn test_path_qualifier() {
		let col = name("data/table_a.txt.col_a");
		assert_eq!(col.name(), "col_a");
		assert_eq!(col.qualifiers().iter().collect::<Vec<_>>(), vec!["data/table_a.txt"]);
	}

	#[test]
	fn test_unqualified_equals_qualified() {
		assert_eq!(name("col_a"), name("table_a.col_a"));
		assert_eq!(name("col_a"), qualified("col_a", &["table_a", "ta"]));
	}

	#[test]
	fn test_intersecting_qualifiers() {
		assert_eq!(qualified("col_a", &["ta"]), qualified("col_a", &["table_a", "ta"]));
		assert_eq!(qualified("col_a", &["ta", "tb"]), qualified("col_a", &["table_a", "ta"]));
		assert_ne!(qualified("col_a", &["table_b", "tb"]), qualified("col_a", &["table_a", "ta"]));
	}

	#[test]
	fn test_invalid_names() {
		for text in ["1col", "col-a", "", "ta.", ".col_a", "col a", "'x'"] {
			assert!(
				matches!(ColumnName::parse(text), Err(Error::InvalidColumnName { .. })),
				"{text} should be invalid"
			);
		}
	}

	#[test]
	fn test_looser_than() {
		let u = name("col_a");
		let q = name("ta.col_a");
		assert!(u.is_looser_than(&q));
		assert!(!q.is_looser_than(&u));
		assert!(q.is_tighter_than(&u));
		assert!(!u.is_looser_than(&name("col_a")));
		assert!(!u.is_looser_than(&name("ta.col_b")));
	}

	#[test]
	fn test_match_is_not_commutative() {
		let u = name("col_a");
		let q = name("ta.col_a");

		let u_matches = u.match_names([&q]);
		let q_matches = q.match_names([&u]);

		assert_eq!(u_matches.len(), 1);
		assert!(u_matches[0].identical(&q));
		assert_eq!(q_matches.len(), 1);
		assert!(q_matches[0].identical(&u));
		assert!(!u_matches[0].identical(q_matches[0]));
	}

	#[test]
	fn test_match_names_filters_candidates() {
		let candidates = [name("ta.col_a"), name("tb.col_a"), name("ta.col_b")];
		assert_eq!(name("col_a").match_names(&candidates).len(), 2);
		assert_eq!(name("tb.col_a").match_names(&candidates).len(), 1);
		assert!(name("tc.col_a").match_names(&candidates).is_empty());
	}

	#[test]
	fn test_qualified_display() {
		assert_eq!(name("col_a").qualified(), "col_a");
		assert_eq!(name("ta.col_a").qualified(), "ta.col_a");
		assert_eq!(qualified("col_a", &["tb", "ta"]).qualified(), "(ta|tb).col_a");
	}

	#[test]
	fn test_merge_answers_to_both_sides() {
		let left = Column::from_field("col_a", ["table_a"]).unwrap();
		let right = Column::from_field("col_a", ["table_b"]).unwrap();
		let merged = Column::merge(&left, &right);

		assert!(merged.matches(&name("table_a.col_a")));
		assert!(merged.matches(&name("table_b.col_a")));
		assert!(merged.matches(&name("col_a")));
		assert!(!merged.matches(&name("table_c.col_a")));
		assert_eq!(merged.names().len(), 2);
		assert!(merged.alias().identical(left.alias()));

		// inputs are untouched
		assert_eq!(left.names().len(), 1);
		assert_eq!(right.names().len(), 1);
	}

	#[test]
	fn test_column_identity_is_strict() {
		let a = Column::from_field("col_a", ["ta"]).unwrap();
		let b = Column::from_field("col_a", ["tb"]).unwrap();
		assert_eq!(a, a.clone());
		assert_ne!(a, b);
	}

	#[test]
	fn test_match_columns() {
		let ta = Column::from_field("col_a", ["ta"]).unwrap();
		let tb = Column::from_field("col_a", ["tb"]).unwrap();
		let tb_z = Column::from_field("col_z", ["tb"]).unwrap();

		let reference = Column::new(name("col_a"));
		assert_eq!(reference.match_columns([&ta, &tb, &tb_z]).len(), 2);

		let reference = Column::new(name("tb.col_a"));
		let matched = reference.match_columns([&ta, &tb, &tb_z]);
		assert_eq!(matched, vec![&tb]);
	}
}
