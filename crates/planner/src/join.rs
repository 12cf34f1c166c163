// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Sort-merge equi-join of two tables.
//!
//! `join(1)` merges on a single field and emits the key first, then the
//! remaining fields of the left input, then those of the right. Composite
//! keys join on the first pair; the other pairs are compared by a filter on
//! the join output. Pairs sharing a column end up in one merged column.

use indexmap::IndexSet;
use tracing::{debug, instrument};

use crate::{
	Error, Result,
	column::Column,
	expression::{Expression, Operator},
	table::{Table, shell_delimiter},
};

/// A `join(1)` invocation over two sorted inputs.
#[derive(Debug, Clone)]
pub struct MergeJoin {
	left: Table,
	right: Table,
	left_key: usize,
	right_key: usize,
}

impl MergeJoin {
	pub fn left(&self) -> &Table {
		&self.left
	}

	pub fn right(&self) -> &Table {
		&self.right
	}

	pub fn render(&self) -> String {
		format!(
			"join -t{} -1 {} -2 {} <({}) <({})",
			shell_delimiter(self.left.delimiter()),
			self.left_key + 1,
			self.right_key + 1,
			self.left.render(false),
			self.right.render(false)
		)
	}
}

/// Joins `left` and `right` on the equality `conditions` into a table named
/// `name`.
///
/// The result columns are the merged key columns in condition order, then
/// the other columns of `left` and of `right` in their original order.
#[instrument(name = "join::merge_join", level = "debug", skip_all, fields(left = %left.name(), right = %right.name()))]
pub fn merge_join(mut left: Table, mut right: Table, conditions: &[Expression], name: &str) -> Result<Table> {
	if conditions.is_empty() {
		return Err(Error::unsupported_join(
			format!("between '{}' and '{}'", left.name(), right.name()),
			"no equality condition connects the relations",
		));
	}

	let mut pairs: Vec<(usize, usize)> = Vec::with_capacity(conditions.len());
	for condition in conditions {
		let (Some(a), Some(b)) = (condition.left.column(), condition.right.column()) else {
			return Err(Error::unsupported_join(condition, "both operands must be columns"));
		};
		if condition.operator != Operator::Eq {
			return Err(Error::unsupported_join(condition, "only equality joins are supported"));
		}

		let pair = match (left.try_resolve(a)?, right.try_resolve(a)?, left.try_resolve(b)?, right.try_resolve(b)?) {
			(Some(l), None, None, Some(r)) => (l, r),
			(None, Some(r), Some(l), None) => (l, r),
			(None, None, _, _) => {
				return Err(Error::UnknownColumnName {
					name: a.qualified(),
				});
			}
			(_, _, None, None) => {
				return Err(Error::UnknownColumnName {
					name: b.qualified(),
				});
			}
			_ => {
				return Err(Error::unsupported_join(
					condition,
					"operands must come from different sides of the join",
				));
			}
		};
		pairs.push(pair);
	}

	let left_keys: Vec<usize> = pairs.iter().map(|(l, _)| *l).collect::<IndexSet<_>>().into_iter().collect();
	let right_keys: Vec<usize> = pairs.iter().map(|(_, r)| *r).collect::<IndexSet<_>>().into_iter().collect();

	if left.is_sorted_by(&left_keys) {
		debug!(table = %left.name(), "left input already sorted");
	} else {
		left.sort_positions(&left_keys);
	}
	if right.is_sorted_by(&right_keys) {
		debug!(table = %right.name(), "right input already sorted");
	} else {
		right.sort_positions(&right_keys);
	}

	let (left_key, right_key) = pairs[0];
	let left_rest: Vec<usize> = (0..left.columns().len()).filter(|p| *p != left_key).collect();
	let right_rest: Vec<usize> = (0..right.columns().len()).filter(|p| *p != right_key).collect();

	// positions in the raw join(1) output
	let joined_left = |p: usize| match left_rest.iter().position(|q| *q == p) {
		Some(i) => i + 1,
		None => 0,
	};
	let joined_right = |p: usize| match right_rest.iter().position(|q| *q == p) {
		Some(i) => i + 1 + left_rest.len(),
		None => 0,
	};

	let left_columns = left.columns().to_vec();
	let right_columns = right.columns().to_vec();

	let mut raw_columns = vec![Column::merge(&left_columns[left_key], &right_columns[right_key])];
	raw_columns.extend(left_rest.iter().map(|p| left_columns[*p].clone()));
	raw_columns.extend(right_rest.iter().map(|p| right_columns[*p].clone()));

	let delimiter = left.delimiter();
	let mut table = Table::from_join(
		name,
		MergeJoin {
			left,
			right,
			left_key,
			right_key,
		},
		raw_columns,
		delimiter,
	);

	if pairs.len() > 1 {
		let chained = pairs[1..]
			.iter()
			.map(|(l, r)| format!("${} == ${}", joined_left(*l) + 1, joined_right(*r) + 1))
			.collect::<Vec<_>>()
			.join(" && ");
		debug!(condition = %chained, "chaining composite join keys");
		table.filter(chained);

		let mut positions = Vec::new();
		let mut columns = Vec::new();
		for group in key_groups(&pairs) {
			let mut merged = left_columns[group.left[0]].clone();
			for l in group.left.iter().skip(1) {
				merged = Column::merge(&merged, &left_columns[*l]);
			}
			for r in &group.right {
				merged = Column::merge(&merged, &right_columns[*r]);
			}
			positions.push(joined_left(group.left[0]));
			columns.push(merged);
		}
		for p in (0..left_columns.len()).filter(|p| !left_keys.contains(p)) {
			positions.push(joined_left(p));
			columns.push(left_columns[p].clone());
		}
		for p in (0..right_columns.len()).filter(|p| !right_keys.contains(p)) {
			positions.push(joined_right(p));
			columns.push(right_columns[p].clone());
		}
		table.project(positions, columns);
	}

	Ok(table)
}

/// Key positions that hold equal values once every pair is satisfied.
struct KeyGroup {
	left: IndexSet<usize>,
	right: IndexSet<usize>,
}

/// Folds key pairs sharing a column on either side into one group, in order
/// of first appearance.
fn key_groups(pairs: &[(usize, usize)]) -> Vec<KeyGroup> {
	let mut groups: Vec<KeyGroup> = Vec::new();
	for &(l, r) in pairs {
		let matching: Vec<usize> = groups
			.iter()
			.enumerate()
			.filter(|(_, group)| group.left.contains(&l) || group.right.contains(&r))
			.map(|(i, _)| i)
			.collect();

		let Some(&first) = matching.first() else {
			groups.push(KeyGroup {
				left: IndexSet::from([l]),
				right: IndexSet::from([r]),
			});
			continue;
		};
		for &i in matching[1..].iter().rev() {
			let other = groups.remove(i);
			groups[first].left.extend(other.left);
			groups[first].right.extend(other.right);
		}
		groups[first].left.insert(l);
		groups[first].right.insert(r);
	}
	groups
}
