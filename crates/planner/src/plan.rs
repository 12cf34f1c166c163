// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Join ordering and condition staging.
//!
//! Relations are nodes of a [`JoinGraph`] whose edges are equality join
//! conditions. [`choose_order`] walks the graph greedily by priority, only
//! ever visiting a relation once it can be joined to what was visited
//! before. [`stage_conditions`] then assigns every condition to the first
//! prefix of that order on which it can be evaluated.

use std::{
	cmp::Reverse,
	collections::BinaryHeap,
	fmt::Debug,
};

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, instrument, trace};

use crate::{
	Error, Result,
	ast::RelationDescriptor,
	column::ColumnName,
	condition::Condition,
	expression::Expression,
	table::Table,
};

#[derive(Debug, Clone)]
pub struct JoinNode {
	pub alias: String,
	pub path: String,
	/// Position in the FROM clause.
	pub position: usize,
	/// The node becomes reachable once every relation of one of these sets
	/// has been visited.
	pub neighbors: Vec<IndexSet<String>>,
}

impl JoinNode {
	fn add_neighbors(&mut self, neighbors: IndexSet<String>) {
		if !self.neighbors.contains(&neighbors) {
			self.neighbors.push(neighbors);
		}
	}

	fn answers_to(&self, qualifier: &str) -> bool {
		self.alias.eq_ignore_ascii_case(qualifier) || self.path.eq_ignore_ascii_case(qualifier)
	}
}

/// Relations keyed by alias, connected by equality join conditions.
#[derive(Debug, Clone, Default)]
pub struct JoinGraph {
	nodes: IndexMap<String, JoinNode>,
}

impl JoinGraph {
	#[instrument(name = "plan::build_graph", level = "debug", skip_all)]
	pub fn build(relations: &[RelationDescriptor], joins: &[Expression]) -> Result<Self> {
		let mut graph = JoinGraph::default();
		for (position, relation) in relations.iter().enumerate() {
			let alias = relation.alias().to_string();
			if graph.nodes.contains_key(&alias) {
				return Err(Error::DuplicateRelation {
					alias,
				});
			}
			graph.nodes.insert(
				alias.clone(),
				JoinNode {
					alias,
					path: relation.path.clone(),
					position,
					neighbors: Vec::new(),
				},
			);
		}

		for join in joins {
			let (Some(left), Some(right)) = (join.left.column(), join.right.column()) else {
				return Err(Error::unsupported_join(join, "both operands must be columns"));
			};
			let left = graph.relation_of(left)?;
			let right = graph.relation_of(right)?;
			if left == right {
				return Err(Error::unsupported_join(join, "operands belong to the same relation"));
			}
			trace!(%left, %right, "edge");

			graph.node_mut(&left).add_neighbors(IndexSet::from([right.clone()]));
			graph.node_mut(&right).add_neighbors(IndexSet::from([left]));
		}

		Ok(graph)
	}

	/// The alias of the relation a qualified column name belongs to.
	pub fn relation_of(&self, name: &ColumnName) -> Result<String> {
		name.qualifiers()
			.iter()
			.find_map(|qualifier| self.nodes.values().find(|node| node.answers_to(qualifier)))
			.map(|node| node.alias.clone())
			.ok_or_else(|| Error::UnknownColumnName {
				name: name.qualified(),
			})
	}

	fn node_mut(&mut self, alias: &str) -> &mut JoinNode {
		&mut self.nodes[alias]
	}

	pub fn node(&self, alias: &str) -> Option<&JoinNode> {
		self.nodes.get(alias)
	}

	pub fn nodes(&self) -> impl Iterator<Item = &JoinNode> {
		self.nodes.values()
	}

	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	fn is_reachable(&self, node: &JoinNode, visited: &IndexSet<String>) -> bool {
		node.neighbors.iter().any(|set| set.iter().all(|alias| visited.contains(alias)))
	}
}

/// Assigns every relation a weight; higher weights are joined earlier.
pub trait PriorityPolicy: Debug + Send + Sync {
	fn prioritize(&self, graph: &JoinGraph, filters: &[Condition]) -> IndexMap<String, u32>;
}

/// Weighs every relation the same, so the FROM clause order decides.
#[derive(Debug, Default, Clone, Copy)]
pub struct UniformPriority;

impl PriorityPolicy for UniformPriority {
	fn prioritize(&self, graph: &JoinGraph, _filters: &[Condition]) -> IndexMap<String, u32> {
		graph.nodes().map(|node| (node.alias.clone(), 1)).collect()
	}
}

/// Orders the relations so that each one after the first is reachable
/// through an equality join from those before it. Starts at the highest
/// priority relation; ties go to the earliest in the FROM clause.
#[instrument(name = "plan::choose_order", level = "debug", skip_all)]
pub fn choose_order(graph: &JoinGraph, priorities: &IndexMap<String, u32>) -> Result<Vec<String>> {
	let priority = |node: &JoinNode| priorities.get(&node.alias).copied().unwrap_or(0);
	let rank = |node: &JoinNode| (priority(node), Reverse(node.position));

	let Some(start) = graph.nodes().max_by_key(|node| rank(node)) else {
		return Ok(Vec::new());
	};

	let mut visited: IndexSet<String> = IndexSet::new();
	let mut frontier: BinaryHeap<(u32, Reverse<usize>, String)> = BinaryHeap::new();
	let mut queued: IndexSet<String> = IndexSet::new();

	let mut current = Some(start);
	while let Some(node) = current {
		trace!(alias = %node.alias, "visit");
		visited.insert(node.alias.clone());

		for alias in node.neighbors.iter().flatten() {
			if visited.contains(alias) || queued.contains(alias) {
				continue;
			}
			let Some(neighbor) = graph.node(alias) else {
				continue;
			};
			if graph.is_reachable(neighbor, &visited) {
				let (p, position) = rank(neighbor);
				frontier.push((p, position, alias.clone()));
				queued.insert(alias.clone());
			}
		}

		current = frontier.pop().and_then(|(_, _, alias)| {
			queued.swap_remove(&alias);
			graph.node(&alias)
		});
	}

	if let Some(unreached) = graph.nodes().find(|node| !visited.contains(&node.alias)) {
		return Err(Error::unsupported_join(
			format!("for relation '{}'", unreached.alias),
			"no equality join connects it to the other relations",
		));
	}

	let order: Vec<String> = visited.into_iter().collect();
	debug!(order = ?order, "join order");
	Ok(order)
}

/// Assigns each condition to the first prefix of `tables` on which every
/// column it references resolves. Conditions without columns go to the
/// first stage.
#[instrument(name = "plan::stage_conditions", level = "debug", skip_all)]
pub fn stage_conditions(tables: &[Table], conditions: &[Condition]) -> Result<Vec<Vec<Condition>>> {
	let mut stages: Vec<Vec<Condition>> = vec![Vec::new(); tables.len().max(1)];

	for condition in conditions {
		let stage = stage_of(tables, condition)?;
		trace!(%condition, stage, "staged");
		stages[stage].push(condition.clone());
	}

	Ok(stages)
}

fn stage_of(tables: &[Table], condition: &Condition) -> Result<usize> {
	let names = condition.columns();

	let mut stage = 0;
	let mut hits: Vec<Vec<(usize, usize)>> = Vec::with_capacity(names.len());
	for name in &names {
		let mut found = Vec::new();
		for (i, table) in tables.iter().enumerate() {
			if let Some(position) = table.try_resolve(name)? {
				found.push((i, position));
			}
		}
		let Some((first, _)) = found.first() else {
			return Err(Error::UnknownColumnName {
				name: name.qualified(),
			});
		};
		stage = stage.max(*first);
		hits.push(found);
	}

	for (name, found) in names.iter().zip(&hits) {
		let in_scope: Vec<&(usize, usize)> = found.iter().filter(|(i, _)| *i <= stage).collect();
		if in_scope.len() > 1 {
			return Err(Error::AmbiguousColumnName {
				name: name.qualified(),
				candidates: in_scope
					.into_iter()
					.map(|(i, position)| format!("{}: {}", tables[*i].name(), tables[*i].columns()[*position].describe()))
					.collect(),
			});
		}
	}

	Ok(stage)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{ast::ConditionToken, catalog::MemoryCatalog};

	fn relations(aliases: &[&str]) -> Vec<RelationDescriptor> {
		aliases.iter().map(|a| RelationDescriptor::new(format!("{a}.txt")).with_alias(*a)).collect()
	}

	fn expression(left: &str, op: &str, right: &str) -> Expression {
		match Condition::from_tokens(&[ConditionToken::atom(left, op, right)]).unwrap().unwrap() {
			Condition::Comparison(expression) => expression,
			other => panic!("unexpected {other}"),
		}
	}

	fn condition(left: &str, op: &str, right: &str) -> Condition {
		Condition::Comparison(expression(left, op, right))
	}

	fn uniform(graph: &JoinGraph) -> IndexMap<String, u32> {
		UniformPriority.prioritize(graph, &[])
	}

	#[derive(Debug)]
	struct Favor(&'static str);

	impl PriorityPolicy for Favor {
		fn prioritize(&self, graph: &JoinGraph, _filters: &[Condition]) -> IndexMap<String, u32> {
			graph.nodes().map(|n| (n.alias.clone(), if n.alias == self.0 { 10 } else { 1 })).collect()
		}
	}

	#[test]
	fn test_single_relation() {
		let graph = JoinGraph::build(&relations(&["a"]), &[]).unwrap();
		assert_eq!(choose_order(&graph, &uniform(&graph)).unwrap(), vec!["a"]);
	}

	#[test]
	fn test_chain_follows_from_order() {
		let graph =
			JoinGraph::build(&relations(&["a", "b", "c"]), &[expression("a.x", "=", "b.x"), expression("b.y", "=", "c.y")])
				.unwrap();
		assert_eq!(choose_order(&graph, &uniform(&graph)).unwrap(), vec!["a", "b", "c"]);
	}

	#[test]
	fn test_reachability_constrains_order() {
		// c is only connected through a
		let graph =
			JoinGraph::build(&relations(&["a", "b", "c"]), &[expression("c.x", "=", "a.x"), expression("a.y", "=", "b.y")])
				.unwrap();
		let order = choose_order(&graph, &Favor("c").prioritize(&graph, &[])).unwrap();
		assert_eq!(order, vec!["c", "a", "b"]);

		let order = choose_order(&graph, &Favor("b").prioritize(&graph, &[])).unwrap();
		assert_eq!(order, vec!["b", "a", "c"]);
	}

	#[test]
	fn test_priority_breaks_frontier_ties() {
		let graph =
			JoinGraph::build(&relations(&["a", "b", "c"]), &[expression("a.x", "=", "b.x"), expression("a.y", "=", "c.y")])
				.unwrap();
		assert_eq!(choose_order(&graph, &uniform(&graph)).unwrap(), vec!["a", "b", "c"]);

		let priorities: IndexMap<String, u32> =
			[("a".to_string(), 5), ("b".to_string(), 1), ("c".to_string(), 2)].into_iter().collect();
		assert_eq!(choose_order(&graph, &priorities).unwrap(), vec!["a", "c", "b"]);
	}

	#[test]
	fn test_disconnected_relation() {
		let graph = JoinGraph::build(&relations(&["a", "b", "c"]), &[expression("a.x", "=", "b.x")]).unwrap();
		let err = choose_order(&graph, &uniform(&graph)).unwrap_err();
		assert!(matches!(err, Error::UnsupportedJoinPredicate { ref predicate, .. } if predicate.contains("'c'")));
	}

	#[test]
	fn test_duplicate_alias() {
		assert!(matches!(JoinGraph::build(&relations(&["a", "a"]), &[]), Err(Error::DuplicateRelation { .. })));
	}

	#[test]
	fn test_relation_of_path_or_alias() {
		let graph = JoinGraph::build(&relations(&["a", "b"]), &[]).unwrap();
		assert_eq!(graph.relation_of(&ColumnName::parse("a.txt.x").unwrap()).unwrap(), "a");
		assert_eq!(graph.relation_of(&ColumnName::parse("B.x").unwrap()).unwrap(), "b");
		assert!(graph.relation_of(&ColumnName::parse("x").unwrap()).is_err());
	}

	fn tables() -> Vec<Table> {
		let catalog = MemoryCatalog::new()
			.with_relation("table_a.txt", ["col_a", "col_b"])
			.with_relation("table_b.txt", ["col_a", "col_z"])
			.with_relation("table_d.txt", ["col_a", "col_b", "col_x"]);
		["table_a.txt", "table_b.txt", "table_d.txt"]
			.iter()
			.map(|path| Table::from_file_path(path, None, ',', &catalog).unwrap())
			.collect()
	}

	#[test]
	fn test_staging_minimality() {
		let tables = tables();
		let conditions = vec![
			condition("col_z", "=", "'w'"),
			condition("table_a.txt.col_b", "<", "3"),
			condition("col_x", "=", "'p'"),
			condition("table_a.txt.col_a", "<", "col_z"),
			condition("1", "=", "1"),
		];
		let stages = stage_conditions(&tables, &conditions).unwrap();

		assert_eq!(stages.len(), 3);
		assert_eq!(stages[0], vec![conditions[1].clone(), conditions[4].clone()]);
		assert_eq!(stages[1], vec![conditions[0].clone(), conditions[3].clone()]);
		assert_eq!(stages[2], vec![conditions[2].clone()]);
	}

	#[test]
	fn test_staging_ambiguity() {
		let tables = tables();

		// only the first relation is in scope at the first stage
		let stages = stage_conditions(&tables, &[condition("col_a", "=", "1")]).unwrap();
		assert_eq!(stages[0].len(), 1);

		let err = stage_conditions(&tables, &[condition("col_a", "<", "col_x")]).unwrap_err();
		assert!(matches!(err, Error::AmbiguousColumnName { candidates, .. } if candidates.len() == 3));

		// table_d.txt.col_b is out of scope at the second stage
		let stages = stage_conditions(&tables, &[condition("col_b", "<", "col_z")]).unwrap();
		assert_eq!(stages[1].len(), 1);
	}

	#[test]
	fn test_staging_unknown_column() {
		let tables = tables();
		let err = stage_conditions(&tables, &[condition("col_q", "=", "1")]).unwrap_err();
		assert!(matches!(err, Error::UnknownColumnName { .. }));
	}
}
