// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use indexmap::IndexSet;
use tracing::{debug, instrument};

use crate::{
	Error, Result,
	ast::SelectStatement,
	catalog::Catalog,
	column::ColumnName,
	condition::{Condition, classify},
	config::Config,
	expression::Expression,
	join::merge_join,
	plan::{JoinGraph, choose_order, stage_conditions},
	table::Table,
};

/// One entry of the select list.
#[derive(Debug, Clone)]
pub enum SelectItem {
	/// `*`
	Wildcard,
	/// `q.*`, where `q` is a relation alias or path.
	QualifiedWildcard(String),
	Column(ColumnName),
	/// `count(*)` or `count(name)`.
	Count(Option<ColumnName>),
}

impl SelectItem {
	pub fn parse(text: &str) -> Result<Self> {
		let text = text.trim();
		if text == "*" {
			return Ok(SelectItem::Wildcard);
		}
		if let Some(qualifier) = text.strip_suffix(".*") {
			return Ok(SelectItem::QualifiedWildcard(qualifier.to_string()));
		}
		if let Some(argument) = count_argument(text) {
			return Ok(match argument {
				"*" => SelectItem::Count(None),
				name => SelectItem::Count(Some(ColumnName::parse(name)?)),
			});
		}
		Ok(SelectItem::Column(ColumnName::parse(text)?))
	}
}

fn count_argument(text: &str) -> Option<&str> {
	if !text.get(..5)?.eq_ignore_ascii_case("count") {
		return None;
	}
	text[5..].trim_start().strip_prefix('(')?.strip_suffix(')').map(str::trim)
}

enum Output {
	Columns(Vec<ColumnName>),
	Count(Option<ColumnName>),
}

/// Compiles a [`SelectStatement`] into a [`Table`].
#[derive(Debug, Clone)]
pub struct Query {
	statement: SelectStatement,
	config: Config,
}

impl Query {
	pub fn new(statement: SelectStatement, config: Config) -> Self {
		Self {
			statement,
			config,
		}
	}

	pub fn statement(&self) -> &SelectStatement {
		&self.statement
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	/// Compiles the statement and renders the resulting pipeline.
	pub fn compile(&self, catalog: &dyn Catalog) -> Result<String> {
		Ok(self.execute(catalog)?.render(self.config.header))
	}

	#[instrument(name = "query::execute", level = "debug", skip_all)]
	pub fn execute(&self, catalog: &dyn Catalog) -> Result<Table> {
		let statement = &self.statement;
		if statement.relations.is_empty() {
			return Err(Error::NoRelations);
		}

		let mut aliases = IndexSet::new();
		for relation in &statement.relations {
			if !aliases.insert(relation.alias().to_ascii_lowercase()) {
				return Err(Error::DuplicateRelation {
					alias: relation.alias().to_string(),
				});
			}
		}

		let tables = statement
			.relations
			.iter()
			.map(|relation| {
				Table::from_file_path(&relation.path, Some(relation.alias()), self.config.delimiter, catalog)
			})
			.collect::<Result<Vec<_>>>()?;

		let output = self.output(&tables)?;

		let (joins, filters) = match Condition::from_tokens(&statement.conditions)? {
			Some(condition) => {
				let conjuncts = condition.to_cnf().into_conjuncts()?;
				let qualified = conjuncts
					.iter()
					.map(|conjunct| conjunct.map_columns(&mut |name: &ColumnName| qualify(&tables, name)))
					.collect::<Result<Vec<_>>>()?;
				classify(qualified)
			}
			None => (Vec::new(), Vec::new()),
		};
		debug!(joins = joins.len(), filters = filters.len(), "classified conditions");

		let graph = JoinGraph::build(&statement.relations, &joins)?;
		let priorities = self.config.priority.prioritize(&graph, &filters);
		let order = choose_order(&graph, &priorities)?;

		let mut slots: Vec<Option<Table>> = tables.into_iter().map(Some).collect();
		let ordered: Vec<Table> = order
			.iter()
			.filter_map(|alias| graph.node(alias).and_then(|node| slots[node.position].take()))
			.collect();

		let join_conditions: Vec<Condition> = joins.into_iter().map(Condition::from).collect();
		let join_stages = stage_conditions(&ordered, &join_conditions)?;
		let filter_stages = stage_conditions(&ordered, &filters)?;

		let mut result = self.build_left_deep(ordered, &join_stages, &filter_stages)?;

		match output {
			Output::Count(column) => {
				if let Some(size) = statement.sample {
					result.sample_rows(size, self.config.seed);
				}
				result.count_rows(column.as_ref())?;
			}
			Output::Columns(names) => {
				result.reorder_columns(&names, true)?;
				let aliases = names
					.iter()
					.map(|name| ColumnName::new(name.cased(), std::iter::empty::<&str>()))
					.collect::<Result<Vec<_>>>()?;
				result.alias_columns(&aliases);
				if let Some(size) = statement.sample {
					result.sample_rows(size, self.config.seed);
				}
			}
		}

		Ok(result)
	}

	/// Folds the ordered tables into a left-deep join tree. Filters staged
	/// at a table that only reference that table run before its join.
	fn build_left_deep(
		&self,
		ordered: Vec<Table>,
		join_stages: &[Vec<Condition>],
		filter_stages: &[Vec<Condition>],
	) -> Result<Table> {
		let mut ordered = ordered.into_iter();
		let Some(mut result) = ordered.next() else {
			return Err(Error::NoRelations);
		};

		let mut first: Vec<Condition> = filter_stages[0].clone();
		first.extend(join_stages[0].iter().cloned());
		result.filter_rows(&first)?;

		let mut generated = 0;
		for (stage, mut table) in ordered.enumerate().map(|(i, table)| (i + 1, table)) {
			let (local, post): (Vec<Condition>, Vec<Condition>) =
				filter_stages[stage].iter().cloned().partition(|condition| {
					condition.columns().iter().all(|name| matches!(table.try_resolve(name), Ok(Some(_))))
				});
			table.filter_rows(&local)?;

			let keys: Vec<Expression> =
				join_stages[stage].iter().filter_map(|condition| condition.as_comparison().cloned()).collect();

			generated += 1;
			result = merge_join(result, table, &keys, &format!("join_{generated}"))?;
			result.filter_rows(&post)?;
		}

		Ok(result)
	}

	/// Expands wildcards against the columns of each relation as read from
	/// its header.
	fn output(&self, tables: &[Table]) -> Result<Output> {
		let items =
			self.statement.columns.iter().map(|item| SelectItem::parse(item)).collect::<Result<Vec<_>>>()?;

		if items.iter().any(|item| matches!(item, SelectItem::Count(_))) {
			return match items.as_slice() {
				[SelectItem::Count(column)] => Ok(Output::Count(column.clone())),
				_ => Err(Error::UnsupportedAggregate {
					reason: "COUNT cannot be combined with other select items".to_string(),
				}),
			};
		}

		let items = if items.is_empty() {
			vec![SelectItem::Wildcard]
		} else {
			items
		};

		let mut names = Vec::new();
		for item in items {
			match item {
				SelectItem::Wildcard => {
					for table in tables {
						names.extend(wildcard(table)?);
					}
				}
				SelectItem::QualifiedWildcard(qualifier) => {
					let table = self
						.statement
						.relations
						.iter()
						.zip(tables)
						.find(|(relation, _)| {
							relation.alias().eq_ignore_ascii_case(&qualifier)
								|| relation.path.eq_ignore_ascii_case(&qualifier)
						})
						.map(|(_, table)| table)
						.ok_or(Error::UnknownRelation {
							qualifier,
						})?;
					names.extend(wildcard(table)?);
				}
				SelectItem::Column(name) => names.push(name),
				SelectItem::Count(_) => {}
			}
		}
		Ok(Output::Columns(names))
	}
}

fn wildcard(table: &Table) -> Result<Vec<ColumnName>> {
	table.columns().iter().map(|column| ColumnName::new(column.primary().cased(), [table.name()])).collect()
}

/// Pins a column reference to the single relation it resolves on.
fn qualify(tables: &[Table], name: &ColumnName) -> Result<ColumnName> {
	let mut found = Vec::new();
	for table in tables {
		if let Some(position) = table.try_resolve(name)? {
			found.push((table, position));
		}
	}

	match found.as_slice() {
		[] => Err(Error::UnknownColumnName {
			name: name.qualified(),
		}),
		[(table, _)] => ColumnName::new(name.cased(), [table.name()]),
		_ => Err(Error::AmbiguousColumnName {
			name: name.qualified(),
			candidates: found
				.iter()
				.map(|(table, position)| format!("{}: {}", table.name(), table.columns()[*position].describe()))
				.collect(),
		}),
	}
}
