// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! A virtual relation.
//!
//! A [`Table`] never touches row data. Every operation appends a pipeline
//! step and updates the column list and sortedness metadata the step
//! implies; [`Table::render`] turns the accumulated steps into a shell
//! pipeline.

use std::fmt::Write;

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, instrument, trace};

use crate::{
	Error, Result,
	catalog::Catalog,
	column::{Column, ColumnName},
	condition::Condition,
	join::MergeJoin,
};

/// Where the rows of a table come from.
#[derive(Debug, Clone)]
pub enum Source {
	/// A file whose first `offset` lines are the header.
	File {
		path: String,
		offset: usize,
	},
	Command(String),
	Join(Box<MergeJoin>),
}

impl Source {
	fn render(&self) -> String {
		match self {
			Source::File {
				path,
				offset,
			} => format!("tail -n+{} {}", offset + 1, shell_word(path)),
			Source::Command(command) => command.clone(),
			Source::Join(join) => join.render(),
		}
	}
}

/// A pipeline step. Positions are 0-based and rendered 1-based.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
	Project {
		positions: Vec<usize>,
	},
	Filter {
		condition: String,
		positions: Vec<usize>,
	},
	Sort {
		positions: Vec<usize>,
	},
	Sample {
		size: usize,
		seed: Option<u64>,
	},
	Count {
		position: Option<usize>,
	},
}

impl Operation {
	pub fn render(&self, delimiter: char) -> String {
		match self {
			Operation::Project {
				positions,
			} => {
				format!("awk -F'{d}' 'OFS=\"{d}\" {{ print {} }}'", fields(positions), d = delimiter)
			}
			Operation::Filter {
				condition,
				positions,
			} => format!(
				"awk -F'{d}' 'OFS=\"{d}\" {{ if ({condition}) {{ print {} }} }}'",
				fields(positions),
				d = delimiter
			),
			Operation::Sort {
				positions,
			} => {
				let mut result = format!("sort -t{}", shell_delimiter(delimiter));
				for position in positions {
					let _ = write!(result, " -k {0},{0}", position + 1);
				}
				result
			}
			Operation::Sample {
				size,
				seed,
			} => {
				let seed = seed.map(|s| s.to_string()).unwrap_or_else(|| "$RANDOM".to_string());
				format!(
					"awk -v seed={seed} -v n={size} 'BEGIN {{ srand(seed) }} \
					NR <= n {{ reservoir[NR] = $0 }} \
					NR > n {{ M = int(rand() * NR) + 1; if (M <= n) {{ reservoir[M] = $0 }} }} \
					END {{ for (i = 1; i <= n && i <= NR; i++) {{ print reservoir[i] }} }}'"
				)
			}
			Operation::Count {
				position: None,
			} => "awk 'END { print NR }'".to_string(),
			Operation::Count {
				position: Some(position),
			} => format!("awk -F'{delimiter}' '${} != \"\" {{ n++ }} END {{ print n + 0 }}'", position + 1),
		}
	}
}

fn fields(positions: &[usize]) -> String {
	positions.iter().map(|p| format!("${}", p + 1)).collect::<Vec<_>>().join(",")
}

/// The delimiter as a `sort -t` / `join -t` argument, quoted unless the
/// shell would pass it through unchanged.
pub(crate) fn shell_delimiter(delimiter: char) -> String {
	if delimiter.is_ascii_alphanumeric() || ",.:_-+=@%/".contains(delimiter) {
		delimiter.to_string()
	} else if delimiter == '\'' {
		"\"'\"".to_string()
	} else {
		format!("'{delimiter}'")
	}
}

/// `word` as a single shell word. Paths made of shell-safe characters are
/// left as they are.
pub(crate) fn shell_word(word: &str) -> String {
	if !word.is_empty() && word.chars().all(|c| c.is_ascii_alphanumeric() || ",.:_-+=@%/".contains(c)) {
		word.to_string()
	} else {
		format!("'{}'", word.replace('\'', "'\\''"))
	}
}

#[derive(Debug, Clone)]
pub struct Table {
	name: String,
	delimiter: char,
	source: Source,
	columns: Vec<Column>,
	operations: Vec<Operation>,
	sorted_by: Vec<Column>,
}

impl Table {
	/// A table backed by a delimited file whose first line names its
	/// columns. Every column is qualified by both `path` and `alias`.
	#[instrument(name = "table::from_file_path", level = "debug", skip(catalog))]
	pub fn from_file_path(path: &str, alias: Option<&str>, delimiter: char, catalog: &dyn Catalog) -> Result<Self> {
		let alias = alias.unwrap_or(path);
		let fields = catalog.columns(path, delimiter)?;

		let mut seen = IndexSet::new();
		let mut columns = Vec::with_capacity(fields.len());
		for field in &fields {
			let column = Column::from_field(field, [path, alias])?;
			if !seen.insert(column.primary().name().to_string()) {
				return Err(Error::DuplicateColumnName {
					relation: path.to_string(),
					name: field.trim().to_string(),
				});
			}
			columns.push(column);
		}
		trace!(columns = ?fields, "parsed header");

		Ok(Self {
			name: alias.to_string(),
			delimiter,
			source: Source::File {
				path: path.to_string(),
				offset: 1,
			},
			columns,
			operations: Vec::new(),
			sorted_by: Vec::new(),
		})
	}

	/// A table whose rows are the output of `command`. Columns are
	/// qualified by `name`.
	pub fn from_command(name: &str, command: &str, fields: &[&str], delimiter: char) -> Result<Self> {
		let columns = fields.iter().map(|field| Column::from_field(field, [name])).collect::<Result<Vec<_>>>()?;
		Ok(Self {
			name: name.to_string(),
			delimiter,
			source: Source::Command(command.to_string()),
			columns,
			operations: Vec::new(),
			sorted_by: Vec::new(),
		})
	}

	pub(crate) fn from_join(name: &str, join: MergeJoin, columns: Vec<Column>, delimiter: char) -> Self {
		Self {
			name: name.to_string(),
			delimiter,
			source: Source::Join(Box::new(join)),
			columns,
			operations: Vec::new(),
			sorted_by: Vec::new(),
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn delimiter(&self) -> char {
		self.delimiter
	}

	pub fn source(&self) -> &Source {
		&self.source
	}

	pub fn columns(&self) -> &[Column] {
		&self.columns
	}

	pub fn operations(&self) -> &[Operation] {
		&self.operations
	}

	pub fn sorted_by(&self) -> &[Column] {
		&self.sorted_by
	}

	/// Every distinct column and the 0-based positions it occupies.
	pub fn column_positions(&self) -> IndexMap<Column, Vec<usize>> {
		let mut positions: IndexMap<Column, Vec<usize>> = IndexMap::new();
		for (position, column) in self.columns.iter().enumerate() {
			positions.entry(column.clone()).or_default().push(position);
		}
		positions
	}

	/// The position of the unique column `name` refers to, if any.
	pub fn try_resolve(&self, name: &ColumnName) -> Result<Option<usize>> {
		let positions = self.column_positions();
		let matched: Vec<(&Column, &Vec<usize>)> =
			positions.iter().filter(|(column, _)| column.matches(name)).collect();

		match matched.as_slice() {
			[] => Ok(None),
			[(_, positions)] => Ok(Some(positions[0])),
			_ => Err(Error::AmbiguousColumnName {
				name: name.qualified(),
				candidates: matched.iter().map(|(column, _)| column.describe()).collect(),
			}),
		}
	}

	pub fn resolve(&self, name: &ColumnName) -> Result<usize> {
		self.try_resolve(name)?.ok_or_else(|| Error::UnknownColumnName {
			name: name.qualified(),
		})
	}

	/// Moves the columns named by `names` to the front, in that order. With
	/// `drop_others` every other column is removed.
	#[instrument(name = "table::reorder_columns", level = "debug", skip(self, names), fields(table = %self.name))]
	pub fn reorder_columns(&mut self, names: &[ColumnName], drop_others: bool) -> Result<()> {
		let requested = names.iter().map(|name| self.resolve(name)).collect::<Result<Vec<_>>>()?;

		let mut positions = requested.clone();
		if !drop_others {
			positions.extend((0..self.columns.len()).filter(|p| !requested.contains(p)));
		}

		let in_order = positions.iter().enumerate().all(|(i, p)| i == *p);
		if in_order && positions.len() == self.columns.len() {
			debug!("columns already in order");
			return Ok(());
		}

		let columns = positions.iter().map(|p| self.columns[*p].clone()).collect();
		self.project(positions, columns);
		Ok(())
	}

	/// Replaces the output alias of the leading columns, one per alias.
	pub fn alias_columns(&mut self, aliases: &[ColumnName]) {
		let positions: Vec<usize> = (0..self.columns.len()).collect();
		let columns: Vec<Column> = self
			.columns
			.iter()
			.enumerate()
			.map(|(i, column)| match aliases.get(i) {
				Some(alias) => column.clone().with_alias(alias.clone()),
				None => column.clone(),
			})
			.collect();
		self.remap_sorted_by(&positions, &columns);
		self.columns = columns;
	}

	/// Appends a projection onto `positions`, whose result columns are
	/// `columns`. Sortedness survives up to the first sort column dropped.
	pub(crate) fn project(&mut self, positions: Vec<usize>, columns: Vec<Column>) {
		self.remap_sorted_by(&positions, &columns);
		self.columns = columns;
		self.operations.push(Operation::Project {
			positions,
		});
	}

	fn remap_sorted_by(&mut self, positions: &[usize], columns: &[Column]) {
		let mut sorted_by = Vec::with_capacity(self.sorted_by.len());
		for sorted in &self.sorted_by {
			let Some(old) = self.columns.iter().position(|c| c == sorted) else {
				break;
			};
			let Some(new) = positions.iter().position(|p| *p == old) else {
				break;
			};
			sorted_by.push(columns[new].clone());
		}
		if sorted_by.len() < self.sorted_by.len() {
			trace!(kept = sorted_by.len(), "sort order truncated by projection");
		}
		self.sorted_by = sorted_by;
	}

	/// Sorts the rows by the columns named by `keys`.
	pub fn sort(&mut self, keys: &[ColumnName]) -> Result<()> {
		let positions = keys.iter().map(|key| self.resolve(key)).collect::<Result<Vec<_>>>()?;
		self.sort_positions(&positions);
		Ok(())
	}

	pub(crate) fn sort_positions(&mut self, positions: &[usize]) {
		let mut keys: Vec<usize> = Vec::with_capacity(positions.len());
		for position in positions {
			if !keys.contains(position) {
				keys.push(*position);
			}
		}

		let columns: Vec<Column> = keys.iter().map(|p| self.columns[*p].clone()).collect();
		if self.sorted_by.len() >= columns.len() && self.sorted_by[..columns.len()] == columns[..] {
			debug!(table = %self.name, "already sorted");
			return;
		}

		debug!(table = %self.name, keys = ?keys, "sorting");
		self.operations.push(Operation::Sort {
			positions: keys,
		});
		self.sorted_by = columns;
	}

	/// True if the rows are ordered by the columns at `positions`, in that
	/// order.
	pub fn is_sorted_by(&self, positions: &[usize]) -> bool {
		self.sorted_by.len() >= positions.len()
			&& positions.iter().enumerate().all(|(i, p)| self.columns.get(*p) == Some(&self.sorted_by[i]))
	}

	/// Keeps the rows satisfying every conjunct.
	#[instrument(name = "table::filter_rows", level = "debug", skip_all, fields(table = %self.name))]
	pub fn filter_rows(&mut self, conjuncts: &[Condition]) -> Result<()> {
		if conjuncts.is_empty() {
			debug!("no conditions");
			return Ok(());
		}

		let rendered = conjuncts
			.iter()
			.map(|conjunct| conjunct.to_awk(&mut |name: &ColumnName| self.resolve(name).map(|p| p + 1)))
			.collect::<Result<Vec<_>>>()?;

		self.filter(rendered.join(" && "));
		Ok(())
	}

	/// Appends a filter on an already rendered awk condition.
	pub(crate) fn filter(&mut self, condition: String) {
		self.operations.push(Operation::Filter {
			condition,
			positions: (0..self.columns.len()).collect(),
		});
	}

	/// Keeps a uniform random sample of at most `size` rows.
	pub fn sample_rows(&mut self, size: usize, seed: Option<u64>) {
		self.operations.push(Operation::Sample {
			size,
			seed,
		});
		self.sorted_by.clear();
	}

	/// Replaces the rows with their count, or with the number of rows whose
	/// `column` is non-empty.
	pub fn count_rows(&mut self, column: Option<&ColumnName>) -> Result<()> {
		let position = column.map(|name| self.resolve(name)).transpose()?;
		self.operations.push(Operation::Count {
			position,
		});
		self.columns = vec![Column::new(ColumnName::new("count", [self.name.as_str()])?)];
		self.sorted_by.clear();
		Ok(())
	}

	/// The shell pipeline producing this table's rows, optionally preceded
	/// by an `echo` of the column aliases.
	pub fn render(&self, include_header: bool) -> String {
		let mut result = String::new();
		if include_header {
			let header =
				self.columns.iter().map(|c| c.alias().cased()).collect::<Vec<_>>().join(&self.delimiter.to_string());
			let _ = write!(result, "echo \"{header}\"; ");
		}

		result.push_str(&self.source.render());
		for operation in &self.operations {
			result.push_str(" | ");
			result.push_str(&operation.render(self.delimiter));
		}
		result
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{ast::ConditionToken, catalog::MemoryCatalog};

	fn name(text: &str) -> ColumnName {
		ColumnName::parse(text).unwrap()
	}

	fn table_a() -> Table {
		let catalog = MemoryCatalog::new().with_relation("table_a.txt", ["col_a", "col_b"]);
		Table::from_file_path("table_a.txt", None, ',', &catalog).unwrap()
	}

	fn conjuncts(tokens: &[ConditionToken]) -> Vec<Condition> {
		Condition::from_tokens(tokens).unwrap().unwrap().to_cnf().into_conjuncts().unwrap()
	}

	#[test]
	fn test_from_file_path() {
		let table = table_a();
		assert_eq!(table.render(false), "tail -n+2 table_a.txt");
		assert_eq!(table.render(true), "echo \"col_a,col_b\"; tail -n+2 table_a.txt");
		assert!(table.sorted_by().is_empty());
		assert_eq!(table.resolve(&name("table_a.txt.col_b")).unwrap(), 1);
	}

	#[test]
	fn test_path_quoting() {
		assert_eq!(shell_word("data/a-1.csv"), "data/a-1.csv");
		assert_eq!(shell_word("my dir/a.txt"), "'my dir/a.txt'");
		assert_eq!(shell_word("it's.txt"), "'it'\\''s.txt'");
		assert_eq!(shell_word("$HOME/a.txt"), "'$HOME/a.txt'");

		let catalog = MemoryCatalog::new().with_relation("my dir/a.txt", ["col_a"]);
		let table = Table::from_file_path("my dir/a.txt", Some("t"), ',', &catalog).unwrap();
		assert_eq!(table.render(false), "tail -n+2 'my dir/a.txt'");
	}

	#[test]
	fn test_alias_qualifies_columns() {
		let catalog = MemoryCatalog::new().with_relation("data/a.csv", ["col_a"]);
		let table = Table::from_file_path("data/a.csv", Some("ta"), ',', &catalog).unwrap();
		assert_eq!(table.name(), "ta");
		assert_eq!(table.resolve(&name("ta.col_a")).unwrap(), 0);
		assert_eq!(table.resolve(&name("data/a.csv.col_a")).unwrap(), 0);
		assert!(matches!(table.resolve(&name("tb.col_a")), Err(Error::UnknownColumnName { .. })));
	}

	#[test]
	fn test_duplicate_header_fields() {
		let catalog = MemoryCatalog::new().with_relation("dup.txt", ["col_a", "COL_A"]);
		assert!(matches!(
			Table::from_file_path("dup.txt", None, ',', &catalog),
			Err(Error::DuplicateColumnName { .. })
		));
	}

	#[test]
	fn test_from_command() {
		let table = Table::from_command("expected", "echo -e \"1\\n3\\n2\"", &["col_b"], ',').unwrap();
		assert_eq!(table.render(true), "echo \"col_b\"; echo -e \"1\\n3\\n2\"");
		assert_eq!(table.resolve(&name("expected.col_b")).unwrap(), 0);
	}

	#[test]
	fn test_reorder_columns() {
		let mut table = table_a();
		table.reorder_columns(&[name("col_b"), name("col_a")], false).unwrap();
		assert_eq!(table.render(true), "echo \"col_b,col_a\"; tail -n+2 table_a.txt | awk -F',' 'OFS=\",\" { print $2,$1 }'");
	}

	#[test]
	fn test_reorder_columns_is_idempotent() {
		let mut table = table_a();
		table.reorder_columns(&[name("col_b")], false).unwrap();
		table.reorder_columns(&[name("col_b")], false).unwrap();
		assert_eq!(table.operations().len(), 1);

		let mut table = table_a();
		table.reorder_columns(&[name("col_a")], false).unwrap();
		table.reorder_columns(&[name("col_a"), name("col_b")], true).unwrap();
		assert!(table.operations().is_empty());
	}

	#[test]
	fn test_reorder_drops_columns() {
		let mut table = table_a();
		table.reorder_columns(&[name("col_a")], true).unwrap();
		assert_eq!(table.columns().len(), 1);
		assert_eq!(table.render(false), "tail -n+2 table_a.txt | awk -F',' 'OFS=\",\" { print $1 }'");
	}

	#[test]
	fn test_reorder_duplicates_column() {
		let mut table = table_a();
		table.reorder_columns(&[name("col_a"), name("col_a")], true).unwrap();
		assert_eq!(table.render(true), "echo \"col_a,col_a\"; tail -n+2 table_a.txt | awk -F',' 'OFS=\",\" { print $1,$1 }'");
		assert_eq!(table.column_positions().values().next().unwrap(), &vec![0, 1]);
		assert_eq!(table.resolve(&name("col_a")).unwrap(), 0);
	}

	#[test]
	fn test_sort() {
		let mut table = table_a();
		table.sort(&[name("col_b"), name("col_a")]).unwrap();
		assert_eq!(table.render(false), "tail -n+2 table_a.txt | sort -t, -k 2,2 -k 1,1");
		assert!(table.is_sorted_by(&[1]));
		assert!(table.is_sorted_by(&[1, 0]));
		assert!(!table.is_sorted_by(&[0]));
		assert!(!table.is_sorted_by(&[1, 0, 1]));
	}

	#[test]
	fn test_sort_is_idempotent() {
		let mut table = table_a();
		table.sort(&[name("col_a")]).unwrap();
		table.sort(&[name("col_a")]).unwrap();
		assert_eq!(table.operations().len(), 1);

		// a prefix of the existing order is already satisfied
		let mut table = table_a();
		table.sort(&[name("col_a"), name("col_b")]).unwrap();
		table.sort(&[name("col_a"), name("col_a")]).unwrap();
		assert_eq!(table.operations().len(), 1);
	}

	#[test]
	fn test_sort_survives_projection_prefix() {
		let mut table = table_a();
		table.sort(&[name("col_a"), name("col_b")]).unwrap();
		table.reorder_columns(&[name("col_a")], true).unwrap();
		assert_eq!(table.sorted_by().len(), 1);
		assert!(table.is_sorted_by(&[0]));

		let mut table = table_a();
		table.sort(&[name("col_b")]).unwrap();
		table.reorder_columns(&[name("col_a")], true).unwrap();
		assert!(table.sorted_by().is_empty());
	}

	#[test]
	fn test_filter_rows() {
		let mut table = table_a();
		let conditions = conjuncts(&[
			ConditionToken::atom("col_b", "=", "1"),
			ConditionToken::Or,
			ConditionToken::atom("col_a", "=", "2"),
		]);
		table.filter_rows(&conditions).unwrap();
		assert_eq!(
			table.render(false),
			"tail -n+2 table_a.txt | awk -F',' 'OFS=\",\" { if (($2 == 1 || $1 == 2)) { print $1,$2 } }'"
		);
	}

	#[test]
	fn test_filter_rows_conjunction_and_strings() {
		let mut table = table_a();
		let conditions = conjuncts(&[
			ConditionToken::atom("col_b", ">", "2"),
			ConditionToken::And,
			ConditionToken::atom("col_a", "!=", "'x'"),
		]);
		table.filter_rows(&conditions).unwrap();
		assert_eq!(
			table.render(false),
			"tail -n+2 table_a.txt | awk -F',' 'OFS=\",\" { if ($2 > 2 && $1 != \"x\") { print $1,$2 } }'"
		);
	}

	#[test]
	fn test_filter_rows_empty_is_noop() {
		let mut table = table_a();
		table.filter_rows(&[]).unwrap();
		assert!(table.operations().is_empty());
	}

	#[test]
	fn test_filter_keeps_sort_order() {
		let mut table = table_a();
		table.sort(&[name("col_a")]).unwrap();
		table.filter_rows(&conjuncts(&[ConditionToken::atom("col_b", "<", "3")])).unwrap();
		assert!(table.is_sorted_by(&[0]));
	}

	#[test]
	fn test_sample_rows() {
		let mut table = table_a();
		table.sort(&[name("col_a")]).unwrap();
		table.sample_rows(2, Some(7));
		assert!(table.sorted_by().is_empty());
		assert_eq!(
			table.operations().last().unwrap().render(','),
			"awk -v seed=7 -v n=2 'BEGIN { srand(seed) } NR <= n { reservoir[NR] = $0 } NR > n { M = int(rand() * NR) + 1; if (M <= n) { reservoir[M] = $0 } } END { for (i = 1; i <= n && i <= NR; i++) { print reservoir[i] } }'"
		);

		let mut table = table_a();
		table.sample_rows(5, None);
		assert!(table.render(false).contains("awk -v seed=$RANDOM -v n=5 "));
	}

	#[test]
	fn test_count_rows() {
		let mut table = table_a();
		table.count_rows(None).unwrap();
		assert_eq!(table.render(true), "echo \"count\"; tail -n+2 table_a.txt | awk 'END { print NR }'");

		let mut table = table_a();
		table.count_rows(Some(&name("col_b"))).unwrap();
		assert_eq!(table.render(false), "tail -n+2 table_a.txt | awk -F',' '$2 != \"\" { n++ } END { print n + 0 }'");
	}

	#[test]
	fn test_alias_columns() {
		let mut table = table_a();
		table.alias_columns(&[name("A")]);
		assert_eq!(table.render(true), "echo \"A,col_b\"; tail -n+2 table_a.txt");
	}

	#[test]
	fn test_delimiter_quoting() {
		let catalog = MemoryCatalog::new().with_relation("t.psv", ["col_a", "col_b"]);
		let mut table = Table::from_file_path("t.psv", None, '|', &catalog).unwrap();
		table.sort(&[name("col_b")]).unwrap();
		assert_eq!(table.render(true), "echo \"col_a|col_b\"; tail -n+2 t.psv | sort -t'|' -k 2,2");
	}

	#[test]
	fn test_render_is_repeatable() {
		let mut table = table_a();
		table.sort(&[name("col_b")]).unwrap();
		assert_eq!(table.render(true), table.render(true));
	}
}
