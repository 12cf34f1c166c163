// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	fs::File,
	io,
	io::{BufRead, BufReader},
};

use indexmap::IndexMap;
use tracing::instrument;

use crate::{Error, Result};

/// Resolves a relation path to the field names of its header line.
pub trait Catalog {
	fn columns(&self, path: &str, delimiter: char) -> Result<Vec<String>>;
}

/// Reads the first line of the file at the relation path.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileCatalog;

impl Catalog for FileCatalog {
	#[instrument(name = "catalog::file::columns", level = "trace", skip(self))]
	fn columns(&self, path: &str, delimiter: char) -> Result<Vec<String>> {
		let read = || -> io::Result<String> {
			let mut header = String::new();
			BufReader::new(File::open(path)?).read_line(&mut header)?;
			Ok(header)
		};

		let header = read().map_err(|source| Error::Catalog {
			path: path.to_string(),
			source,
		})?;

		Ok(header.trim_end_matches(['\n', '\r']).split(delimiter).map(str::to_string).collect())
	}
}

/// Relation headers known up front, keyed by path.
#[derive(Debug, Default, Clone)]
pub struct MemoryCatalog {
	relations: IndexMap<String, Vec<String>>,
}

impl MemoryCatalog {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_relation<I, S>(mut self, path: impl Into<String>, columns: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.insert(path, columns);
		self
	}

	pub fn insert<I, S>(&mut self, path: impl Into<String>, columns: I)
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.relations.insert(path.into(), columns.into_iter().map(Into::into).collect());
	}
}

impl Catalog for MemoryCatalog {
	fn columns(&self, path: &str, _delimiter: char) -> Result<Vec<String>> {
		self.relations.get(path).cloned().ok_or_else(|| Error::Catalog {
			path: path.to_string(),
			source: io::Error::new(io::ErrorKind::NotFound, "relation is not registered"),
		})
	}
}

#[cfg(test)]
mod tests {
	use std::path::PathBuf;

	use super::*;

	fn fixture(name: &str) -> String {
		let path: PathBuf = [env!("CARGO_MANIFEST_DIR"), "tests", "data", name].iter().collect();
		path.to_string_lossy().into_owned()
	}

	#[test]
	fn test_file_catalog_reads_header() {
		let columns = FileCatalog.columns(&fixture("table_a.txt"), ',').unwrap();
		assert_eq!(columns, vec!["col_a", "col_b"]);
	}

	#[test]
	fn test_file_catalog_missing_file() {
		let err = FileCatalog.columns(&fixture("missing.txt"), ',').unwrap_err();
		assert!(matches!(err, Error::Catalog { .. }));
		assert_eq!(err.diagnostic().code, "CATALOG_001");
	}

	#[test]
	fn test_memory_catalog() {
		let catalog = MemoryCatalog::new().with_relation("a.csv", ["col_a", "col_b"]);
		assert_eq!(catalog.columns("a.csv", ',').unwrap(), vec!["col_a", "col_b"]);
		assert!(matches!(catalog.columns("b.csv", ','), Err(Error::Catalog { .. })));
	}
}
