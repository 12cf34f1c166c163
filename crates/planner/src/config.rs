// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::sync::Arc;

use crate::plan::{PriorityPolicy, UniformPriority};

/// Compilation settings shared by every relation of a query.
#[derive(Debug, Clone)]
pub struct Config {
	pub delimiter: char,
	/// Emit an `echo` of the output column names before the plan.
	pub header: bool,
	/// Seed for `TABLESAMPLE`; `$RANDOM` when absent.
	pub seed: Option<u64>,
	pub priority: Arc<dyn PriorityPolicy>,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			delimiter: ',',
			header: true,
			seed: None,
			priority: Arc::new(UniformPriority),
		}
	}
}

impl Config {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_delimiter(mut self, delimiter: char) -> Self {
		self.delimiter = delimiter;
		self
	}

	pub fn with_header(mut self, header: bool) -> Self {
		self.header = header;
		self
	}

	pub fn with_seed(mut self, seed: Option<u64>) -> Self {
		self.seed = seed;
		self
	}

	pub fn with_priority(mut self, priority: impl PriorityPolicy + 'static) -> Self {
		self.priority = Arc::new(priority);
		self
	}
}
