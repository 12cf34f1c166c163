// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	fs,
	io::{self, Read},
	path::PathBuf,
	process::{self, ExitCode},
};

use clap::Parser;
use sqltxt_planner::{Config, Diagnostic, FileCatalog, SelectStatement};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sqltxt")]
#[command(version)]
#[command(about = "Compile SQL SELECT statements over delimited text files into shell pipelines")]
#[command(long_about = "Compile SQL SELECT statements over delimited text files into shell pipelines.

The first line of every file is its header. Relations are file paths, resolved
relative to the working directory, and may be aliased:

  sqltxt 'select ta.col_a, col_z from a.csv ta join b.csv on ta.col_a = b.csv.col_a'

Without --execute the pipeline is printed; pipe it into bash or pass -e.")]
struct Args {
	/// SQL statement (read from stdin when omitted)
	#[arg(value_name = "SQL")]
	sql: Option<String>,

	/// Run the pipeline with bash and print its output
	#[arg(short, long)]
	execute: bool,

	/// Read a JSON-encoded statement instead of SQL text
	#[arg(long, value_name = "FILE", conflicts_with = "sql")]
	ast: Option<PathBuf>,

	/// Field delimiter of the input files (`\t` for tab)
	#[arg(short, long, default_value = ",", value_parser = parse_delimiter)]
	delimiter: char,

	/// Omit the header line from the output
	#[arg(long)]
	no_header: bool,

	/// Seed for TABLESAMPLE, a fresh $RANDOM seed is drawn otherwise
	#[arg(long, value_name = "N")]
	seed: Option<u64>,

	/// Log planner decisions to stderr (overrides SQLTXT_LOG)
	#[arg(long)]
	debug: bool,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
	#[error(transparent)]
	Sql(#[from] sqltxt_sql::Error),
	#[error("failed to read {what}: {source}")]
	Read {
		what: String,
		#[source]
		source: io::Error,
	},
	#[error("invalid statement in '{path}': {source}")]
	Ast {
		path: String,
		#[source]
		source: serde_json::Error,
	},
	#[error("failed to start bash: {0}")]
	Spawn(#[source] io::Error),
}

impl CliError {
	fn diagnostic(&self) -> Diagnostic {
		let (code, help) = match self {
			CliError::Sql(err) => return err.diagnostic(),
			CliError::Read {
				..
			} => ("CLI_001", "check the path and its permissions"),
			CliError::Ast {
				..
			} => ("CLI_002", "the file must hold a JSON object with 'columns' and 'relations'"),
			CliError::Spawn(_) => ("CLI_003", "--execute needs bash on the PATH"),
		};
		Diagnostic {
			code: code.to_string(),
			message: self.to_string(),
			help: Some(help.to_string()),
		}
	}
}

fn parse_delimiter(text: &str) -> Result<char, String> {
	match text {
		"\\t" | "tab" => Ok('\t'),
		_ => {
			let mut chars = text.chars();
			match (chars.next(), chars.next()) {
				(Some(c), None) if !matches!(c, '\n' | '\'' | '"' | '\\') => Ok(c),
				_ => Err(format!("'{text}' is not a usable delimiter")),
			}
		}
	}
}

fn init_logging(debug: bool) {
	let filter = if debug {
		EnvFilter::new("debug")
	} else {
		EnvFilter::try_from_env("SQLTXT_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
	};
	let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).try_init();
}

fn read_statement(args: &Args) -> Result<SelectStatement, CliError> {
	if let Some(path) = &args.ast {
		let text = fs::read_to_string(path).map_err(|source| CliError::Read {
			what: path.display().to_string(),
			source,
		})?;
		return serde_json::from_str(&text).map_err(|source| CliError::Ast {
			path: path.display().to_string(),
			source,
		});
	}

	let sql = match &args.sql {
		Some(sql) => sql.clone(),
		None => {
			let mut sql = String::new();
			io::stdin().read_to_string(&mut sql).map_err(|source| CliError::Read {
				what: "stdin".to_string(),
				source,
			})?;
			sql
		}
	};
	Ok(sqltxt_sql::parse(&sql)?)
}

fn run(args: Args) -> Result<ExitCode, CliError> {
	let statement = read_statement(&args)?;
	debug!(?statement, "parsed");

	let config = Config::new().with_delimiter(args.delimiter).with_header(!args.no_header).with_seed(args.seed);
	let catalog = FileCatalog;
	let pipeline = sqltxt_planner::compile(statement, config, &catalog).map_err(sqltxt_sql::Error::from)?;

	if !args.execute {
		println!("{pipeline}");
		return Ok(ExitCode::SUCCESS);
	}

	info!(%pipeline, "executing");
	let status = process::Command::new("bash").arg("-c").arg(&pipeline).status().map_err(CliError::Spawn)?;
	match status.code() {
		Some(0) => Ok(ExitCode::SUCCESS),
		Some(code) => Ok(ExitCode::from(u8::try_from(code).unwrap_or(1))),
		None => Ok(ExitCode::FAILURE),
	}
}

fn main() -> ExitCode {
	let args = Args::parse();
	init_logging(args.debug);

	match run(args) {
		Ok(code) => code,
		Err(err) => {
			eprintln!("{}", err.diagnostic());
			ExitCode::FAILURE
		}
	}
}
