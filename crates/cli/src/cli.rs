use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "geocat")]
#[command(about = "Resolve and validate layered catalog definitions")]
#[command(version)]
/// Command-line arguments.
pub struct Cli {
	/// Configuration file layered over `geocat.toml` next to the catalog
	#[arg(long, short = 'c', global = true, value_name = "PATH")]
	pub config: Option<PathBuf>,

	/// Verbose logging
	#[arg(long, short = 'v', global = true)]
	pub verbose: bool,

	#[command(subcommand)]
	pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
	/// Print the resolved traits of every model in a catalog file
	Resolve {
		/// Catalog JSON: an array of definitions or `{ "catalog": [...] }`
		file: PathBuf,

		/// Fetch loadable strata before resolving
		#[arg(long)]
		load: bool,

		/// Only print the model with this catalog id
		#[arg(long, value_name = "ID")]
		id: Option<String>,
	},
	/// Check every definition in a catalog file against its model type
	Validate {
		/// Catalog JSON file
		file: PathBuf,
	},
	/// Flatten persisted strata back into definitions
	Save {
		/// Catalog JSON file
		file: PathBuf,

		/// Fetch loadable strata first; loaded values are never written
		#[arg(long)]
		load: bool,
	},
	/// List the built-in model types and their traits
	Types,
}
