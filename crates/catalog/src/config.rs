//! Catalog configuration.
//!
//! Configuration is written in TOML. Every section and key is optional; missing
//! keys fall back to the defaults below.
//!
//! ```toml
//! [stack]
//! top = ["user", "override", "definition"]
//! bottom = ["computed", "defaults"]
//!
//! [load]
//! raise_failures = true
//!
//! [events]
//! capacity = 64
//!
//! [persist]
//! strata = ["definition", "user"]
//! ```
//!
//! # Layering
//!
//! [`load_layered`] reads `geocat.toml` from a directory, then an explicit
//! file. Later layers override earlier ones key by key, so a layer that only
//! sets `[load] raise_failures` keeps the stack order of the layer below it.
//! Unreadable or malformed layers are skipped and reported per file.

use std::path::{Path, PathBuf};

use geocat_traits::{StackOrder, names};
use serde::Deserialize;

use crate::error::ConfigError;


/// File name looked up in configuration directories.
pub const CONFIG_FILE: &str = "geocat.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogConfig {
	pub stack: StackConfig,
	pub load: LoadConfig,
	pub events: EventsConfig,
	pub persist: PersistConfig,
}

/// Fixed band membership of stratum names.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StackConfig {
	/// Names that outrank every other stratum, highest first.
	pub top: Vec<String>,
	/// Names that rank below every other stratum, highest first.
	pub bottom: Vec<String>,
}

impl Default for StackConfig {
	fn default() -> Self {
		let order = StackOrder::default();
		Self {
			top: order.top().iter().map(|n| n.to_string()).collect(),
			bottom: order.bottom().iter().map(|n| n.to_string()).collect(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoadConfig {
	/// Route load failures to the error sink in addition to returning them.
	pub raise_failures: bool,
}

impl Default for LoadConfig {
	fn default() -> Self {
		Self { raise_failures: true }
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EventsConfig {
	/// Buffered events per model before slow subscribers start lagging.
	pub capacity: usize,
}

impl Default for EventsConfig {
	fn default() -> Self {
		Self { capacity: 64 }
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PersistConfig {
	/// Strata flattened into persisted definitions.
	pub strata: Vec<String>,
}

impl Default for PersistConfig {
	fn default() -> Self {
		Self {
			strata: vec![names::DEFINITION.to_string(), names::USER.to_string()],
		}
	}
}

impl CatalogConfig {
	/// Parses a TOML string, filling missing keys with defaults.
	pub fn parse(input: &str) -> Result<Self, ConfigError> {
		Ok(toml::from_str(input)?)
	}

	/// Loads configuration from a single file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let content = read(path)?;
		Self::parse(&content)
	}

	/// Builds the stack order declared by `[stack]`.
	pub fn stack_order(&self) -> StackOrder {
		StackOrder::new(self.stack.top.iter().map(String::as_str), self.stack.bottom.iter().map(String::as_str))
	}

	/// Event channel capacity, never zero.
	pub fn event_capacity(&self) -> usize {
		self.events.capacity.max(1)
	}
}

/// Aggregate result of loading configuration layers.
#[derive(Debug, Default)]
pub struct ConfigLoadReport {
	/// Merged configuration; defaults if no layer loaded.
	pub config: CatalogConfig,
	/// Files that were merged, lowest precedence first.
	pub sources: Vec<PathBuf>,
	/// File read or parse errors keyed by source file path.
	pub errors: Vec<(PathBuf, String)>,
}

/// Loads and merges `<config_dir>/geocat.toml` and then `explicit`.
///
/// A missing file in `config_dir` is not an error; a missing explicit file is.
pub fn load_layered(config_dir: Option<&Path>, explicit: Option<&Path>) -> ConfigLoadReport {
	let mut report = ConfigLoadReport::default();
	let mut merged = toml::Table::new();

	if let Some(dir) = config_dir {
		let path = dir.join(CONFIG_FILE);
		if path.exists() {
			load_layer(&mut report, &mut merged, &path);
		}
	}
	if let Some(path) = explicit {
		load_layer(&mut report, &mut merged, path);
	}

	match toml::Value::Table(merged).try_into::<CatalogConfig>() {
		Ok(config) => report.config = config,
		Err(error) => {
			tracing::warn!(domain = "config", error = %error, "merged configuration rejected; using defaults");
			report.errors.push((report.sources.last().cloned().unwrap_or_default(), error.to_string()));
		}
	}
	report
}

fn load_layer(report: &mut ConfigLoadReport, merged: &mut toml::Table, path: &Path) {
	let layer = read(path).and_then(|content| {
		let table = toml::from_str::<toml::Table>(&content)?;
		// Reject the whole layer if its keys do not fit the config shape.
		toml::Value::Table(table.clone()).try_into::<CatalogConfig>()?;
		Ok(table)
	});
	match layer {
		Ok(table) => {
			merge_tables(merged, table);
			report.sources.push(path.to_path_buf());
		}
		Err(error) => {
			tracing::warn!(domain = "config", path = %path.display(), error = %error, "skipping configuration layer");
			report.errors.push((path.to_path_buf(), error.to_string()));
		}
	}
}

/// Overlays `layer` onto `base`; nested tables merge, other values replace.
fn merge_tables(base: &mut toml::Table, layer: toml::Table) {
	for (key, value) in layer {
		if let toml::Value::Table(incoming) = value {
			if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
				merge_tables(existing, incoming);
				continue;
			}
			base.insert(key, toml::Value::Table(incoming));
		} else {
			base.insert(key, value);
		}
	}
}

fn read(path: &Path) -> Result<String, ConfigError> {
	std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
		path: path.to_path_buf(),
		error,
	})
}
