//! Catalog files on disk.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use geocat_catalog::{Model, ModelRegistry, persist};
use geocat_traits::{Value, names};

/// Key wrapping the definition list in object-form catalog files.
pub const CATALOG_KEY: &str = "catalog";

/// Reads the definition list from `path`.
pub fn read_entries(path: &Path) -> Result<Vec<Value>> {
	let content = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
	let document: Value = serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
	entries(document)
}

fn entries(document: Value) -> Result<Vec<Value>> {
	match document {
		Value::Array(items) => Ok(items),
		Value::Object(mut fields) => match fields.remove(CATALOG_KEY) {
			Some(Value::Array(items)) => Ok(items),
			Some(_) => bail!("'{CATALOG_KEY}' must be an array of definitions"),
			None => bail!("catalog object has no '{CATALOG_KEY}' array"),
		},
		_ => bail!("catalog must be an array or an object with a '{CATALOG_KEY}' array"),
	}
}

/// Outcome of registering one catalog file.
#[derive(Debug, Default)]
pub struct Registered {
	pub models: Vec<Arc<Model>>,
	/// Rejected entries as `(index, reason)`.
	pub rejected: Vec<(usize, String)>,
	pub warnings: usize,
}

/// Registers every entry as a model with its values in the definition stratum.
pub fn register(registry: &ModelRegistry, entries: &[Value]) -> Registered {
	let mut out = Registered::default();
	for (index, entry) in entries.iter().enumerate() {
		match persist::from_json(registry, entry, names::DEFINITION) {
			Ok((model, diagnostics)) => {
				for warning in &diagnostics {
					tracing::warn!(model = model.key(), warning = %warning, "dropped invalid property");
				}
				out.warnings += diagnostics.len();
				out.models.push(model);
			}
			Err(error) => {
				tracing::error!(index, error = %error, "definition rejected");
				out.rejected.push((index, error.to_string()));
			}
		}
	}
	out
}

#[cfg(test)]
mod tests {
	use geocat_catalog::builtins;
	use pretty_assertions::assert_eq;
	use serde_json::json;

	use super::*;

	#[test]
	fn accepts_both_catalog_shapes() {
		assert_eq!(entries(json!([{ "id": "a" }])).unwrap().len(), 1);
		assert_eq!(entries(json!({ "catalog": [{ "id": "a" }, { "id": "b" }] })).unwrap().len(), 2);
		assert!(entries(json!({ "layers": [] })).is_err());
		assert!(entries(json!({ "catalog": {} })).is_err());
		assert!(entries(json!("roads")).is_err());
	}

	#[test]
	fn reads_entries_from_disk() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("catalog.json");
		std::fs::write(&path, r#"{ "catalog": [{ "type": "group", "id": "g" }] }"#).unwrap();
		assert_eq!(read_entries(&path).unwrap(), [json!({ "type": "group", "id": "g" })]);
		assert!(read_entries(&dir.path().join("missing.json")).is_err());
	}

	#[test]
	fn rejected_entries_do_not_stop_the_rest() {
		let registry = ModelRegistry::default();
		builtins::register(&registry, None).unwrap();
		let entries = [
			json!({ "type": builtins::GROUP, "id": "g", "isOpen": "yes" }),
			json!({ "type": "wms", "id": "w" }),
			json!({ "type": builtins::JSON_LAYER, "id": "roads", "url": "roads.json" }),
		];

		let registered = register(&registry, &entries);
		assert_eq!(registered.models.iter().map(|m| m.key().to_string()).collect::<Vec<_>>(), ["g", "roads"]);
		assert_eq!(registered.rejected.len(), 1);
		assert_eq!(registered.rejected[0].0, 1);
		assert_eq!(registered.warnings, 1);
	}
}
