//! Built-in model types.
//!
//! | Type | Capabilities | Loaded strata | Derived strata |
//! |---|---|---|---|
//! | `json-layer` | url, mappable | `metadata` from the JSON file at `url`, object at `/metadata` | `computed`: `name` from the `url` file stem |
//! | `group` | group | - | - |

use std::path::Path;
use std::sync::Arc;

use geocat_traits::{Derivation, ModelId, ResolveCtx, SchemaError, StratumError, TraitDef, Value, names};

use crate::capability::Capability;
use crate::load::FileLoader;
use crate::model::ModelType;
use crate::registry::ModelRegistry;

pub const JSON_LAYER: &str = "json-layer";
pub const GROUP: &str = "group";

/// Name of the stratum the `json-layer` loader installs.
pub const METADATA: &str = "metadata";

/// Registers the built-in types, resolving relative file inputs against `base_dir`.
pub fn register(registry: &ModelRegistry, base_dir: Option<&Path>) -> Result<(), SchemaError> {
	let order = registry.config().stack_order();

	let mut loader = FileLoader::new(METADATA, "url").pointer("/metadata");
	if let Some(dir) = base_dir {
		loader = loader.base_dir(dir);
	}
	registry.register_type(
		ModelType::builder(JSON_LAYER)
			.capability(Capability::Url)
			.capability(Capability::Mappable)
			.with_trait(TraitDef::string("attribution").nullable())
			.order(order.clone())
			.loader(Arc::new(loader))
			.derived(names::COMPUTED, Arc::new(NameFromUrl))
			.build()?,
	);

	registry.register_type(ModelType::builder(GROUP).capability(Capability::Group).order(order).build()?);
	Ok(())
}

/// Derives a display `name` from the file stem of `url`.
#[derive(Debug, Clone, Copy)]
pub struct NameFromUrl;

impl Derivation for NameFromUrl {
	fn derive(&self, trait_id: &str, ctx: &ResolveCtx<'_>) -> Option<Value> {
		if trait_id != "name" {
			return None;
		}
		let url = ctx.get_str("url")?;
		let file = url.trim_end_matches('/').rsplit('/').next()?;
		let stem = file.split_once('.').map_or(file, |(stem, _)| stem);
		(!stem.is_empty()).then(|| Value::String(stem.to_string()))
	}

	fn duplicate(&self, _owner: ModelId) -> Result<Arc<dyn Derivation>, StratumError> {
		Ok(Arc::new(*self))
	}
}
