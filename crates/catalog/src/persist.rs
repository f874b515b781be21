//! Persisted model definitions.
//!
//! A definition is a flat JSON object: `"type"` names the model type, `"id"` is
//! the catalog id, and every other key is a trait value. Only the chosen strata
//! contribute; loaded and derived strata are never written back.
//!
//! ```json
//! { "type": "geojson", "id": "roads", "url": "roads.geojson", "opacity": 0.5 }
//! ```

use std::sync::Arc;

use geocat_traits::{Diagnostics, Map, Value, json_type_name, resolve_def};

use crate::error::{CatalogError, Result};
use crate::model::Model;
use crate::registry::ModelRegistry;

pub const TYPE_KEY: &str = "type";
pub const ID_KEY: &str = "id";

/// Flattens the values of `strata` into a definition.
///
/// Each trait defined by at least one chosen stratum is resolved over those
/// strata alone, with its merge policy, and serialized through its trait.
/// Traits with custom resolvers are computed and are skipped.
pub fn to_json<S: AsRef<str>>(model: &Model, strata: &[S]) -> Map<String, Value> {
	let snapshot = model.snapshot();
	let chosen = snapshot
		.stack()
		.retained(|s| !s.is_derived() && s.loaded_input().is_none() && strata.iter().any(|n| n.as_ref() == s.name()));
	let schema = model.model_type().schema();

	let mut out = Map::new();
	out.insert(TYPE_KEY.to_string(), Value::String(model.model_type().name().to_string()));
	out.insert(ID_KEY.to_string(), Value::String(model.key().to_string()));
	for def in schema.iter().filter(|def| def.resolver.is_none()) {
		if !chosen.iter().any(|s| s.raw(def.id).is_some()) {
			continue;
		}
		if let Some(value) = resolve_def(schema, chosen.view(), def) {
			out.insert(def.id.to_string(), def.to_json(&value));
		}
	}
	out
}

/// Creates a model from a definition, installing its values as `stratum`.
///
/// Warning-level problems are returned; error-level problems reject the
/// definition and no model is registered.
pub fn from_json(registry: &ModelRegistry, definition: &Value, stratum: &str) -> Result<(Arc<Model>, Diagnostics)> {
	let Value::Object(fields) = definition else {
		return Err(CatalogError::NotAnObject(json_type_name(definition)));
	};
	let type_name = fields.get(TYPE_KEY).and_then(Value::as_str).ok_or(CatalogError::MissingField(TYPE_KEY))?;
	let key = fields.get(ID_KEY).and_then(Value::as_str).ok_or(CatalogError::MissingField(ID_KEY))?;

	let ty = registry.model_type(type_name).ok_or_else(|| CatalogError::UnknownType(type_name.to_string()))?;
	let mut values = fields.clone();
	values.remove(TYPE_KEY);
	values.remove(ID_KEY);

	// Validate before registering so a rejected definition leaves no model behind.
	let mut diagnostics = Diagnostics::new();
	let values = ty.schema().validate_values(&values, &mut diagnostics)?;

	let model = registry.create(type_name, key)?;
	model.install_values(stratum, &values)?;
	Ok((model, diagnostics))
}
