//! Model schemas composed from trait sets.
//!
//! A [`TraitSet`] groups the traits contributed by one capability (URL-bearing,
//! mappable, group, ...). A [`TraitSchema`] is the ordered union of the sets a
//! model type includes plus its own declarations. Redeclaring an id with the
//! same type replaces the earlier declaration; redeclaring it with another type
//! is a [`SchemaError::IncompatibleTrait`].

use rustc_hash::FxHashMap;
use serde_json::{Map, Value};

use crate::def::TraitDef;
use crate::diagnostics::Diagnostics;
use crate::error::{SchemaError, TraitError};


/// Keys used by persisted definitions that traits may not claim.
pub const RESERVED_IDS: &[&str] = &["type", "id"];

/// Traits contributed by one capability.
#[derive(Debug, Clone)]
pub struct TraitSet {
	pub name: &'static str,
	pub traits: Vec<TraitDef>,
}

impl TraitSet {
	pub fn new(name: &'static str) -> Self {
		Self { name, traits: Vec::new() }
	}

	pub fn with_trait(mut self, def: TraitDef) -> Self {
		self.traits.push(def);
		self
	}
}

/// Ordered, immutable set of trait declarations for a model type.
pub struct TraitSchema {
	name: &'static str,
	traits: Vec<TraitDef>,
	index: FxHashMap<&'static str, usize>,
}

impl core::fmt::Debug for TraitSchema {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("TraitSchema")
			.field("name", &self.name)
			.field("traits", &self.traits.iter().map(|t| t.id).collect::<Vec<_>>())
			.finish()
	}
}

impl TraitSchema {
	pub fn builder(name: &'static str) -> SchemaBuilder {
		SchemaBuilder {
			name,
			traits: Vec::new(),
			index: FxHashMap::default(),
			error: None,
		}
	}

	pub fn name(&self) -> &'static str {
		self.name
	}

	pub fn get(&self, id: &str) -> Option<&TraitDef> {
		self.index.get(id).map(|&i| &self.traits[i])
	}

	pub fn contains(&self, id: &str) -> bool {
		self.index.contains_key(id)
	}

	/// Iterates declarations in declaration order.
	pub fn iter(&self) -> std::slice::Iter<'_, TraitDef> {
		self.traits.iter()
	}

	pub fn len(&self) -> usize {
		self.traits.len()
	}

	pub fn is_empty(&self) -> bool {
		self.traits.is_empty()
	}

	/// Structural equality: same ids with same-typed declarations.
	pub fn same_shape(&self, other: &TraitSchema) -> bool {
		self.traits.len() == other.traits.len() && self.traits.iter().all(|def| other.get(def.id).is_some_and(|o| def.is_same_type(o)))
	}

	/// Validates a raw stratum mapping against this schema.
	///
	/// Unknown keys and warning-level mismatches are dropped and recorded in
	/// `diag`. The first error-level mismatch aborts the whole mapping.
	pub fn validate_values(&self, raw: &Map<String, Value>, diag: &mut Diagnostics) -> Result<Map<String, Value>, TraitError> {
		let mut out = Map::new();
		for (key, value) in raw {
			let Some(def) = self.get(key) else {
				diag.push(TraitError::UnknownTrait {
					trait_id: key.clone(),
					schema: self.name,
				});
				continue;
			};
			match def.validate(value, diag) {
				Ok(valid) => {
					out.insert(key.clone(), valid);
				}
				Err(error) if error.is_fatal() => return Err(error),
				Err(error) => diag.push(error),
			}
		}
		Ok(out)
	}

	/// Serializes resolved values, dropping keys the schema does not declare.
	pub fn to_json(&self, values: &Map<String, Value>) -> Map<String, Value> {
		let mut out = Map::new();
		for def in &self.traits {
			if let Some(value) = values.get(def.id) {
				out.insert(def.id.to_string(), def.to_json(value));
			}
		}
		out
	}
}

/// Incremental schema construction.
///
/// The first composition error is kept and reported by [`SchemaBuilder::build`].
pub struct SchemaBuilder {
	name: &'static str,
	traits: Vec<TraitDef>,
	index: FxHashMap<&'static str, usize>,
	error: Option<SchemaError>,
}

impl SchemaBuilder {
	pub fn with_trait(mut self, def: TraitDef) -> Self {
		self.push(def);
		self
	}

	/// Adds every trait of a capability set.
	pub fn include(mut self, set: &TraitSet) -> Self {
		for def in &set.traits {
			self.push(def.clone());
		}
		self
	}

	fn push(&mut self, def: TraitDef) {
		if self.error.is_some() {
			return;
		}
		if RESERVED_IDS.contains(&def.id) {
			self.error = Some(SchemaError::ReservedId(def.id));
			return;
		}

		match self.index.get(def.id) {
			Some(&i) => {
				let existing = &self.traits[i];
				if !existing.is_same_type(&def) {
					self.error = Some(SchemaError::IncompatibleTrait {
						schema: self.name,
						trait_id: def.id,
						existing: existing.kind.describe(),
						incoming: def.kind.describe(),
					});
					return;
				}
				tracing::trace!(schema = self.name, trait_id = def.id, "trait redeclared; later declaration wins");
				self.traits[i] = def;
			}
			None => {
				self.index.insert(def.id, self.traits.len());
				self.traits.push(def);
			}
		}
	}

	pub fn build(self) -> Result<TraitSchema, SchemaError> {
		if let Some(error) = self.error {
			return Err(error);
		}

		for def in &self.traits {
			if let Some(default) = &def.default {
				let mut diag = Diagnostics::new();
				def.validate(default, &mut diag).map_err(|e| SchemaError::InvalidDefault {
					trait_id: def.id,
					reason: e.to_string(),
				})?;
			}
		}

		Ok(TraitSchema {
			name: self.name,
			traits: self.traits,
			index: self.index,
		})
	}
}
