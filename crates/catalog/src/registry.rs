//! Model registry.
//!
//! Owns every model of a catalog and resolves the non-owning [`ModelId`] and
//! catalog-id handles that strata and groups hold.

use std::sync::Arc;

use geocat_traits::ModelId;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::config::CatalogConfig;
use crate::error::{CatalogError, Result};
use crate::load::ErrorSink;
use crate::model::{Model, ModelOptions, ModelType};

/// Registry indices under a single lock so they never disagree.
#[derive(Default)]
struct RegistryState {
	types: FxHashMap<&'static str, Arc<ModelType>>,
	models: FxHashMap<ModelId, Arc<Model>>,
	by_key: FxHashMap<Arc<str>, ModelId>,
	next_id: u32,
}

impl RegistryState {
	fn next_id(&mut self) -> ModelId {
		self.next_id += 1;
		ModelId::from_u32(self.next_id)
	}

	fn insert(&mut self, model: Arc<Model>) {
		self.by_key.insert(Arc::from(model.key()), model.id());
		self.models.insert(model.id(), model);
	}
}

pub struct ModelRegistry {
	config: Arc<CatalogConfig>,
	options: ModelOptions,
	state: RwLock<RegistryState>,
}

impl core::fmt::Debug for ModelRegistry {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		let state = self.state.read();
		f.debug_struct("ModelRegistry")
			.field("types", &state.types.keys().collect::<Vec<_>>())
			.field("models", &state.models.len())
			.finish()
	}
}

impl Default for ModelRegistry {
	fn default() -> Self {
		Self::new(CatalogConfig::default())
	}
}

impl ModelRegistry {
	pub fn new(config: CatalogConfig) -> Self {
		let options = ModelOptions::from_config(&config);
		Self {
			config: Arc::new(config),
			options,
			state: RwLock::new(RegistryState::default()),
		}
	}

	/// Replaces the error sink handed to models created from now on.
	pub fn with_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
		self.options = self.options.with_sink(sink);
		self
	}

	pub fn config(&self) -> &Arc<CatalogConfig> {
		&self.config
	}

	/// Registers a model type; a later type with the same name replaces the earlier one.
	pub fn register_type(&self, ty: ModelType) -> Arc<ModelType> {
		let ty = Arc::new(ty);
		if self.state.write().types.insert(ty.name(), ty.clone()).is_some() {
			tracing::debug!(domain = "catalog", model_type = ty.name(), "model type replaced");
		}
		ty
	}

	pub fn model_type(&self, name: &str) -> Option<Arc<ModelType>> {
		self.state.read().types.get(name).cloned()
	}

	/// Registered type names, sorted.
	pub fn type_names(&self) -> Vec<&'static str> {
		let mut names: Vec<_> = self.state.read().types.keys().copied().collect();
		names.sort_unstable();
		names
	}

	/// Creates a bare model of `type_name` under catalog id `key`.
	pub fn create(&self, type_name: &str, key: &str) -> Result<Arc<Model>> {
		let mut state = self.state.write();
		let ty = state.types.get(type_name).cloned().ok_or_else(|| CatalogError::UnknownType(type_name.to_string()))?;
		if state.by_key.contains_key(key) {
			return Err(CatalogError::DuplicateId(key.to_string()));
		}
		let id = state.next_id();
		let model = Arc::new(Model::new(id, key, ty, self.options.clone()));
		state.insert(model.clone());
		tracing::debug!(domain = "catalog", model = %id, key, model_type = type_name, "model created");
		Ok(model)
	}

	/// Registers an independent copy of `model` under catalog id `key`.
	pub fn duplicate(&self, model: &Model, key: &str) -> Result<Arc<Model>> {
		let mut state = self.state.write();
		if state.by_key.contains_key(key) {
			return Err(CatalogError::DuplicateId(key.to_string()));
		}
		let id = state.next_id();
		let copy = Arc::new(model.duplicate(id, key)?);
		state.insert(copy.clone());
		Ok(copy)
	}

	pub fn get(&self, id: ModelId) -> Option<Arc<Model>> {
		self.state.read().models.get(&id).cloned()
	}

	/// Looks a model up by catalog id.
	pub fn find(&self, key: &str) -> Option<Arc<Model>> {
		let state = self.state.read();
		let id = state.by_key.get(key)?;
		state.models.get(id).cloned()
	}

	pub fn remove(&self, id: ModelId) -> Option<Arc<Model>> {
		let mut state = self.state.write();
		let model = state.models.remove(&id)?;
		state.by_key.remove(model.key());
		Some(model)
	}

	/// All models in creation order.
	pub fn models(&self) -> Vec<Arc<Model>> {
		let mut models: Vec<_> = self.state.read().models.values().cloned().collect();
		models.sort_unstable_by_key(|m| m.id());
		models
	}

	pub fn len(&self) -> usize {
		self.state.read().models.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

#[cfg(test)]
mod tests;
