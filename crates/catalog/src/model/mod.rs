//! Catalog models.
//!
//! # Mental model
//!
//! * A [`Model`] owns one published [`StrataStack`]. Every read pins the current
//!   stack and resolves against it; nothing is cached between reads.
//! * Writers build a replacement stack and publish it with CAS. A failed CAS
//!   means another writer won; the edit is retried against the latest stack.
//! * Replacing a stratum is the only write primitive. Installed strata are
//!   never mutated in place.
//!
//! # Key types
//!
//! | Type | Meaning | Constructed in |
//! |---|---|---|
//! | [`ModelType`] | Schema, capabilities, stack order, loaders, derived strata | [`ModelTypeBuilder::build`] |
//! | [`Model`] | One catalog object and its stack | [`crate::ModelRegistry::create`] or [`Model::new`] |
//! | [`Snapshot`] | A pinned stack plus the type needed to resolve it | [`Model::snapshot`] |
//!
//! # Concurrency & ordering
//!
//! * Readers are wait-free (`ArcSwap` load + immutable strata).
//! * Each successful publication emits exactly one [`StackEvent`], after the
//!   new stack is visible.
//! * Load bookkeeping lives behind a short synchronous lock that is never held
//!   across an await.

use std::convert::Infallible;
use std::sync::Arc;

use arc_swap::ArcSwap;
use geocat_traits::{Diagnostics, Map, ModelId, StrataStack, Stratum, StratumName, TraitDef, Validated, Value, resolve, resolve_def};
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::capability::Capability;
use crate::config::CatalogConfig;
use crate::error::{CatalogError, Result};
use crate::events::{EventBus, StackChange, StackEvent};
use crate::load::{ErrorSink, LoadSlots, TracingErrorSink};

mod lifecycle;
mod types;
mod view;

pub use types::{ModelType, ModelTypeBuilder};
pub use view::{GroupView, MappableView, Rectangle};

#[cfg(test)]
mod tests;

/// Per-model runtime settings.
#[derive(Clone)]
pub struct ModelOptions {
	pub event_capacity: usize,
	/// Route load failures to `sink` as well as returning them.
	pub raise_failures: bool,
	pub sink: Arc<dyn ErrorSink>,
}

impl core::fmt::Debug for ModelOptions {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("ModelOptions")
			.field("event_capacity", &self.event_capacity)
			.field("raise_failures", &self.raise_failures)
			.finish_non_exhaustive()
	}
}

impl Default for ModelOptions {
	fn default() -> Self {
		Self::from_config(&CatalogConfig::default())
	}
}

impl ModelOptions {
	pub fn from_config(config: &CatalogConfig) -> Self {
		Self {
			event_capacity: config.event_capacity(),
			raise_failures: config.load.raise_failures,
			sink: Arc::new(TracingErrorSink),
		}
	}

	pub fn with_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
		self.sink = sink;
		self
	}
}

/// A pinned stack with the type needed to resolve it.
///
/// All reads through one snapshot observe the same strata.
#[derive(Debug, Clone)]
pub struct Snapshot {
	ty: Arc<ModelType>,
	stack: Arc<StrataStack>,
}

impl Snapshot {
	pub fn new(ty: Arc<ModelType>, stack: Arc<StrataStack>) -> Self {
		Self { ty, stack }
	}

	pub fn model_type(&self) -> &Arc<ModelType> {
		&self.ty
	}

	pub fn stack(&self) -> &Arc<StrataStack> {
		&self.stack
	}

	/// Resolves one trait; `None` if undeclared or undefined.
	pub fn get(&self, trait_id: &str) -> Option<Value> {
		resolve(self.ty.schema(), self.stack.view(), trait_id)
	}

	pub fn get_str(&self, trait_id: &str) -> Option<String> {
		match self.get(trait_id)? {
			Value::String(s) => Some(s),
			_ => None,
		}
	}

	pub fn get_f64(&self, trait_id: &str) -> Option<f64> {
		self.get(trait_id)?.as_f64()
	}

	pub fn get_bool(&self, trait_id: &str) -> Option<bool> {
		self.get(trait_id)?.as_bool()
	}

	/// Resolves every declared trait that has a value.
	pub fn resolved(&self) -> Map<String, Value> {
		let schema = self.ty.schema();
		let mut out = Map::new();
		for def in schema.iter() {
			if let Some(value) = resolve_def(schema, self.stack.view(), def) {
				out.insert(def.id.to_string(), value);
			}
		}
		out
	}
}

/// A catalog object whose properties resolve over a stack of strata.
pub struct Model {
	id: ModelId,
	key: Arc<str>,
	ty: Arc<ModelType>,
	stack: ArcSwap<StrataStack>,
	loads: Mutex<LoadSlots>,
	events: EventBus,
	options: ModelOptions,
}

impl core::fmt::Debug for Model {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("Model")
			.field("id", &self.id)
			.field("key", &self.key)
			.field("type", &self.ty.name())
			.field("strata", &self.stack.load().names().collect::<Vec<_>>())
			.finish()
	}
}

impl Model {
	/// Creates a bare model holding only its type's derived strata.
	pub fn new(id: ModelId, key: impl Into<Arc<str>>, ty: Arc<ModelType>, options: ModelOptions) -> Self {
		let stack = ty.derived().iter().fold(StrataStack::new(ty.order().clone()), |stack, (name, derivation)| {
			stack.installed(Arc::new(Stratum::derived(id, name.clone(), derivation.clone())))
		});
		Self::from_parts(id, key.into(), ty, stack, LoadSlots::default(), options)
	}

	fn from_parts(id: ModelId, key: Arc<str>, ty: Arc<ModelType>, stack: StrataStack, loads: LoadSlots, options: ModelOptions) -> Self {
		Self {
			id,
			key,
			ty,
			stack: ArcSwap::from_pointee(stack),
			loads: Mutex::new(loads),
			events: EventBus::new(options.event_capacity),
			options,
		}
	}

	pub fn id(&self) -> ModelId {
		self.id
	}

	/// Catalog id, unique within a registry.
	pub fn key(&self) -> &str {
		&self.key
	}

	pub fn model_type(&self) -> &Arc<ModelType> {
		&self.ty
	}

	pub fn has_capability(&self, cap: Capability) -> bool {
		self.ty.has_capability(cap)
	}

	/// Pins the current stack.
	pub fn snapshot(&self) -> Snapshot {
		Snapshot::new(self.ty.clone(), self.stack.load_full())
	}

	pub fn get(&self, trait_id: &str) -> Option<Value> {
		self.snapshot().get(trait_id)
	}

	pub fn get_str(&self, trait_id: &str) -> Option<String> {
		self.snapshot().get_str(trait_id)
	}

	pub fn get_f64(&self, trait_id: &str) -> Option<f64> {
		self.snapshot().get_f64(trait_id)
	}

	pub fn get_bool(&self, trait_id: &str) -> Option<bool> {
		self.snapshot().get_bool(trait_id)
	}

	pub fn resolved(&self) -> Map<String, Value> {
		self.snapshot().resolved()
	}

	pub fn stratum(&self, name: &str) -> Option<Arc<Stratum>> {
		self.stack.load().get(name).cloned()
	}

	/// Stratum names, top to bottom.
	pub fn strata(&self) -> Vec<StratumName> {
		self.stack.load().iter().map(|s| s.name_arc().clone()).collect()
	}

	pub fn subscribe(&self) -> broadcast::Receiver<StackEvent> {
		self.events.subscribe()
	}

	/// Validates raw values against the schema and installs them as a static stratum.
	///
	/// Warning-level problems are dropped and returned; an error-level problem
	/// rejects the whole stratum and leaves the stack untouched.
	pub fn install_values(&self, name: &str, raw: &Map<String, Value>) -> Result<Diagnostics> {
		let mut diagnostics = Diagnostics::new();
		let values = self.ty.schema().validate_values(raw, &mut diagnostics)?;
		for warning in &diagnostics {
			tracing::warn!(domain = "strata", model = %self.id, stratum = name, warning = %warning, "dropped invalid property");
		}
		self.install_stratum(Arc::new(Stratum::new(self.id, name, values)))?;
		Ok(diagnostics)
	}

	/// Installs a prepared stratum, replacing any stratum of the same name.
	pub fn install_stratum(&self, stratum: Arc<Stratum>) -> Result<()> {
		if stratum.owner() != self.id {
			return Err(CatalogError::ForeignStratum {
				stratum: stratum.name().to_string(),
				owner: stratum.owner(),
				model: self.id,
			});
		}
		let name = stratum.name_arc().clone();
		self.commit(&name, |stack| Ok::<_, CatalogError>(Some(stack.installed(stratum.clone()))))?;
		Ok(())
	}

	/// Removes a stratum. Returns false if it was not installed.
	pub fn remove_stratum(&self, name: &str) -> bool {
		let name: StratumName = name.into();
		let removed = self.commit(&name, |stack| Ok::<_, Infallible>(stack.contains(&name).then(|| stack.removed(&name))));
		matches!(removed, Ok(Some(_)))
	}

	/// Validates and stores one trait value in `stratum`, creating the stratum if needed.
	pub fn set_trait(&self, stratum: &str, trait_id: &str, raw: &Value) -> Result<Diagnostics> {
		let def = self.trait_def(trait_id)?;
		let Validated { value, warnings } = def.from_json(raw)?;
		let name: StratumName = stratum.into();
		self.commit(&name, |stack| {
			let next = match stack.get(&name) {
				Some(existing) => existing.with_value(trait_id, value.clone())?,
				None => {
					let mut values = Map::new();
					values.insert(trait_id.to_string(), value.clone());
					Stratum::new(self.id, name.clone(), values)
				}
			};
			Ok::<_, CatalogError>(Some(stack.installed(Arc::new(next))))
		})?;
		Ok(warnings)
	}

	/// Removes one trait value from `stratum`. Returns false if it was not set.
	pub fn unset_trait(&self, stratum: &str, trait_id: &str) -> Result<bool> {
		self.trait_def(trait_id)?;
		let name: StratumName = stratum.into();
		let changed = self.commit(&name, |stack| {
			let Some(existing) = stack.get(&name) else {
				return Ok(None);
			};
			if existing.raw(trait_id).is_none() {
				return Ok(None);
			}
			Ok::<_, CatalogError>(Some(stack.installed(Arc::new(existing.without_value(trait_id)?))))
		})?;
		Ok(changed.is_some())
	}

	/// Produces an independent copy bound to `id`.
	///
	/// Every stratum is duplicated through [`Stratum::duplicate`]; loaded strata
	/// keep their content and count as loaded for their recorded input. No load
	/// is started.
	pub fn duplicate(&self, id: ModelId, key: impl Into<Arc<str>>) -> Result<Model> {
		let stack = self.stack.load_full().rebind(id)?;
		let loads = LoadSlots::from_installed(&stack);
		tracing::debug!(domain = "strata", from = %self.id, to = %id, strata = stack.len(), "model duplicated");
		Ok(Self::from_parts(id, key.into(), self.ty.clone(), stack, loads, self.options.clone()))
	}

	fn trait_def(&self, trait_id: &str) -> Result<&TraitDef> {
		self.ty.schema().get(trait_id).ok_or_else(|| CatalogError::UnknownTrait {
			model_type: self.ty.name().to_string(),
			trait_id: trait_id.to_string(),
		})
	}

	/// Publishes the stack produced by `edit`, retrying on lost CAS races.
	///
	/// `edit` returning `None` publishes nothing. Emits one event describing
	/// what happened to `name`.
	fn commit<E>(&self, name: &StratumName, mut edit: impl FnMut(&Arc<StrataStack>) -> std::result::Result<Option<StrataStack>, E>) -> std::result::Result<Option<StackChange>, E> {
		loop {
			let cur = self.stack.load_full();
			let Some(next) = edit(&cur)? else {
				return Ok(None);
			};
			let change = match (cur.contains(name), next.contains(name)) {
				(false, true) => StackChange::Installed,
				(true, true) => StackChange::Replaced,
				(true, false) => StackChange::Removed,
				(false, false) => return Ok(None),
			};

			let prev = self.stack.compare_and_swap(&cur, Arc::new(next));
			if Arc::ptr_eq(&prev, &cur) {
				tracing::debug!(domain = "strata", model = %self.id, stratum = %name, change = ?change, "stack published");
				self.events.emit(StackEvent {
					model: self.id,
					stratum: name.clone(),
					change,
				});
				return Ok(Some(change));
			}
		}
	}
}
