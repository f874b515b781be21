//! Model type declarations.

use std::sync::Arc;

use geocat_traits::{Derivation, SchemaError, StackOrder, StratumName, TraitDef, TraitSchema};

use crate::capability::{Capabilities, Capability, base_traits};
use crate::load::StratumLoader;

/// Static description shared by every model of one type.
///
/// The schema is the base catalog-member traits, then each capability's trait
/// set in capability order, then the type's own declarations.
pub struct ModelType {
	name: &'static str,
	schema: Arc<TraitSchema>,
	capabilities: Capabilities,
	order: Arc<StackOrder>,
	loaders: Vec<Arc<dyn StratumLoader>>,
	derived: Vec<(StratumName, Arc<dyn Derivation>)>,
}

impl core::fmt::Debug for ModelType {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("ModelType")
			.field("name", &self.name)
			.field("capabilities", &self.capabilities)
			.field("traits", &self.schema.len())
			.field("loaders", &self.loaders.iter().map(|l| l.stratum_name()).collect::<Vec<_>>())
			.field("derived", &self.derived.iter().map(|(n, _)| n).collect::<Vec<_>>())
			.finish()
	}
}

impl ModelType {
	pub fn builder(name: &'static str) -> ModelTypeBuilder {
		ModelTypeBuilder {
			name,
			capabilities: Capabilities::empty(),
			traits: Vec::new(),
			order: None,
			loaders: Vec::new(),
			derived: Vec::new(),
		}
	}

	pub fn name(&self) -> &'static str {
		self.name
	}

	pub fn schema(&self) -> &Arc<TraitSchema> {
		&self.schema
	}

	pub fn capabilities(&self) -> Capabilities {
		self.capabilities
	}

	pub fn has_capability(&self, cap: Capability) -> bool {
		self.capabilities.contains(cap.as_set())
	}

	pub fn order(&self) -> &Arc<StackOrder> {
		&self.order
	}

	/// Returns the loader installing `stratum`.
	pub fn loader(&self, stratum: &str) -> Option<&Arc<dyn StratumLoader>> {
		self.loaders.iter().find(|l| l.stratum_name() == stratum)
	}

	pub fn loaders(&self) -> &[Arc<dyn StratumLoader>] {
		&self.loaders
	}

	/// Derived strata installed on every new model of this type.
	pub fn derived(&self) -> &[(StratumName, Arc<dyn Derivation>)] {
		&self.derived
	}
}

pub struct ModelTypeBuilder {
	name: &'static str,
	capabilities: Capabilities,
	traits: Vec<TraitDef>,
	order: Option<StackOrder>,
	loaders: Vec<Arc<dyn StratumLoader>>,
	derived: Vec<(StratumName, Arc<dyn Derivation>)>,
}

impl ModelTypeBuilder {
	pub fn capability(mut self, cap: Capability) -> Self {
		self.capabilities |= cap.as_set();
		self
	}

	pub fn with_trait(mut self, def: TraitDef) -> Self {
		self.traits.push(def);
		self
	}

	pub fn order(mut self, order: StackOrder) -> Self {
		self.order = Some(order);
		self
	}

	/// Adds a loader; a later loader for the same stratum name replaces an earlier one.
	pub fn loader(mut self, loader: Arc<dyn StratumLoader>) -> Self {
		self.loaders.retain(|l| l.stratum_name() != loader.stratum_name());
		self.loaders.push(loader);
		self
	}

	pub fn derived(mut self, name: impl Into<StratumName>, derivation: Arc<dyn Derivation>) -> Self {
		let name = name.into();
		self.derived.retain(|(n, _)| *n != name);
		self.derived.push((name, derivation));
		self
	}

	pub fn build(self) -> Result<ModelType, SchemaError> {
		let mut schema = TraitSchema::builder(self.name).include(&base_traits());
		for cap in self.capabilities.capabilities() {
			schema = schema.include(&cap.trait_set());
		}
		for def in self.traits {
			schema = schema.with_trait(def);
		}

		Ok(ModelType {
			name: self.name,
			schema: Arc::new(schema.build()?),
			capabilities: self.capabilities,
			order: Arc::new(self.order.unwrap_or_default()),
			loaders: self.loaders,
			derived: self.derived,
		})
	}
}
