//! Named layers of raw trait values.
//!
//! A [`Stratum`] is immutable once built. Edits produce a new stratum that
//! replaces the old one under the same name, so a stack snapshot never observes
//! a partially written layer.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::StratumError;
use crate::resolve::ResolveCtx;

/// Name of a stratum, unique within a stack.
pub type StratumName = Arc<str>;

/// Well-known stratum names.
pub mod names {
	/// Values edited by the user.
	pub const USER: &str = "user";
	/// Values forced by the hosting application.
	pub const OVERRIDE: &str = "override";
	/// Values read from a catalog definition.
	pub const DEFINITION: &str = "definition";
	/// Derived values computed from other strata.
	pub const COMPUTED: &str = "computed";
	/// Lowest-priority fallback values.
	pub const DEFAULTS: &str = "defaults";
}

/// Non-owning handle to the model that owns a stratum.
///
/// Strata never hold a strong reference to their owner; the handle is resolved
/// through the catalog's model registry when needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelId(u32);

impl ModelId {
	pub const fn from_u32(id: u32) -> Self {
		Self(id)
	}

	pub const fn as_u32(self) -> u32 {
		self.0
	}
}

impl std::fmt::Display for ModelId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "model#{}", self.0)
	}
}

/// Where a stratum's values came from.
#[derive(Debug, Clone, PartialEq)]
pub enum StratumSource {
	/// Authored directly (definition file, user edit, defaults).
	Static,
	/// Produced by a loader from an external document.
	Loaded {
		/// Loader input the values were computed from (e.g. a URL).
		input: String,
		/// Parsed source document.
		document: Arc<Value>,
	},
	/// Computed at read time.
	Derived,
}

/// Values computed from the rest of the stack at read time.
///
/// A derivation sees every non-derived stratum plus the derived strata ranked
/// below it, so derivations form an acyclic chain and can never read themselves.
pub trait Derivation: Send + Sync {
	/// Computes `trait_id`, or returns `None` if this derivation does not define it.
	fn derive(&self, trait_id: &str, ctx: &ResolveCtx<'_>) -> Option<Value>;

	/// Rebinds the derivation to a duplicated owner.
	fn duplicate(&self, owner: ModelId) -> Result<Arc<dyn Derivation>, StratumError>;
}

/// Stored content of a stratum.
#[derive(Clone)]
pub enum StratumContent {
	Values(Map<String, Value>),
	Derived(Arc<dyn Derivation>),
}

impl core::fmt::Debug for StratumContent {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		match self {
			Self::Values(values) => f.debug_tuple("Values").field(values).finish(),
			Self::Derived(_) => f.write_str("Derived(..)"),
		}
	}
}

/// A named partial snapshot of a model's properties.
#[derive(Debug, Clone)]
pub struct Stratum {
	name: StratumName,
	owner: ModelId,
	content: StratumContent,
	source: StratumSource,
}

impl Stratum {
	/// Creates a static stratum from already validated values.
	pub fn new(owner: ModelId, name: impl Into<StratumName>, values: Map<String, Value>) -> Self {
		Self {
			name: name.into(),
			owner,
			content: StratumContent::Values(values),
			source: StratumSource::Static,
		}
	}

	/// Creates a stratum produced by a loader.
	pub fn loaded(owner: ModelId, name: impl Into<StratumName>, values: Map<String, Value>, input: String, document: Arc<Value>) -> Self {
		Self {
			name: name.into(),
			owner,
			content: StratumContent::Values(values),
			source: StratumSource::Loaded { input, document },
		}
	}

	/// Creates a derived stratum.
	pub fn derived(owner: ModelId, name: impl Into<StratumName>, derivation: Arc<dyn Derivation>) -> Self {
		Self {
			name: name.into(),
			owner,
			content: StratumContent::Derived(derivation),
			source: StratumSource::Derived,
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn name_arc(&self) -> &StratumName {
		&self.name
	}

	pub fn owner(&self) -> ModelId {
		self.owner
	}

	pub fn content(&self) -> &StratumContent {
		&self.content
	}

	pub fn source(&self) -> &StratumSource {
		&self.source
	}

	pub fn is_derived(&self) -> bool {
		matches!(self.content, StratumContent::Derived(_))
	}

	/// Returns the loader input for loaded strata.
	pub fn loaded_input(&self) -> Option<&str> {
		match &self.source {
			StratumSource::Loaded { input, .. } => Some(input),
			_ => None,
		}
	}

	/// Returns stored values, or `None` for derived strata.
	pub fn values(&self) -> Option<&Map<String, Value>> {
		match &self.content {
			StratumContent::Values(values) => Some(values),
			StratumContent::Derived(_) => None,
		}
	}

	/// Returns the stored raw value of one trait.
	pub fn raw(&self, trait_id: &str) -> Option<&Value> {
		self.values()?.get(trait_id)
	}

	/// Returns a copy with `trait_id` set to `value`.
	pub fn with_value(&self, trait_id: &str, value: Value) -> Result<Stratum, StratumError> {
		let StratumContent::Values(values) = &self.content else {
			return Err(StratumError::NotWritable(self.name.to_string()));
		};
		let mut values = values.clone();
		values.insert(trait_id.to_string(), value);
		Ok(self.with_content(StratumContent::Values(values)))
	}

	/// Returns a copy with `trait_id` unset.
	pub fn without_value(&self, trait_id: &str) -> Result<Stratum, StratumError> {
		let StratumContent::Values(values) = &self.content else {
			return Err(StratumError::NotWritable(self.name.to_string()));
		};
		let mut values = values.clone();
		values.remove(trait_id);
		Ok(self.with_content(StratumContent::Values(values)))
	}

	fn with_content(&self, content: StratumContent) -> Stratum {
		Stratum {
			name: self.name.clone(),
			owner: self.owner,
			content,
			source: self.source.clone(),
		}
	}

	/// Produces an equivalent stratum bound to `owner`.
	///
	/// Stored values are deep-copied; derivations rebind through
	/// [`Derivation::duplicate`]. Never triggers a load.
	pub fn duplicate(&self, owner: ModelId) -> Result<Stratum, StratumError> {
		let content = match &self.content {
			StratumContent::Values(values) => StratumContent::Values(values.clone()),
			StratumContent::Derived(derivation) => StratumContent::Derived(derivation.duplicate(owner)?),
		};
		Ok(Stratum {
			name: self.name.clone(),
			owner,
			content,
			source: self.source.clone(),
		})
	}
}
