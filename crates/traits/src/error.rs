//! Error types for trait validation, schema composition and strata.

/// How far a validation failure propagates.
///
/// Warnings drop the offending property and keep loading the rest of the
/// stratum. Errors abort installation of the whole stratum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Severity {
	/// Skip this property, keep the rest.
	#[default]
	Warning,
	/// Abort installing the stratum.
	Error,
}

impl Severity {
	/// Returns a lowercase label for logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Warning => "warning",
			Self::Error => "error",
		}
	}
}

impl std::fmt::Display for Severity {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A raw value failed a trait's type or shape validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TraitError {
	/// The raw JSON type does not match the declared trait kind.
	#[error("invalid value for '{trait_id}': expected {expected}, got {actual}")]
	InvalidProperty {
		/// Trait id, with an `[index]` suffix for array elements.
		trait_id: String,
		/// Declared type name.
		expected: &'static str,
		/// JSON type name of the rejected value.
		actual: &'static str,
		severity: Severity,
	},

	/// The value has the right type but the trait's validator rejected it.
	#[error("value for '{trait_id}' rejected: {reason}")]
	Validation {
		trait_id: String,
		reason: String,
		severity: Severity,
	},

	/// A stratum carried a key that the schema does not declare.
	#[error("unknown trait '{trait_id}' for {schema}")]
	UnknownTrait {
		trait_id: String,
		/// Name of the schema that was consulted.
		schema: &'static str,
	},
}

impl TraitError {
	/// Returns the severity of this error.
	pub fn severity(&self) -> Severity {
		match self {
			Self::InvalidProperty { severity, .. } | Self::Validation { severity, .. } => *severity,
			Self::UnknownTrait { .. } => Severity::Warning,
		}
	}

	/// Returns the trait id the error is about.
	pub fn trait_id(&self) -> &str {
		match self {
			Self::InvalidProperty { trait_id, .. } | Self::Validation { trait_id, .. } | Self::UnknownTrait { trait_id, .. } => trait_id,
		}
	}

	/// Returns true if this error aborts stratum installation.
	pub fn is_fatal(&self) -> bool {
		self.severity() == Severity::Error
	}
}

/// Schema composition failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
	/// Two trait sets declare the same id with different kinds.
	#[error("trait '{trait_id}' declared twice in {schema} with incompatible types ({existing} vs {incoming})")]
	IncompatibleTrait {
		schema: &'static str,
		trait_id: &'static str,
		existing: String,
		incoming: String,
	},

	/// The id collides with a key used by persisted definitions.
	#[error("trait id '{0}' is reserved")]
	ReservedId(&'static str),

	/// A static default does not validate against its own declaration.
	#[error("default for '{trait_id}' does not match its declaration: {reason}")]
	InvalidDefault { trait_id: &'static str, reason: String },
}

/// A stratum operation is not supported.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StratumError {
	/// The stratum cannot be rebound to another model.
	#[error("stratum '{name}' cannot be duplicated: {reason}")]
	DuplicateUnsupported { name: String, reason: String },

	/// Derived strata have no stored values to edit.
	#[error("stratum '{0}' is derived and cannot be edited")]
	NotWritable(String),
}
