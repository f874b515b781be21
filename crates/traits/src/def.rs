//! Per-property trait declarations.

use std::sync::Arc;

use serde_json::Value;

use crate::diagnostics::Diagnostics;
use crate::error::{Severity, TraitError};
use crate::kind::{ArrayMerge, ElementKind, ObjectMerge, PrimitiveType, TraitKind, json_type_name};
use crate::resolve::ResolveCtx;
use crate::schema::TraitSchema;

/// Extra check run after type validation (e.g. a numeric range).
pub type TraitValidator = fn(&Value) -> Result<(), String>;

/// Custom resolver replacing the layered algorithm for computed traits.
pub type TraitResolver = fn(&ResolveCtx<'_>) -> Option<Value>;

/// Declaration of one model property.
///
/// Definitions are immutable once a schema is built. Constructors pick the kind;
/// chained builder methods add description, nullability, default, severity,
/// validator and custom resolver.
#[derive(Clone)]
pub struct TraitDef {
	pub id: &'static str,
	pub description: &'static str,
	pub kind: TraitKind,
	/// Whether JSON `null` is an accepted, resolvable value.
	pub nullable: bool,
	/// Static default used when no stratum defines a value.
	pub default: Option<Value>,
	/// Severity of type mismatches for this trait.
	pub severity: Severity,
	pub validator: Option<TraitValidator>,
	pub resolver: Option<TraitResolver>,
}

impl core::fmt::Debug for TraitDef {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("TraitDef")
			.field("id", &self.id)
			.field("kind", &self.kind.describe())
			.field("nullable", &self.nullable)
			.field("default", &self.default)
			.field("severity", &self.severity)
			.field("computed", &self.resolver.is_some())
			.finish()
	}
}

/// Result of validating a raw value against a trait.
#[derive(Debug, Clone, PartialEq)]
pub struct Validated {
	pub value: Value,
	/// Problems inside the value that were dropped rather than rejected.
	pub warnings: Diagnostics,
}

impl TraitDef {
	pub fn new(id: &'static str, kind: TraitKind) -> Self {
		Self {
			id,
			description: "",
			kind,
			nullable: false,
			default: None,
			severity: Severity::Warning,
			validator: None,
			resolver: None,
		}
	}

	pub fn string(id: &'static str) -> Self {
		Self::new(id, TraitKind::Primitive(PrimitiveType::String))
	}

	pub fn number(id: &'static str) -> Self {
		Self::new(id, TraitKind::Primitive(PrimitiveType::Number))
	}

	pub fn integer(id: &'static str) -> Self {
		Self::new(id, TraitKind::Primitive(PrimitiveType::Integer))
	}

	pub fn boolean(id: &'static str) -> Self {
		Self::new(id, TraitKind::Primitive(PrimitiveType::Boolean))
	}

	pub fn array(id: &'static str, element: ElementKind, merge: ArrayMerge) -> Self {
		Self::new(id, TraitKind::Array { element, merge })
	}

	pub fn object(id: &'static str, merge: ObjectMerge) -> Self {
		Self::new(id, TraitKind::Object { merge })
	}

	pub fn any(id: &'static str, merge: ObjectMerge) -> Self {
		Self::new(id, TraitKind::Any { merge })
	}

	pub fn nested(id: &'static str, schema: Arc<TraitSchema>) -> Self {
		Self::new(id, TraitKind::Nested(schema))
	}

	pub fn describe(mut self, description: &'static str) -> Self {
		self.description = description;
		self
	}

	pub fn nullable(mut self) -> Self {
		self.nullable = true;
		self
	}

	pub fn with_default(mut self, value: impl Into<Value>) -> Self {
		self.default = Some(value.into());
		self
	}

	/// Makes type mismatches abort installation of the whole stratum.
	pub fn fatal(mut self) -> Self {
		self.severity = Severity::Error;
		self
	}

	pub fn validate_with(mut self, validator: TraitValidator) -> Self {
		self.validator = Some(validator);
		self
	}

	pub fn resolve_with(mut self, resolver: TraitResolver) -> Self {
		self.resolver = Some(resolver);
		self
	}

	/// Returns true if both declarations have the same kind, type parameters and nullability.
	///
	/// Identity, description, default and severity are not compared.
	pub fn is_same_type(&self, other: &TraitDef) -> bool {
		self.nullable == other.nullable && self.kind.same_type(&other.kind)
	}

	/// Validates and normalizes a raw stratum value.
	pub fn from_json(&self, raw: &Value) -> Result<Validated, TraitError> {
		let mut warnings = Diagnostics::new();
		let value = self.validate(raw, &mut warnings)?;
		Ok(Validated { value, warnings })
	}

	/// Serializes a resolved value back into its persisted form.
	pub fn to_json(&self, value: &Value) -> Value {
		match value {
			Value::Null => Value::Null,
			other => self.kind.to_json(other),
		}
	}

	pub(crate) fn validate(&self, raw: &Value, diag: &mut Diagnostics) -> Result<Value, TraitError> {
		if raw.is_null() {
			return if self.nullable {
				Ok(Value::Null)
			} else {
				Err(TraitError::InvalidProperty {
					trait_id: self.id.to_string(),
					expected: self.kind.expected(),
					actual: json_type_name(raw),
					severity: self.severity,
				})
			};
		}

		let value = self.kind.validate(self.id, raw, self.severity, diag)?;
		if let Some(check) = self.validator {
			check(&value).map_err(|reason| TraitError::Validation {
				trait_id: self.id.to_string(),
				reason,
				severity: self.severity,
			})?;
		}
		Ok(value)
	}
}
