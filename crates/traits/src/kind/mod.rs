//! Closed set of trait kinds.
//!
//! Every trait declares one [`TraitKind`]. The kind decides how a raw JSON value
//! is validated and normalized, how values from several strata combine, and how
//! a resolved value is written back to a persisted definition. Dispatch is a
//! plain `match` over the tag.
//!
//! | Kind | Merge policy |
//! |---|---|
//! | [`TraitKind::Primitive`] | first defined value wins |
//! | [`TraitKind::Array`] | [`ArrayMerge::Override`] or [`ArrayMerge::Concat`] with an explicit [`DedupKey`] |
//! | [`TraitKind::Object`] / [`TraitKind::Any`] | [`ObjectMerge::Override`] or [`ObjectMerge::ShallowMerge`] |
//! | [`TraitKind::Nested`] | each nested trait resolves over its own stack built from the outer strata |

use std::sync::Arc;

use serde_json::Value;

use crate::diagnostics::Diagnostics;
use crate::error::{Severity, TraitError};
use crate::schema::TraitSchema;


/// Scalar JSON types a primitive trait can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
	String,
	/// Any JSON number.
	Number,
	/// Whole numbers; integral floats such as `3.0` are normalized to `3`.
	Integer,
	Boolean,
}

impl PrimitiveType {
	pub const fn name(self) -> &'static str {
		match self {
			Self::String => "string",
			Self::Number => "number",
			Self::Integer => "integer",
			Self::Boolean => "boolean",
		}
	}

	/// Normalizes `raw` into this type, or returns `None` on mismatch.
	pub fn coerce(self, raw: &Value) -> Option<Value> {
		match (self, raw) {
			(Self::String, Value::String(_)) | (Self::Number, Value::Number(_)) | (Self::Boolean, Value::Bool(_)) => Some(raw.clone()),
			(Self::Integer, Value::Number(n)) => {
				if n.is_i64() || n.is_u64() {
					return Some(raw.clone());
				}
				let f = n.as_f64()?;
				(f.is_finite() && f.fract() == 0.0 && f.abs() <= MAX_SAFE_INTEGER).then(|| Value::from(f as i64))
			}
			_ => None,
		}
	}
}

/// Largest float that still converts to an integer without loss.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// How array elements from several strata are identified as duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DedupKey {
	/// Keep every element.
	None,
	/// Drop elements structurally equal to one already kept.
	Value,
	/// Objects are identified by this field; elements lacking it are always kept.
	Field(&'static str),
}

impl DedupKey {
	/// Returns true if `kept` already contains an element identified like `item`.
	pub fn is_duplicate(&self, kept: &[Value], item: &Value) -> bool {
		match self {
			Self::None => false,
			Self::Value => kept.contains(item),
			Self::Field(field) => match item.get(*field) {
				Some(key) => kept.iter().any(|k| k.get(*field) == Some(key)),
				None => false,
			},
		}
	}
}

/// Merge policy for array traits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArrayMerge {
	/// First stratum defining the array wins.
	Override,
	/// Concatenate arrays from every stratum, higher strata first.
	Concat { dedup: DedupKey },
}

/// Merge policy for object and `any` traits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectMerge {
	Override,
	/// Union of keys across strata; the higher stratum's key wins on conflict.
	ShallowMerge,
}

/// Element type of an array trait.
#[derive(Debug, Clone)]
pub enum ElementKind {
	Primitive(PrimitiveType),
	/// Objects validated against a nested schema.
	Object(Arc<TraitSchema>),
	Any,
}

impl ElementKind {
	pub fn same_type(&self, other: &Self) -> bool {
		match (self, other) {
			(Self::Primitive(a), Self::Primitive(b)) => a == b,
			(Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b) || a.same_shape(b),
			(Self::Any, Self::Any) => true,
			_ => false,
		}
	}

	fn describe(&self) -> String {
		match self {
			Self::Primitive(ty) => ty.name().to_string(),
			Self::Object(schema) => schema.name().to_string(),
			Self::Any => "any".to_string(),
		}
	}

	/// Validates one element. Invalid elements are dropped with a warning.
	fn validate(&self, trait_id: &str, index: usize, item: &Value, diag: &mut Diagnostics) -> Option<Value> {
		let element_id = || format!("{trait_id}[{index}]");
		let result = match self {
			Self::Primitive(ty) => ty.coerce(item).ok_or_else(|| TraitError::InvalidProperty {
				trait_id: element_id(),
				expected: ty.name(),
				actual: json_type_name(item),
				severity: Severity::Warning,
			}),
			Self::Object(schema) => match item {
				Value::Object(map) => schema.validate_values(map, diag).map(Value::Object),
				other => Err(TraitError::InvalidProperty {
					trait_id: element_id(),
					expected: "object",
					actual: json_type_name(other),
					severity: Severity::Warning,
				}),
			},
			Self::Any => Ok(item.clone()),
		};

		match result {
			Ok(value) => Some(value),
			Err(error) => {
				diag.push(error);
				None
			}
		}
	}
}

/// The declared type of a trait, carrying its merge policy.
#[derive(Debug, Clone)]
pub enum TraitKind {
	Primitive(PrimitiveType),
	Array { element: ElementKind, merge: ArrayMerge },
	/// A JSON object with arbitrary keys.
	Object { merge: ObjectMerge },
	/// Arbitrary JSON.
	Any { merge: ObjectMerge },
	/// A nested trait-bearing value with its own schema.
	Nested(Arc<TraitSchema>),
}

impl TraitKind {
	/// Type name used in error messages.
	pub fn expected(&self) -> &'static str {
		match self {
			Self::Primitive(ty) => ty.name(),
			Self::Array { .. } => "array",
			Self::Object { .. } | Self::Nested(_) => "object",
			Self::Any { .. } => "any",
		}
	}

	/// Human-readable description including type parameters.
	pub fn describe(&self) -> String {
		match self {
			Self::Primitive(ty) => ty.name().to_string(),
			Self::Array { element, merge } => match merge {
				ArrayMerge::Override => format!("array<{}>", element.describe()),
				ArrayMerge::Concat { dedup } => format!("array<{}> concat({dedup:?})", element.describe()),
			},
			Self::Object { merge } => format!("object({merge:?})"),
			Self::Any { merge } => format!("any({merge:?})"),
			Self::Nested(schema) => format!("nested<{}>", schema.name()),
		}
	}

	/// Structural equality of kinds and all their type parameters.
	pub fn same_type(&self, other: &Self) -> bool {
		match (self, other) {
			(Self::Primitive(a), Self::Primitive(b)) => a == b,
			(Self::Array { element: ea, merge: ma }, Self::Array { element: eb, merge: mb }) => ma == mb && ea.same_type(eb),
			(Self::Object { merge: a }, Self::Object { merge: b }) | (Self::Any { merge: a }, Self::Any { merge: b }) => a == b,
			(Self::Nested(a), Self::Nested(b)) => Arc::ptr_eq(a, b) || a.same_shape(b),
			_ => false,
		}
	}

	/// Returns true if values are combined across strata rather than overridden.
	pub fn combines(&self) -> bool {
		matches!(
			self,
			Self::Array {
				merge: ArrayMerge::Concat { .. },
				..
			} | Self::Object {
				merge: ObjectMerge::ShallowMerge
			} | Self::Any {
				merge: ObjectMerge::ShallowMerge
			}
		)
	}

	/// Validates and normalizes a non-null raw value.
	pub(crate) fn validate(&self, trait_id: &str, raw: &Value, severity: Severity, diag: &mut Diagnostics) -> Result<Value, TraitError> {
		let mismatch = || TraitError::InvalidProperty {
			trait_id: trait_id.to_string(),
			expected: self.expected(),
			actual: json_type_name(raw),
			severity,
		};

		match self {
			Self::Primitive(ty) => ty.coerce(raw).ok_or_else(mismatch),
			Self::Array { element, .. } => {
				let Value::Array(items) = raw else {
					return Err(mismatch());
				};
				let kept = items
					.iter()
					.enumerate()
					.filter_map(|(index, item)| element.validate(trait_id, index, item, diag))
					.collect();
				Ok(Value::Array(kept))
			}
			Self::Object { .. } => match raw {
				Value::Object(_) => Ok(raw.clone()),
				_ => Err(mismatch()),
			},
			Self::Any { .. } => Ok(raw.clone()),
			Self::Nested(schema) => {
				let Value::Object(map) = raw else {
					return Err(mismatch());
				};
				schema.validate_values(map, diag).map(Value::Object)
			}
		}
	}

	/// Serializes a resolved value for a persisted definition.
	pub(crate) fn to_json(&self, value: &Value) -> Value {
		match (self, value) {
			(Self::Nested(schema), Value::Object(map)) => Value::Object(schema.to_json(map)),
			(
				Self::Array {
					element: ElementKind::Object(schema),
					..
				},
				Value::Array(items),
			) => Value::Array(
				items
					.iter()
					.map(|item| match item {
						Value::Object(map) => Value::Object(schema.to_json(map)),
						other => other.clone(),
					})
					.collect(),
			),
			_ => value.clone(),
		}
	}
}

/// Returns the JSON type name of a value.
pub fn json_type_name(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "boolean",
		Value::Number(_) => "number",
		Value::String(_) => "string",
		Value::Array(_) => "array",
		Value::Object(_) => "object",
	}
}
