//! Trait schemas and layered value resolution.
//!
//! A model's effective property values are computed by merging an ordered stack
//! of named strata. Each property is described by a [`TraitDef`] that decides how
//! raw JSON is validated, how values from different strata combine and how the
//! result is serialized back.
//!
//! # Modules
//!
//! - [`kind`] - closed set of trait kinds and their merge policies
//! - [`def`] - per-property trait declarations
//! - [`schema`] - ordered trait sets composed into a model schema
//! - [`stratum`] - named layers of raw values, static, loaded or derived
//! - [`stack`] - ordered strata with fixed top and bottom bands
//! - [`resolve`] - the resolution algorithm over a stack snapshot
//!
//! # Resolution Order
//!
//! Strata are examined strictly top to bottom. Override traits return the first
//! defined value; combining traits accumulate over the whole stack. When nothing
//! is defined the trait's static default applies.

pub mod def;
pub mod diagnostics;
pub mod error;
pub mod kind;
pub mod resolve;
pub mod schema;
pub mod stack;
pub mod stratum;

pub use def::{TraitDef, TraitResolver, TraitValidator, Validated};
pub use diagnostics::Diagnostics;
pub use error::{SchemaError, Severity, StratumError, TraitError};
pub use kind::{ArrayMerge, DedupKey, ElementKind, ObjectMerge, PrimitiveType, TraitKind, json_type_name};
pub use resolve::{ResolveCtx, resolve, resolve_def};
pub use schema::{SchemaBuilder, TraitSchema, TraitSet};
pub use stack::{StackOrder, StackView, StrataStack};
pub use stratum::{Derivation, ModelId, Stratum, StratumContent, StratumName, StratumSource, names};

/// Raw and resolved trait values are plain JSON.
pub use serde_json::{Map, Value};
