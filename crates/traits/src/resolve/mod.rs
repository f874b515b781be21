//! Layered trait resolution.
//!
//! Resolution is a pure function of the stack view and the schema: no caching,
//! no global state. Repeated reads of an unchanged stack return equal values.
//!
//! # Algorithm
//!
//! 1. A trait with a custom resolver delegates to it with a [`ResolveCtx`].
//! 2. Otherwise raw values are read top to bottom. Derived strata compute their
//!    value from a view that hides themselves and derived strata above them.
//! 3. Override kinds return the first defined value; combining kinds accumulate
//!    across the whole stack.
//! 4. If nothing is defined, the trait's static default applies.

use std::borrow::Cow;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::def::TraitDef;
use crate::kind::{ArrayMerge, DedupKey, ObjectMerge, TraitKind};
use crate::schema::TraitSchema;
use crate::stack::{Rank, StackEntry, StackView};
use crate::stratum::{Stratum, StratumContent};

#[cfg(test)]
mod tests;

/// Guards against custom resolvers or derivations that read each other in a loop.
const MAX_DEPTH: usize = 32;

/// Read access to a stack while resolving one trait.
#[derive(Clone, Copy)]
pub struct ResolveCtx<'a> {
	schema: &'a TraitSchema,
	view: StackView<'a>,
	depth: usize,
}

impl<'a> ResolveCtx<'a> {
	pub fn new(schema: &'a TraitSchema, view: StackView<'a>) -> Self {
		Self { schema, view, depth: 0 }
	}

	pub fn schema(&self) -> &'a TraitSchema {
		self.schema
	}

	pub fn view(&self) -> StackView<'a> {
		self.view
	}

	/// Resolves another trait over the same view.
	pub fn get(&self, trait_id: &str) -> Option<Value> {
		let def = self.schema.get(trait_id)?;
		self.nested_call()?.resolve_def(def)
	}

	/// Resolves another trait as a string.
	pub fn get_str(&self, trait_id: &str) -> Option<String> {
		match self.get(trait_id)? {
			Value::String(s) => Some(s),
			_ => None,
		}
	}

	/// Resolves another trait as a number.
	pub fn get_f64(&self, trait_id: &str) -> Option<f64> {
		self.get(trait_id)?.as_f64()
	}

	/// Resolves `trait_id` with the layered algorithm, ignoring its custom resolver.
	///
	/// Custom resolvers use this to fall back to stored values.
	pub fn layered(&self, trait_id: &str) -> Option<Value> {
		let def = self.schema.get(trait_id)?;
		self.nested_call()?.layered_def(def)
	}

	fn nested_call(&self) -> Option<Self> {
		if self.depth >= MAX_DEPTH {
			tracing::warn!(
				domain = "traits",
				schema = self.schema.name(),
				depth = self.depth,
				"resolution depth exceeded; treating value as undefined"
			);
			return None;
		}
		Some(Self {
			depth: self.depth + 1,
			..*self
		})
	}

	fn resolve_def(&self, def: &TraitDef) -> Option<Value> {
		match def.resolver {
			Some(resolver) => resolver(self),
			None => self.layered_def(def),
		}
	}

	fn layered_def(&self, def: &TraitDef) -> Option<Value> {
		let merged = match &def.kind {
			TraitKind::Nested(nested) => self.merge_nested(def.id, nested),
			kind => merge_values(kind, self.raw_values(def.id).map(|(_, v)| v)),
		};
		merged.or_else(|| def.default.clone())
	}

	/// Raw values of `trait_id` from every visible stratum, top to bottom.
	///
	/// Lazy, so override resolution never evaluates derived strata below the winner.
	fn raw_values<'t>(&self, trait_id: &'t str) -> impl Iterator<Item = (&'a Stratum, Cow<'a, Value>)> + use<'a, 't> {
		let ctx = *self;
		self.view.iter().filter_map(move |(index, stratum)| match stratum.content() {
			StratumContent::Values(values) => values.get(trait_id).map(|v| (stratum, Cow::Borrowed(v))),
			StratumContent::Derived(derivation) => {
				let sub = Self {
					view: ctx.view.for_derivation(index),
					..ctx.nested_call()?
				};
				derivation.derive(trait_id, &sub).map(|v| (stratum, Cow::Owned(v)))
			}
		})
	}

	/// Builds the nested stack from each stratum's nested object and resolves
	/// every nested trait over it.
	fn merge_nested(&self, trait_id: &str, nested: &TraitSchema) -> Option<Value> {
		let mut entries = Vec::new();
		for (seq, (stratum, value)) in self.raw_values(trait_id).enumerate() {
			match value.as_ref() {
				Value::Object(map) => entries.push(StackEntry {
					rank: Rank::Middle(seq as u64),
					stratum: Arc::new(Stratum::new(stratum.owner(), stratum.name_arc().clone(), map.clone())),
				}),
				Value::Null if entries.is_empty() => return Some(Value::Null),
				_ => {}
			}
		}
		if entries.is_empty() {
			return None;
		}

		let inner = ResolveCtx {
			schema: nested,
			view: StackView::new(&entries),
			depth: self.depth,
		};
		let mut out = Map::new();
		for def in nested.iter() {
			if let Some(value) = inner.resolve_def(def) {
				out.insert(def.id.to_string(), value);
			}
		}
		Some(Value::Object(out))
	}
}

/// Resolves a trait by id; `None` for undeclared ids or undefined values.
pub fn resolve(schema: &TraitSchema, view: StackView<'_>, trait_id: &str) -> Option<Value> {
	let def = schema.get(trait_id)?;
	resolve_def(schema, view, def)
}

/// Resolves a trait declaration over a view.
pub fn resolve_def(schema: &TraitSchema, view: StackView<'_>, def: &TraitDef) -> Option<Value> {
	ResolveCtx::new(schema, view).resolve_def(def)
}

fn merge_values<'v>(kind: &TraitKind, mut values: impl Iterator<Item = Cow<'v, Value>>) -> Option<Value> {
	match kind {
		TraitKind::Array {
			merge: ArrayMerge::Concat { dedup },
			..
		} => concat_arrays(values, dedup),
		TraitKind::Object {
			merge: ObjectMerge::ShallowMerge,
		}
		| TraitKind::Any {
			merge: ObjectMerge::ShallowMerge,
		} => shallow_merge(values),
		_ => values.next().map(Cow::into_owned),
	}
}

/// Concatenates arrays from every stratum, higher strata first.
///
/// A `null` only wins when no stratum defines an array.
fn concat_arrays<'v>(values: impl Iterator<Item = Cow<'v, Value>>, dedup: &DedupKey) -> Option<Value> {
	let mut out: Vec<Value> = Vec::new();
	let mut saw_array = false;
	let mut saw_null = false;
	for value in values {
		match value.as_ref() {
			Value::Array(items) => {
				saw_array = true;
				for item in items {
					if !dedup.is_duplicate(&out, item) {
						out.push(item.clone());
					}
				}
			}
			Value::Null => saw_null = true,
			_ => {}
		}
	}
	if saw_array {
		Some(Value::Array(out))
	} else if saw_null {
		Some(Value::Null)
	} else {
		None
	}
}

/// Unions object keys across strata; higher strata win on conflict.
///
/// A non-object value in the topmost defining stratum wins outright; below an
/// object it is ignored.
fn shallow_merge<'v>(values: impl Iterator<Item = Cow<'v, Value>>) -> Option<Value> {
	let mut merged: Option<Map<String, Value>> = None;
	for value in values {
		if !value.is_object() {
			if merged.is_none() {
				return Some(value.into_owned());
			}
			continue;
		}
		let Some(map) = value.as_object() else {
			continue;
		};
		if let Some(acc) = merged.as_mut() {
			for (key, v) in map {
				acc.entry(key.clone()).or_insert_with(|| v.clone());
			}
		} else {
			merged = Some(map.clone());
		}
	}
	merged.map(Value::Object)
}
