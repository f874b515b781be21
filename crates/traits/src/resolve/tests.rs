use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::{Value, json};

use super::*;
use crate::error::StratumError;
use crate::kind::{ElementKind, PrimitiveType};
use crate::stack::{StackOrder, StrataStack};
use crate::stratum::{Derivation, ModelId, names};

const OWNER: ModelId = ModelId::from_u32(7);

fn rectangle() -> Arc<TraitSchema> {
	Arc::new(
		TraitSchema::builder("rectangle")
			.with_trait(TraitDef::number("west").with_default(-180.0))
			.with_trait(TraitDef::number("south").with_default(-90.0))
			.with_trait(TraitDef::number("east").with_default(180.0))
			.with_trait(TraitDef::number("north").with_default(90.0))
			.build()
			.unwrap(),
	)
}

fn label(ctx: &ResolveCtx<'_>) -> Option<Value> {
	let name = ctx.get_str("name")?;
	match ctx.get_str("url") {
		Some(url) => Some(json!(format!("{name} ({url})"))),
		None => Some(json!(name)),
	}
}

fn runaway(ctx: &ResolveCtx<'_>) -> Option<Value> {
	ctx.get("runaway")
}

fn schema() -> TraitSchema {
	TraitSchema::builder("layer")
		.with_trait(TraitDef::string("name").with_default("Unnamed"))
		.with_trait(TraitDef::string("url"))
		.with_trait(TraitDef::string("description").nullable())
		.with_trait(TraitDef::array(
			"keywords",
			ElementKind::Primitive(PrimitiveType::String),
			ArrayMerge::Concat { dedup: DedupKey::Value },
		))
		.with_trait(TraitDef::array("legends", ElementKind::Any, ArrayMerge::Concat { dedup: DedupKey::Field("url") }))
		.with_trait(TraitDef::array("layers", ElementKind::Primitive(PrimitiveType::String), ArrayMerge::Override))
		.with_trait(TraitDef::object("parameters", ObjectMerge::ShallowMerge))
		.with_trait(TraitDef::any("style", ObjectMerge::ShallowMerge))
		.with_trait(TraitDef::nested("rectangle", rectangle()))
		.with_trait(TraitDef::string("label").resolve_with(label))
		.with_trait(TraitDef::string("runaway").resolve_with(runaway))
		.build()
		.unwrap()
}

fn stratum(name: &str, values: Value) -> Arc<Stratum> {
	let Value::Object(map) = values else {
		panic!("stratum values must be an object");
	};
	Arc::new(Stratum::new(OWNER, name, map))
}

fn stack(strata: Vec<Arc<Stratum>>) -> StrataStack {
	strata
		.into_iter()
		.fold(StrataStack::new(Arc::new(StackOrder::default())), |stack, s| stack.installed(s))
}

#[test]
fn override_first_defined_wins() {
	let schema = schema();
	let full = stack(vec![stratum(names::USER, json!({ "name": "A" })), stratum(names::DEFINITION, json!({ "name": "B" }))]);

	assert_eq!(resolve(&schema, full.view(), "name"), Some(json!("A")));

	let without_user = full.removed(names::USER);
	assert_eq!(resolve(&schema, without_user.view(), "name"), Some(json!("B")));

	let bare = without_user.removed(names::DEFINITION);
	assert_eq!(resolve(&schema, bare.view(), "name"), Some(json!("Unnamed")));
	assert_eq!(resolve(&schema, bare.view(), "url"), None);
}

#[test]
fn null_is_distinct_from_undefined() {
	let schema = schema();
	let stack = stack(vec![
		stratum(names::USER, json!({ "description": null })),
		stratum(names::DEFINITION, json!({ "description": "from definition" })),
	]);
	assert_eq!(resolve(&schema, stack.view(), "description"), Some(Value::Null));

	let stack = stack.installed(stratum(names::USER, json!({})));
	assert_eq!(resolve(&schema, stack.view(), "description"), Some(json!("from definition")));
}

#[test]
fn concat_combines_every_stratum_without_duplicates() {
	let schema = schema();
	for (upper, lower) in [("a", "b"), ("b", "a")] {
		let stack = stack(vec![stratum(upper, json!({ "keywords": ["x", "shared"] })), stratum(lower, json!({ "keywords": ["y", "shared"] }))]);
		let Some(Value::Array(items)) = resolve(&schema, stack.view(), "keywords") else {
			panic!("keywords should resolve to an array");
		};
		assert_eq!(items.len(), 3);
		for expected in ["x", "y", "shared"] {
			assert!(items.contains(&json!(expected)), "missing {expected}");
		}
	}
}

#[test]
fn concat_dedups_by_declared_field() {
	let schema = schema();
	let stack = stack(vec![
		stratum(names::USER, json!({ "legends": [{ "url": "a.png", "title": "user" }] })),
		stratum("loaded", json!({ "legends": [{ "url": "a.png", "title": "loaded" }, { "url": "b.png" }, { "title": "no url" }] })),
	]);

	assert_eq!(
		resolve(&schema, stack.view(), "legends"),
		Some(json!([{ "url": "a.png", "title": "user" }, { "url": "b.png" }, { "title": "no url" }]))
	);
}

#[test]
fn override_arrays_take_first_stratum() {
	let schema = schema();
	let stack = stack(vec![stratum(names::USER, json!({ "layers": ["a"] })), stratum(names::DEFINITION, json!({ "layers": ["b", "c"] }))]);
	assert_eq!(resolve(&schema, stack.view(), "layers"), Some(json!(["a"])));
}

#[test]
fn shallow_merge_higher_keys_win() {
	let schema = schema();
	let stack = stack(vec![
		stratum(names::USER, json!({ "parameters": { "styles": "user", "time": "now" } })),
		stratum(names::DEFINITION, json!({ "parameters": { "styles": "default", "format": "png" } })),
	]);
	assert_eq!(
		resolve(&schema, stack.view(), "parameters"),
		Some(json!({ "styles": "user", "time": "now", "format": "png" }))
	);
}

#[test]
fn shallow_merge_topmost_non_object_wins() {
	let schema = schema();
	let stack = stack(vec![stratum(names::USER, json!({ "style": "plain" })), stratum(names::DEFINITION, json!({ "style": { "fill": "red" } }))]);
	assert_eq!(resolve(&schema, stack.view(), "style"), Some(json!("plain")));

	let stack = stack.installed(stratum(names::USER, json!({ "style": { "stroke": "blue" } })));
	assert_eq!(resolve(&schema, stack.view(), "style"), Some(json!({ "stroke": "blue", "fill": "red" })));
}

#[test]
fn nested_resolves_each_field_over_its_own_stack() {
	let schema = schema();
	let stack = stack(vec![
		stratum(names::USER, json!({ "rectangle": { "west": 10.0 } })),
		stratum(names::DEFINITION, json!({ "rectangle": { "west": 0.0, "east": 20.0 } })),
	]);
	assert_eq!(
		resolve(&schema, stack.view(), "rectangle"),
		Some(json!({ "west": 10.0, "south": -90.0, "east": 20.0, "north": 90.0 }))
	);

	let empty = stack.removed(names::USER).removed(names::DEFINITION);
	assert_eq!(resolve(&schema, empty.view(), "rectangle"), None);
}

#[test]
fn custom_resolver_reads_other_traits() {
	let schema = schema();
	let stack = stack(vec![stratum(names::DEFINITION, json!({ "name": "Roads", "url": "roads.json" }))]);
	assert_eq!(resolve(&schema, stack.view(), "label"), Some(json!("Roads (roads.json)")));

	let stack = stack.installed(stratum(names::USER, json!({ "name": "Streets" })));
	assert_eq!(resolve(&schema, stack.view(), "label"), Some(json!("Streets (roads.json)")));
}

#[test]
fn runaway_resolver_is_cut_off() {
	let schema = schema();
	let stack = stack(vec![]);
	assert_eq!(resolve(&schema, stack.view(), "runaway"), None);
}

struct NameFromUrl;

impl Derivation for NameFromUrl {
	fn derive(&self, trait_id: &str, ctx: &ResolveCtx<'_>) -> Option<Value> {
		if trait_id != "name" {
			return None;
		}
		let url = ctx.get_str("url")?;
		let stem = url.rsplit('/').next()?.split('.').next()?.to_string();
		Some(json!(stem))
	}

	fn duplicate(&self, _owner: ModelId) -> Result<Arc<dyn Derivation>, StratumError> {
		Ok(Arc::new(NameFromUrl))
	}
}

/// Reads `name` through the stack, which must not include itself.
struct Echo;

impl Derivation for Echo {
	fn derive(&self, trait_id: &str, ctx: &ResolveCtx<'_>) -> Option<Value> {
		(trait_id == "description").then(|| ctx.get("name")).flatten()
	}

	fn duplicate(&self, _owner: ModelId) -> Result<Arc<dyn Derivation>, StratumError> {
		Ok(Arc::new(Echo))
	}
}

#[test]
fn derived_stratum_computes_from_other_strata() {
	let schema = schema();
	let stack = stack(vec![
		stratum(names::DEFINITION, json!({ "url": "data/roads.geojson" })),
		Arc::new(Stratum::derived(OWNER, names::COMPUTED, Arc::new(NameFromUrl))),
	]);
	assert_eq!(resolve(&schema, stack.view(), "name"), Some(json!("roads")));

	let stack = stack.installed(stratum(names::USER, json!({ "name": "Roads" })));
	assert_eq!(resolve(&schema, stack.view(), "name"), Some(json!("Roads")));
}

#[test]
fn derived_strata_never_read_themselves() {
	let schema = schema();
	let stack = stack(vec![
		Arc::new(Stratum::derived(OWNER, "echo", Arc::new(Echo))),
		Arc::new(Stratum::derived(OWNER, names::COMPUTED, Arc::new(NameFromUrl))),
		stratum(names::DEFINITION, json!({ "url": "a/parks.json" })),
	]);

	// echo sees the computed name below it, but its own description is not visible to itself
	assert_eq!(resolve(&schema, stack.view(), "description"), Some(json!("parks")));
}

#[test]
fn reads_are_idempotent() {
	let schema = schema();
	let stack = stack(vec![
		stratum(names::USER, json!({ "parameters": { "a": 1 }, "keywords": ["k"] })),
		stratum(names::DEFINITION, json!({ "parameters": { "b": 2 }, "keywords": ["j"], "rectangle": { "north": 1.0 } })),
	]);
	for id in ["parameters", "keywords", "rectangle", "name", "label"] {
		assert_eq!(resolve(&schema, stack.view(), id), resolve(&schema, stack.view(), id), "{id}");
	}
}

#[test]
fn unknown_traits_resolve_to_none() {
	let schema = schema();
	let stack = stack(vec![stratum(names::USER, json!({ "bogus": 1 }))]);
	assert_eq!(resolve(&schema, stack.view(), "bogus"), None);
}

#[test]
fn layered_skips_custom_resolver() {
	let schema = schema();
	let stack = stack(vec![stratum(names::USER, json!({ "name": "N", "label": "stored" }))]);
	let ctx = ResolveCtx::new(&schema, stack.view());
	assert_eq!(ctx.layered("label"), Some(json!("stored")));
	assert_eq!(ctx.get("label"), Some(json!("N")));
}
