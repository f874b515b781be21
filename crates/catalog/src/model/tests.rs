use std::sync::Arc;

use geocat_traits::{Derivation, ModelId, ResolveCtx, StratumError, TraitDef, names};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tokio::sync::broadcast::error::TryRecvError;

use super::*;
use crate::capability::Capability;

struct Upper;

impl Derivation for Upper {
	fn derive(&self, trait_id: &str, ctx: &ResolveCtx<'_>) -> Option<Value> {
		(trait_id == "attribution").then(|| ctx.get_str("name")).flatten().map(|n| json!(n.to_uppercase()))
	}

	fn duplicate(&self, _owner: ModelId) -> std::result::Result<Arc<dyn Derivation>, StratumError> {
		Ok(Arc::new(Upper))
	}
}

fn layer_type() -> Arc<ModelType> {
	Arc::new(
		ModelType::builder("layer")
			.capability(Capability::Url)
			.capability(Capability::Mappable)
			.with_trait(TraitDef::string("name").with_default("Unnamed"))
			.with_trait(TraitDef::string("layerId").fatal())
			.with_trait(TraitDef::string("attribution").nullable())
			.derived(names::COMPUTED, Arc::new(Upper))
			.build()
			.unwrap(),
	)
}

fn model() -> Model {
	Model::new(ModelId::from_u32(1), "layer-1", layer_type(), ModelOptions::default())
}

fn object(value: Value) -> Map<String, Value> {
	match value {
		Value::Object(map) => map,
		other => panic!("expected object, got {other}"),
	}
}

#[test]
fn bare_model_holds_only_derived_strata() {
	let model = model();
	assert_eq!(model.strata(), [StratumName::from(names::COMPUTED)]);
	assert_eq!(model.get("name"), Some(json!("Unnamed")));
	assert_eq!(model.get("url"), None);
}

#[test]
fn override_resolution_follows_stack_order() {
	let model = model();
	model.install_values(names::USER, &object(json!({ "name": "A" }))).unwrap();
	model.install_values(names::DEFAULTS, &object(json!({ "name": "B" }))).unwrap();
	assert_eq!(model.get("name"), Some(json!("A")));

	assert!(model.remove_stratum(names::USER));
	assert_eq!(model.get("name"), Some(json!("B")));

	assert!(model.remove_stratum(names::DEFAULTS));
	assert_eq!(model.get("name"), Some(json!("Unnamed")));
	assert!(!model.remove_stratum(names::DEFAULTS));
}

#[test]
fn combine_resolution_spans_all_strata() {
	let model = model();
	model.install_values("a", &object(json!({ "keywords": ["x", "both"] }))).unwrap();
	model.install_values("b", &object(json!({ "keywords": ["y", "both"] }))).unwrap();
	assert_eq!(model.get("keywords"), Some(json!(["x", "both", "y"])));

	let reversed = self::model();
	reversed.install_values("b", &object(json!({ "keywords": ["y", "both"] }))).unwrap();
	reversed.install_values("a", &object(json!({ "keywords": ["x", "both"] }))).unwrap();
	assert_eq!(reversed.get("keywords"), Some(json!(["y", "both", "x"])));
}

#[test]
fn derived_stratum_tracks_lower_strata() {
	let model = model();
	assert_eq!(model.get("attribution"), Some(json!("UNNAMED")));
	model.set_trait(names::DEFINITION, "name", &json!("roads")).unwrap();
	assert_eq!(model.get("attribution"), Some(json!("ROADS")));
	model.set_trait(names::USER, "attribution", &json!(null)).unwrap();
	assert_eq!(model.get("attribution"), Some(Value::Null));
}

#[test]
fn warnings_drop_properties_but_keep_the_stratum() {
	let model = model();
	let diagnostics = model
		.install_values(names::DEFINITION, &object(json!({ "name": 3, "url": "a.json", "colour": "red" })))
		.unwrap();

	assert_eq!(diagnostics.len(), 2);
	assert!(diagnostics.mentions("name"));
	assert_eq!(model.get("url"), Some(json!("a.json")));
	assert_eq!(model.get("name"), Some(json!("Unnamed")));
}

#[test]
fn fatal_errors_reject_the_whole_stratum() {
	let model = model();
	model.install_values(names::DEFINITION, &object(json!({ "url": "old.json" }))).unwrap();

	let err = model
		.install_values(names::DEFINITION, &object(json!({ "url": "new.json", "layerId": 7 })))
		.unwrap_err();
	assert!(matches!(err, CatalogError::Invalid(ref e) if e.trait_id() == "layerId"));
	assert_eq!(model.get("url"), Some(json!("old.json")));
}

#[test]
fn set_and_unset_trait() {
	let model = model();
	assert!(matches!(model.set_trait(names::USER, "bogus", &json!(1)), Err(CatalogError::UnknownTrait { .. })));
	assert!(matches!(model.set_trait(names::USER, "opacity", &json!(3)), Err(CatalogError::Invalid(_))));

	model.set_trait(names::USER, "opacity", &json!(0.25)).unwrap();
	model.set_trait(names::USER, "show", &json!(false)).unwrap();
	assert_eq!(model.get_f64("opacity"), Some(0.25));

	assert!(model.unset_trait(names::USER, "opacity").unwrap());
	assert!(!model.unset_trait(names::USER, "opacity").unwrap());
	assert!(!model.unset_trait("missing", "opacity").unwrap());
	assert_eq!(model.get_f64("opacity"), Some(0.8));
	assert_eq!(model.get_bool("show"), Some(false));
}

#[test]
fn derived_strata_are_not_writable() {
	let model = model();
	let err = model.set_trait(names::COMPUTED, "name", &json!("x")).unwrap_err();
	assert!(matches!(err, CatalogError::Stratum(StratumError::NotWritable(_))));
}

#[test]
fn foreign_strata_are_rejected() {
	let model = model();
	let stranger = Arc::new(Stratum::new(ModelId::from_u32(99), names::USER, Map::new()));
	assert!(matches!(model.install_stratum(stranger), Err(CatalogError::ForeignStratum { .. })));
	assert!(model.stratum(names::USER).is_none());
}

#[test]
fn one_event_per_publication() {
	let model = model();
	let mut events = model.subscribe();

	model.set_trait(names::USER, "name", &json!("a")).unwrap();
	model.set_trait(names::USER, "name", &json!("b")).unwrap();
	model.remove_stratum(names::USER);
	model.remove_stratum(names::USER);
	model.unset_trait(names::DEFINITION, "name").unwrap();

	let changes: Vec<_> = std::iter::from_fn(|| events.try_recv().ok()).collect();
	assert_eq!(
		changes.iter().map(|e| e.change).collect::<Vec<_>>(),
		[StackChange::Installed, StackChange::Replaced, StackChange::Removed]
	);
	assert!(changes.iter().all(|e| e.model == model.id() && &*e.stratum == names::USER));
	assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
}

#[test]
fn snapshots_are_isolated_from_later_installs() {
	let model = model();
	model.set_trait(names::USER, "name", &json!("before")).unwrap();
	let pinned = model.snapshot();
	model.set_trait(names::USER, "name", &json!("after")).unwrap();

	assert_eq!(pinned.get("name"), Some(json!("before")));
	assert_eq!(model.get("name"), Some(json!("after")));
}

#[test]
fn reads_are_idempotent() {
	let model = model();
	model.install_values(names::DEFINITION, &object(json!({ "keywords": ["k"], "rectangle": { "west": 1.0 } }))).unwrap();
	assert_eq!(model.resolved(), model.resolved());
}

#[test]
fn duplicate_is_independent() {
	let original = model();
	original.set_trait(names::DEFINITION, "name", &json!("roads")).unwrap();

	let copy = original.duplicate(ModelId::from_u32(2), "layer-2").unwrap();
	assert_eq!(copy.resolved(), original.resolved());
	assert_eq!(copy.strata(), original.strata());
	assert!(copy.stratum(names::DEFINITION).unwrap().owner() == ModelId::from_u32(2));

	copy.set_trait(names::DEFINITION, "name", &json!("rivers")).unwrap();
	copy.set_trait(names::USER, "opacity", &json!(0.1)).unwrap();
	assert_eq!(original.get("name"), Some(json!("roads")));
	assert_eq!(original.get("attribution"), Some(json!("ROADS")));
	assert_eq!(copy.get("attribution"), Some(json!("RIVERS")));
	assert_eq!(original.get_f64("opacity"), Some(0.8));
}

#[test]
fn capability_views() {
	let model = model();
	model
		.install_values(
			names::DEFINITION,
			&object(json!({
				"url": "roads.json",
				"opacity": 0.5,
				"rectangle": { "west": -10.0, "north": 45.0 },
				"legends": [{ "url": "a.png" }],
			})),
		)
		.unwrap();
	model.install_values(names::USER, &object(json!({ "legends": [{ "url": "a.png", "title": "dup" }, { "url": "b.png" }] }))).unwrap();

	assert_eq!(model.url(), Some("roads.json".to_string()));
	assert!(model.group().is_none());

	let mappable = model.mappable().unwrap();
	assert!(mappable.show());
	assert_eq!(mappable.opacity(), 0.5);
	assert_eq!(
		mappable.rectangle(),
		Some(Rectangle {
			west: Some(-10.0),
			north: Some(45.0),
			..Rectangle::default()
		})
	);
	assert_eq!(mappable.legends(), [json!({ "url": "a.png", "title": "dup" }), json!({ "url": "b.png" })]);
}
