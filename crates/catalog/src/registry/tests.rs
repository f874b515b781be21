use geocat_traits::{Derivation, ResolveCtx, StratumError, Value, names};
use pretty_assertions::assert_eq;
use serde_json::json;

use super::*;
use crate::builtins::{self, GROUP, JSON_LAYER};

/// Derivation bound to one owner that refuses to be copied.
struct Pinned;

impl Derivation for Pinned {
	fn derive(&self, _trait_id: &str, _ctx: &ResolveCtx<'_>) -> Option<Value> {
		None
	}

	fn duplicate(&self, _owner: ModelId) -> std::result::Result<Arc<dyn Derivation>, StratumError> {
		Err(StratumError::DuplicateUnsupported {
			name: names::COMPUTED.to_string(),
			reason: "bound to its owner".to_string(),
		})
	}
}

fn registry() -> ModelRegistry {
	let registry = ModelRegistry::default();
	builtins::register(&registry, None).unwrap();
	registry
}

#[test]
fn create_assigns_fresh_ids() {
	let registry = registry();
	let roads = registry.create(JSON_LAYER, "roads").unwrap();
	let rivers = registry.create(JSON_LAYER, "rivers").unwrap();

	assert_ne!(roads.id(), rivers.id());
	assert_eq!(registry.len(), 2);
	assert!(Arc::ptr_eq(&registry.get(roads.id()).unwrap(), &roads));
	assert!(Arc::ptr_eq(&registry.find("rivers").unwrap(), &rivers));
}

#[test]
fn create_rejects_unknown_types_and_taken_ids() {
	let registry = registry();
	registry.create(JSON_LAYER, "roads").unwrap();

	assert!(matches!(registry.create("wms", "x"), Err(CatalogError::UnknownType(t)) if t == "wms"));
	assert!(matches!(registry.create(GROUP, "roads"), Err(CatalogError::DuplicateId(k)) if k == "roads"));
	assert_eq!(registry.len(), 1);
}

#[test]
fn remove_frees_the_catalog_id() {
	let registry = registry();
	let roads = registry.create(JSON_LAYER, "roads").unwrap();

	assert!(registry.remove(roads.id()).is_some());
	assert!(registry.remove(roads.id()).is_none());
	assert!(registry.find("roads").is_none());
	assert!(registry.is_empty());
	registry.create(JSON_LAYER, "roads").unwrap();
}

#[test]
fn duplicate_registers_an_independent_copy() {
	let registry = registry();
	let roads = registry.create(JSON_LAYER, "roads").unwrap();
	roads.set_trait(names::DEFINITION, "url", &json!("roads.json")).unwrap();

	let copy = registry.duplicate(&roads, "roads-copy").unwrap();
	assert_ne!(copy.id(), roads.id());
	assert_eq!(copy.key(), "roads-copy");
	assert_eq!(copy.url(), roads.url());
	assert!(matches!(registry.duplicate(&roads, "roads"), Err(CatalogError::DuplicateId(_))));

	copy.set_trait(names::USER, "url", &json!("other.json")).unwrap();
	assert_eq!(roads.url(), Some("roads.json".to_string()));
	assert_eq!(registry.models().iter().map(|m| m.key().to_string()).collect::<Vec<_>>(), ["roads", "roads-copy"]);
}

#[test]
fn group_members_resolve_through_the_registry() {
	let registry = registry();
	let group = registry.create(GROUP, "transport").unwrap();
	registry.create(JSON_LAYER, "roads").unwrap();
	registry.create(JSON_LAYER, "rail").unwrap();
	group.set_trait(names::DEFINITION, "members", &json!(["rail", "ferries", "roads"])).unwrap();

	let view = group.group().unwrap();
	assert_eq!(view.members(), ["rail", "ferries", "roads"]);
	assert!(!view.is_open());
	assert_eq!(view.resolve(&registry).iter().map(|m| m.key().to_string()).collect::<Vec<_>>(), ["rail", "roads"]);

	// Members override rather than concatenate.
	group.set_trait(names::USER, "members", &json!(["roads"])).unwrap();
	assert_eq!(group.group().unwrap().members(), ["roads"]);
}

#[test]
fn models_use_the_configured_event_capacity() {
	let config = CatalogConfig::parse("[events]\ncapacity = 1\n").unwrap();
	let registry = ModelRegistry::new(config);
	builtins::register(&registry, None).unwrap();
	let model = registry.create(GROUP, "g").unwrap();

	let mut events = model.subscribe();
	model.set_trait(names::USER, "isOpen", &json!(true)).unwrap();
	model.set_trait(names::USER, "isOpen", &json!(false)).unwrap();
	assert!(matches!(events.try_recv(), Err(tokio::sync::broadcast::error::TryRecvError::Lagged(1))));
}

#[test]
fn duplicate_of_a_pinned_derivation_registers_nothing() {
	let registry = registry();
	registry.register_type(ModelType::builder("pinned").derived(names::COMPUTED, Arc::new(Pinned)).build().unwrap());
	let original = registry.create("pinned", "original").unwrap();
	let before = registry.len();

	let error = registry.duplicate(&original, "copy").unwrap_err();
	assert!(matches!(error, CatalogError::Stratum(StratumError::DuplicateUnsupported { ref name, .. }) if name == names::COMPUTED));
	assert_eq!(registry.len(), before);
	assert!(registry.find("copy").is_none());
	assert!(Arc::ptr_eq(&registry.find("original").unwrap(), &original));

	let copy = registry.create("pinned", "copy").unwrap();
	assert_ne!(copy.id(), original.id());
}
