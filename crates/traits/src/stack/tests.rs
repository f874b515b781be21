use serde_json::{Map, json};

use super::*;

const OWNER: ModelId = ModelId::from_u32(1);

fn stratum(name: &str) -> Arc<Stratum> {
	Arc::new(Stratum::new(OWNER, name, Map::new()))
}

fn stack() -> StrataStack {
	StrataStack::new(Arc::new(StackOrder::default()))
}

#[test]
fn bands_order_top_middle_bottom() {
	let stack = stack()
		.installed(stratum(names::DEFAULTS))
		.installed(stratum("capabilities"))
		.installed(stratum(names::DEFINITION))
		.installed(stratum(names::USER))
		.installed(stratum(names::COMPUTED));

	let order: Vec<_> = stack.names().collect();
	assert_eq!(order, ["user", "definition", "capabilities", "computed", "defaults"]);
}

#[test]
fn middle_band_keeps_installation_order() {
	let stack = stack().installed(stratum("first")).installed(stratum("second")).installed(stratum("third"));
	assert_eq!(stack.names().collect::<Vec<_>>(), ["first", "second", "third"]);
}

#[test]
fn replacing_keeps_rank() {
	let stack = stack().installed(stratum("first")).installed(stratum("second"));
	let mut values = Map::new();
	values.insert("name".to_string(), json!("replaced"));
	let stack = stack.installed(Arc::new(Stratum::new(OWNER, "first", values)));

	assert_eq!(stack.names().collect::<Vec<_>>(), ["first", "second"]);
	assert_eq!(stack.get("first").unwrap().raw("name"), Some(&json!("replaced")));
}

#[test]
fn installing_returns_new_stack_and_leaves_old_untouched() {
	let before = stack().installed(stratum(names::DEFINITION));
	let after = before.installed(stratum(names::USER));
	assert_eq!(before.len(), 1);
	assert_eq!(after.len(), 2);
}

#[test]
fn removed_and_retained() {
	let stack = stack().installed(stratum(names::USER)).installed(stratum(names::DEFINITION)).installed(stratum("loaded"));
	assert!(!stack.removed(names::USER).contains(names::USER));

	let kept = stack.retained(|s| s.name() != "loaded");
	assert_eq!(kept.names().collect::<Vec<_>>(), ["user", "definition"]);
}

#[test]
fn custom_order() {
	let order = Arc::new(StackOrder::new(["override", "user"], ["defaults"]));
	let stack = StrataStack::new(order).installed(stratum("user")).installed(stratum("override"));
	assert_eq!(stack.names().collect::<Vec<_>>(), ["override", "user"]);
}

#[test]
fn rebind_changes_owner_only() {
	let stack = stack().installed(stratum(names::DEFINITION)).installed(stratum("loaded"));
	let copy = stack.rebind(ModelId::from_u32(9)).unwrap();

	assert_eq!(copy.names().collect::<Vec<_>>(), stack.names().collect::<Vec<_>>());
	assert!(copy.iter().all(|s| s.owner() == ModelId::from_u32(9)));
	assert!(stack.iter().all(|s| s.owner() == OWNER));
}
