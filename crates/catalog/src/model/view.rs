//! Typed views for capability traits.

use std::sync::Arc;

use geocat_traits::Value;

use super::{Model, Snapshot};
use crate::capability::Capability;
use crate::registry::ModelRegistry;

impl Model {
	/// Resolved `url`, for models with the URL capability.
	pub fn url(&self) -> Option<String> {
		if !self.has_capability(Capability::Url) {
			return None;
		}
		self.get_str("url")
	}

	pub fn group(&self) -> Option<GroupView<'_>> {
		self.has_capability(Capability::Group).then_some(GroupView { model: self })
	}

	/// Pins one snapshot so every mappable read is consistent.
	pub fn mappable(&self) -> Option<MappableView> {
		self.has_capability(Capability::Mappable).then(|| MappableView { snapshot: self.snapshot() })
	}
}

/// Member list of a group model.
///
/// Members are catalog ids; they resolve through a [`ModelRegistry`] so a
/// group never owns its members.
#[derive(Debug, Clone, Copy)]
pub struct GroupView<'a> {
	model: &'a Model,
}

impl GroupView<'_> {
	pub fn members(&self) -> Vec<String> {
		match self.model.get("members") {
			Some(Value::Array(items)) => items.into_iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
			_ => Vec::new(),
		}
	}

	pub fn is_open(&self) -> bool {
		self.model.get_bool("isOpen").unwrap_or(false)
	}

	/// Looks up members in `registry`, skipping ids it does not know.
	pub fn resolve(&self, registry: &ModelRegistry) -> Vec<Arc<Model>> {
		self.members()
			.into_iter()
			.filter_map(|key| {
				let member = registry.find(&key);
				if member.is_none() {
					tracing::warn!(domain = "catalog", group = self.model.key(), member = %key, "group member not registered");
				}
				member
			})
			.collect()
	}
}

/// Geographic extent in degrees; unset edges are `None`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rectangle {
	pub west: Option<f64>,
	pub south: Option<f64>,
	pub east: Option<f64>,
	pub north: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct MappableView {
	snapshot: Snapshot,
}

impl MappableView {
	pub fn show(&self) -> bool {
		self.snapshot.get_bool("show").unwrap_or(true)
	}

	pub fn opacity(&self) -> f64 {
		self.snapshot.get_f64("opacity").unwrap_or(1.0)
	}

	pub fn rectangle(&self) -> Option<Rectangle> {
		let Value::Object(fields) = self.snapshot.get("rectangle")? else {
			return None;
		};
		let edge = |name: &str| fields.get(name).and_then(Value::as_f64);
		Some(Rectangle {
			west: edge("west"),
			south: edge("south"),
			east: edge("east"),
			north: edge("north"),
		})
	}

	pub fn legends(&self) -> Vec<Value> {
		match self.snapshot.get("legends") {
			Some(Value::Array(items)) => items,
			_ => Vec::new(),
		}
	}
}
