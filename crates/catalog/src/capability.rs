//! Capabilities a model type may support.
//!
//! A capability contributes a [`TraitSet`] to the model schema and unlocks a
//! typed view on [`Model`](crate::Model) (`url()`, `group()`, `mappable()`).
//! Capability checks are set membership, never type inspection.

use std::sync::Arc;

use geocat_traits::{ArrayMerge, DedupKey, ElementKind, ObjectMerge, PrimitiveType, TraitDef, TraitSchema, TraitSet, Value};

/// A single model capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
	/// Data is fetched from a URL.
	Url,
	/// Holds an ordered list of member models.
	Group,
	/// Can be shown on a map.
	Mappable,
}

bitflags::bitflags! {
	/// A set of model capabilities.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
	pub struct Capabilities: u32 {
		/// Data is fetched from a URL.
		const URL = 1 << 0;
		/// Holds an ordered list of member models.
		const GROUP = 1 << 1;
		/// Can be shown on a map.
		const MAPPABLE = 1 << 2;
	}
}

impl Capability {
	pub const ALL: [Capability; 3] = [Self::Url, Self::Group, Self::Mappable];

	/// Returns the bitflag for this capability.
	pub const fn as_set(self) -> Capabilities {
		match self {
			Self::Url => Capabilities::URL,
			Self::Group => Capabilities::GROUP,
			Self::Mappable => Capabilities::MAPPABLE,
		}
	}

	pub const fn name(self) -> &'static str {
		match self {
			Self::Url => "url",
			Self::Group => "group",
			Self::Mappable => "mappable",
		}
	}

	/// Traits this capability adds to a schema.
	pub fn trait_set(self) -> TraitSet {
		match self {
			Self::Url => TraitSet::new("url")
				.with_trait(TraitDef::string("url").describe("Location of the source data."))
				.with_trait(TraitDef::boolean("forceProxy").with_default(false).describe("Route requests through the proxy.")),
			Self::Group => TraitSet::new("group")
				.with_trait(
					TraitDef::array("members", ElementKind::Primitive(PrimitiveType::String), ArrayMerge::Override)
						.describe("Catalog ids of member models, in display order."),
				)
				.with_trait(TraitDef::boolean("isOpen").with_default(false)),
			Self::Mappable => TraitSet::new("mappable")
				.with_trait(TraitDef::boolean("show").with_default(true))
				.with_trait(TraitDef::number("opacity").with_default(0.8).validate_with(unit_interval))
				.with_trait(TraitDef::nested("rectangle", rectangle_schema()).describe("Geographic extent in degrees."))
				.with_trait(TraitDef::array(
					"legends",
					ElementKind::Object(legend_schema()),
					ArrayMerge::Concat { dedup: DedupKey::Field("url") },
				)),
		}
	}
}

impl From<Capability> for Capabilities {
	fn from(cap: Capability) -> Self {
		cap.as_set()
	}
}

impl FromIterator<Capability> for Capabilities {
	fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
		let mut set = Capabilities::empty();
		for cap in iter {
			set |= cap.as_set();
		}
		set
	}
}

impl Capabilities {
	/// Iterates the member capabilities in declaration order.
	pub fn capabilities(self) -> impl Iterator<Item = Capability> {
		Capability::ALL.into_iter().filter(move |cap| self.contains(cap.as_set()))
	}
}

/// Traits every model type carries.
pub fn base_traits() -> TraitSet {
	TraitSet::new("catalog-member")
		.with_trait(TraitDef::string("name").describe("Display name."))
		.with_trait(TraitDef::string("description").nullable())
		.with_trait(TraitDef::array(
			"keywords",
			ElementKind::Primitive(PrimitiveType::String),
			ArrayMerge::Concat { dedup: DedupKey::Value },
		))
		.with_trait(TraitDef::array(
			"info",
			ElementKind::Object(info_schema()),
			ArrayMerge::Concat { dedup: DedupKey::Field("name") },
		))
		.with_trait(TraitDef::object("custom", ObjectMerge::ShallowMerge))
}

fn unit_interval(value: &Value) -> Result<(), String> {
	match value.as_f64() {
		Some(n) if (0.0..=1.0).contains(&n) => Ok(()),
		_ => Err("must be within [0, 1]".to_string()),
	}
}

fn latitude(value: &Value) -> Result<(), String> {
	match value.as_f64() {
		Some(n) if (-90.0..=90.0).contains(&n) => Ok(()),
		_ => Err("latitude must be within [-90, 90]".to_string()),
	}
}

/// Schemas below are infallible compositions of fixed declarations.
fn nested(builder: geocat_traits::SchemaBuilder) -> Arc<TraitSchema> {
	match builder.build() {
		Ok(schema) => Arc::new(schema),
		Err(error) => unreachable!("static nested schema is invalid: {error}"),
	}
}

pub(crate) fn rectangle_schema() -> Arc<TraitSchema> {
	nested(
		TraitSchema::builder("rectangle")
			.with_trait(TraitDef::number("west"))
			.with_trait(TraitDef::number("south").validate_with(latitude))
			.with_trait(TraitDef::number("east"))
			.with_trait(TraitDef::number("north").validate_with(latitude)),
	)
}

fn legend_schema() -> Arc<TraitSchema> {
	nested(
		TraitSchema::builder("legend")
			.with_trait(TraitDef::string("title"))
			.with_trait(TraitDef::string("url"))
			.with_trait(TraitDef::string("urlMimeType")),
	)
}

fn info_schema() -> Arc<TraitSchema> {
	nested(
		TraitSchema::builder("info")
			.with_trait(TraitDef::string("name"))
			.with_trait(TraitDef::string("content").nullable()),
	)
}
