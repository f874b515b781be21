#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use geocat_catalog::config::CatalogConfig;
use geocat_catalog::{Capability, ErrorSink, LoadError, LoadFailure, LoadedDocument, ModelRegistry, ModelType, Snapshot, StratumLoader};
use geocat_traits::{Map, TraitDef, Value};
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::Notify;

pub const REMOTE: &str = "remote";
pub const LAYER: &str = "remote-layer";

/// Loader keyed on `url` whose fetches can be held open until released.
#[derive(Default)]
pub struct GatedLoader {
	pub fetches: AtomicUsize,
	pub inputs: Mutex<Vec<String>>,
	pub gated: AtomicBool,
	/// Notified once per fetch that reaches the gate.
	pub started: Notify,
	/// Releases one gated fetch.
	pub release: Notify,
	fail_next: Mutex<Option<String>>,
	extra: Mutex<Map<String, Value>>,
}

impl GatedLoader {
	pub fn gated() -> Arc<Self> {
		let loader = Self::default();
		loader.gated.store(true, Ordering::SeqCst);
		Arc::new(loader)
	}

	pub fn open() -> Arc<Self> {
		Arc::new(Self::default())
	}

	pub fn set_gated(&self, gated: bool) {
		self.gated.store(gated, Ordering::SeqCst);
	}

	pub fn fail_next(&self, reason: &str) {
		*self.fail_next.lock() = Some(reason.to_string());
	}

	/// Adds raw values to every document fetched from now on.
	pub fn with_extra(&self, key: &str, value: Value) {
		self.extra.lock().insert(key.to_string(), value);
	}

	pub fn fetch_count(&self) -> usize {
		self.fetches.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl StratumLoader for GatedLoader {
	fn stratum_name(&self) -> &str {
		REMOTE
	}

	fn input(&self, snapshot: &Snapshot) -> Result<String, LoadError> {
		snapshot.get_str("url").ok_or_else(|| LoadError::MissingInput {
			stratum: REMOTE.to_string(),
			reason: "url is not set".to_string(),
		})
	}

	async fn fetch(&self, input: &str) -> Result<LoadedDocument, LoadError> {
		self.fetches.fetch_add(1, Ordering::SeqCst);
		self.inputs.lock().push(input.to_string());
		if self.gated.load(Ordering::SeqCst) {
			self.started.notify_one();
			self.release.notified().await;
		}

		if let Some(reason) = self.fail_next.lock().take() {
			return Err(LoadError::Fetch {
				input: input.to_string(),
				reason,
			});
		}

		let mut values = Map::new();
		values.insert("name".to_string(), json!(format!("from {input}")));
		values.insert("description".to_string(), json!(input));
		values.extend(self.extra.lock().clone());
		Ok(LoadedDocument {
			document: Arc::new(Value::Object(values.clone())),
			values,
		})
	}
}

/// Records every raised failure.
#[derive(Default)]
pub struct CollectingSink {
	pub failures: Mutex<Vec<String>>,
}

impl CollectingSink {
	pub fn count(&self) -> usize {
		self.failures.lock().len()
	}
}

impl ErrorSink for CollectingSink {
	fn raise(&self, failure: LoadFailure<'_>) {
		self.failures.lock().push(format!("{}/{}: {}", failure.key, failure.stratum, failure.error));
	}
}

/// Registry with one `remote-layer` type served by `loader`.
pub fn registry(loader: Arc<GatedLoader>, sink: Arc<CollectingSink>) -> ModelRegistry {
	let registry = ModelRegistry::new(CatalogConfig::default()).with_sink(sink);
	let ty = ModelType::builder(LAYER)
		.capability(Capability::Url)
		.capability(Capability::Mappable)
		.with_trait(TraitDef::string("layerId").fatal())
		.loader(loader)
		.build()
		.unwrap();
	registry.register_type(ty);
	registry
}

pub fn object(value: Value) -> Map<String, Value> {
	match value {
		Value::Object(map) => map,
		other => panic!("expected object, got {other}"),
	}
}
