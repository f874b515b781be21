//! Loadable strata.
//!
//! A [`StratumLoader`] turns a model's current configuration into a stratum by
//! fetching an external document. The model drives the lifecycle per stratum
//! name:
//!
//! ```text
//! Absent ──request──▶ Loading ──ok──▶ Loaded
//!                       │  ▲            │
//!                       │  └─retry / input changed
//!                       ▼               │
//!                     Failed ◀──────────┘
//! ```
//!
//! # Invariants
//!
//! * Concurrent requests for the same name and input share one fetch; every
//!   caller receives the same [`LoadOutcome`] or error.
//! * A result is installed only if its slot is still current and the loader
//!   input recomputed from the stack being replaced equals the fetched input.
//!   Otherwise it is discarded as [`LoadOutcome::Superseded`].
//! * Failures install nothing; the previous stack is kept.
//! * A `Loaded` or `Failed` slot reports as `Absent` once the loader input
//!   recomputed from the stack no longer matches the slot's input.
//! * Fetch failures reach the error sink once per fetch, never while the slot
//!   lock is held. Errors computing the input are returned to the caller only.
//! * There is no automatic retry. A new request after a failure, or after
//!   [`Model::invalidate`](crate::Model::invalidate), re-enters `Loading`.

use std::sync::Arc;

use async_trait::async_trait;
use geocat_traits::{Diagnostics, Map, StrataStack, StratumName, Value};
use rustc_hash::FxHashMap;
use tokio::sync::watch;

use crate::error::LoadError;
use crate::model::Snapshot;

pub mod file;
pub mod sink;

pub use file::FileLoader;
pub use sink::{ErrorSink, LoadFailure, TracingErrorSink};

/// Produces one named stratum from an external document.
#[async_trait]
pub trait StratumLoader: Send + Sync {
	/// Name of the stratum this loader installs.
	fn stratum_name(&self) -> &str;

	/// Computes the fetch input from the model's resolved traits.
	///
	/// Called before fetching and again before installing; a different answer
	/// on the second call marks the result stale.
	fn input(&self, snapshot: &Snapshot) -> Result<String, LoadError>;

	/// Fetches and parses the document for `input`.
	async fn fetch(&self, input: &str) -> Result<LoadedDocument, LoadError>;
}

/// Raw values extracted from a fetched document.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
	/// Unvalidated trait values; validated against the model schema on install.
	pub values: Map<String, Value>,
	/// The parsed source document, kept on the installed stratum.
	pub document: Arc<Value>,
}

/// Observable state of one loadable stratum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
	Absent,
	Loading,
	Loaded,
	Failed,
}

/// Successful completion of a load request.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
	/// The stratum was fetched and installed.
	Loaded {
		/// Warning-level problems dropped from the loaded values.
		diagnostics: Diagnostics,
	},
	/// The stratum is already installed for the current input.
	Cached,
	/// The result belonged to an input that has since changed and was discarded.
	Superseded,
}

/// Outcome shared by every caller coalesced onto one fetch.
pub type SharedOutcome = Result<LoadOutcome, Arc<LoadError>>;

pub(crate) enum Slot {
	Loading {
		id: u64,
		input: String,
		rx: watch::Receiver<Option<SharedOutcome>>,
	},
	Loaded {
		input: String,
	},
	Failed {
		input: String,
		error: Arc<LoadError>,
	},
}

impl Slot {
	fn state(&self) -> LoadState {
		match self {
			Self::Loading { .. } => LoadState::Loading,
			Self::Loaded { .. } => LoadState::Loaded,
			Self::Failed { .. } => LoadState::Failed,
		}
	}
}

/// Per-model lifecycle bookkeeping, keyed by stratum name.
#[derive(Default)]
pub(crate) struct LoadSlots {
	next_id: u64,
	slots: FxHashMap<StratumName, Slot>,
}

impl LoadSlots {
	/// Marks loaded strata of a duplicated stack as loaded for their recorded input.
	pub(crate) fn from_installed(stack: &StrataStack) -> Self {
		let mut slots = Self::default();
		for stratum in stack.iter() {
			if let Some(input) = stratum.loaded_input() {
				slots.set(stratum.name_arc().clone(), Slot::Loaded { input: input.to_string() });
			}
		}
		slots
	}

	pub(crate) fn state(&self, name: &str) -> LoadState {
		self.slots.get(name).map_or(LoadState::Absent, Slot::state)
	}

	pub(crate) fn get(&self, name: &str) -> Option<&Slot> {
		self.slots.get(name)
	}

	pub(crate) fn last_error(&self, name: &str) -> Option<Arc<LoadError>> {
		match self.slots.get(name)? {
			Slot::Failed { error, .. } => Some(error.clone()),
			_ => None,
		}
	}

	/// Registers a new in-flight load, replacing whatever the slot held.
	pub(crate) fn begin(&mut self, name: StratumName, input: String) -> (u64, watch::Sender<Option<SharedOutcome>>, watch::Receiver<Option<SharedOutcome>>) {
		self.next_id += 1;
		let id = self.next_id;
		let (tx, rx) = watch::channel(None);
		self.slots.insert(
			name,
			Slot::Loading {
				id,
				input,
				rx: rx.clone(),
			},
		);
		(id, tx, rx)
	}

	/// Returns true if `id` is the in-flight load for `name`.
	pub(crate) fn is_current(&self, name: &str, id: u64) -> bool {
		matches!(self.slots.get(name), Some(Slot::Loading { id: current, .. }) if *current == id)
	}

	pub(crate) fn set(&mut self, name: StratumName, slot: Slot) {
		self.slots.insert(name, slot);
	}

	pub(crate) fn remove(&mut self, name: &str) -> Option<Slot> {
		self.slots.remove(name)
	}
}

/// Waits for the shared outcome of an in-flight load.
pub(crate) async fn wait(mut rx: watch::Receiver<Option<SharedOutcome>>, name: &str) -> SharedOutcome {
	loop {
		let outcome = rx.borrow().clone();
		if let Some(outcome) = outcome {
			return outcome;
		}
		if rx.changed().await.is_err() {
			return Err(Arc::new(LoadError::Aborted(name.to_string())));
		}
	}
}
