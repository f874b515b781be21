//! Loadable-stratum lifecycle on [`Model`].
//!
//! # Singleflight protocol
//!
//! 1. Compute the loader input from the current stack.
//! 2. Under the slot lock: join an in-flight load for the same input, return
//!    `Cached` for an installed result of the same input, or register a new
//!    in-flight slot and spawn its fetch task.
//! 3. The task fetches, then re-checks that its slot is still current and
//!    that the input still matches before publishing. The slot lock is never
//!    held while loader or sink code runs.
//! 4. Every caller awaits the shared outcome on the slot's `watch` channel.
//!
//! The fetch runs on its own task, so a caller that stops awaiting does not
//! cancel the load for the others.

use std::convert::Infallible;
use std::sync::Arc;

use geocat_traits::{Diagnostics, StrataStack, Stratum, StratumName};
use tokio::sync::watch;

use super::{Model, Snapshot};
use crate::error::LoadError;
use crate::load::{self, LoadFailure, LoadOutcome, LoadState, LoadedDocument, SharedOutcome, Slot, StratumLoader};

enum Plan {
	Join(watch::Receiver<Option<SharedOutcome>>),
	Cached,
	Start,
}

impl Model {
	/// Requests the named loadable stratum.
	///
	/// Concurrent requests for the same input coalesce into one fetch. Errors
	/// are returned to every waiting caller and, if configured, raised to the
	/// error sink once per fetch. A missing loader or loader input is only
	/// returned to the caller; nothing was fetched, so nothing is raised.
	pub async fn load(self: &Arc<Self>, stratum: &str) -> SharedOutcome {
		let Some(loader) = self.ty.loader(stratum).cloned() else {
			return Err(Arc::new(LoadError::NoLoader(stratum.to_string())));
		};
		let input = match loader.input(&self.snapshot()) {
			Ok(input) => input,
			Err(error) => {
				tracing::debug!(domain = "load", model = %self.id, stratum, error = %error, "no loader input");
				return Err(Arc::new(error));
			}
		};

		let rx = {
			let mut loads = self.loads.lock();
			let plan = match loads.get(stratum) {
				Some(Slot::Loading { input: current, rx, .. }) if *current == input => Plan::Join(rx.clone()),
				Some(Slot::Loaded { input: current }) if *current == input && self.stack.load().contains(stratum) => Plan::Cached,
				Some(Slot::Failed { input: current, .. }) if *current == input => {
					tracing::debug!(domain = "load", model = %self.id, stratum, "retrying failed load");
					Plan::Start
				}
				Some(Slot::Loading { input: current, .. } | Slot::Loaded { input: current } | Slot::Failed { input: current, .. }) => {
					tracing::debug!(domain = "load", model = %self.id, stratum, from = %current, to = %input, "loader input changed");
					Plan::Start
				}
				None => Plan::Start,
			};
			match plan {
				Plan::Join(rx) => {
					tracing::trace!(domain = "load", model = %self.id, stratum, "joining in-flight load");
					rx
				}
				Plan::Cached => return Ok(LoadOutcome::Cached),
				Plan::Start => {
					let name: StratumName = stratum.into();
					let (id, tx, rx) = loads.begin(name.clone(), input.clone());
					self.spawn_fetch(loader, name, id, input, tx);
					rx
				}
			}
		};

		load::wait(rx, stratum).await
	}

	/// Requests every loadable stratum of the model type concurrently.
	pub async fn load_all(self: &Arc<Self>) -> Vec<(StratumName, SharedOutcome)> {
		let pending: Vec<_> = self
			.ty
			.loaders()
			.iter()
			.map(|loader| {
				let name: StratumName = loader.stratum_name().into();
				let model = Arc::clone(self);
				let handle = tokio::spawn({
					let name = name.clone();
					async move { model.load(&name).await }
				});
				(name, handle)
			})
			.collect();

		let mut outcomes = Vec::with_capacity(pending.len());
		for (name, handle) in pending {
			let outcome = handle.await.unwrap_or_else(|_| Err(Arc::new(LoadError::Aborted(name.to_string()))));
			outcomes.push((name, outcome));
		}
		outcomes
	}

	/// Forgets the lifecycle state of `stratum` so the next request fetches again.
	///
	/// An installed stratum stays installed until the new load replaces it. A
	/// load in flight is discarded as superseded when it completes.
	pub fn invalidate(&self, stratum: &str) {
		if self.loads.lock().remove(stratum).is_some() {
			tracing::debug!(domain = "load", model = %self.id, stratum, "load state invalidated");
		}
	}

	/// Lifecycle state of `stratum` for the loader input the stack declares now.
	///
	/// A load that finished or failed for an earlier input reports `Absent`;
	/// its stratum stays installed until a request replaces it.
	pub fn load_state(&self, stratum: &str) -> LoadState {
		let current = self.current_input(stratum);
		let loads = self.loads.lock();
		match loads.get(stratum) {
			Some(Slot::Loaded { input } | Slot::Failed { input, .. }) if current.as_ref().is_some_and(|c| c.as_deref() != Some(input.as_str())) => LoadState::Absent,
			_ => loads.state(stratum),
		}
	}

	/// Error of the most recent failed load of `stratum`, if it is still failed
	/// for the current loader input.
	pub fn last_load_error(&self, stratum: &str) -> Option<Arc<LoadError>> {
		if self.load_state(stratum) != LoadState::Failed {
			return None;
		}
		self.loads.lock().last_error(stratum)
	}

	/// Input the loader of `stratum` would fetch now; `None` without a loader.
	fn current_input(&self, stratum: &str) -> Option<Option<String>> {
		let loader = self.ty.loader(stratum)?;
		Some(loader.input(&self.snapshot()).ok())
	}

	fn spawn_fetch(self: &Arc<Self>, loader: Arc<dyn StratumLoader>, name: StratumName, id: u64, input: String, tx: watch::Sender<Option<SharedOutcome>>) {
		tracing::debug!(domain = "load", model = %self.id, stratum = %name, input = %input, "load started");
		let model = Arc::clone(self);
		tokio::spawn(async move {
			let guard = FetchGuard {
				model: Arc::clone(&model),
				name: name.clone(),
				id,
				tx,
				completed: false,
			};
			let fetched = loader.fetch(&input).await;
			let outcome = model.finish_load(&*loader, &name, id, input, fetched);
			guard.complete(outcome);
		});
	}

	/// Installs a fetched result if it is still wanted.
	///
	/// The slot lock is only taken for bookkeeping. Loader input checks, the
	/// error sink and logging run without it so they may read the model.
	fn finish_load(&self, loader: &dyn StratumLoader, name: &StratumName, id: u64, input: String, fetched: Result<LoadedDocument, LoadError>) -> SharedOutcome {
		if !self.loads.lock().is_current(name, id) {
			tracing::warn!(domain = "load", model = %self.id, stratum = %name, input = %input, "discarding result of superseded load");
			return Ok(LoadOutcome::Superseded);
		}
		if !self.input_matches(loader, &self.stack.load_full(), &input) {
			self.release_slot(name, id);
			tracing::warn!(domain = "load", model = %self.id, stratum = %name, input = %input, "discarding result for stale input");
			return Ok(LoadOutcome::Superseded);
		}

		let prepared = fetched.and_then(|doc| {
			let mut diagnostics = Diagnostics::new();
			let values = self.ty.schema().validate_values(&doc.values, &mut diagnostics)?;
			Ok((values, doc.document, diagnostics))
		});
		let (values, document, diagnostics) = match prepared {
			Ok(prepared) => prepared,
			Err(error) => {
				let error = Arc::new(error);
				let recorded = self.settle_slot(
					name,
					id,
					Slot::Failed {
						input,
						error: error.clone(),
					},
				);
				if !recorded {
					return Ok(LoadOutcome::Superseded);
				}
				self.raise(name, &error);
				return Err(error);
			}
		};

		let stratum = Arc::new(Stratum::loaded(self.id, name.clone(), values, input.clone(), document));
		let published = self.commit(name, |cur| Ok::<_, Infallible>(self.input_matches(loader, cur, &input).then(|| cur.installed(stratum.clone()))));
		if !matches!(published, Ok(Some(_))) {
			self.release_slot(name, id);
			tracing::warn!(domain = "load", model = %self.id, stratum = %name, input = %input, "input changed during install; result discarded");
			return Ok(LoadOutcome::Superseded);
		}

		self.settle_slot(name, id, Slot::Loaded { input });
		for warning in &diagnostics {
			tracing::warn!(domain = "load", model = %self.id, stratum = %name, warning = %warning, "dropped invalid property");
		}
		Ok(LoadOutcome::Loaded { diagnostics })
	}

	/// Replaces the slot of load `id` if it is still current.
	fn settle_slot(&self, name: &StratumName, id: u64, slot: Slot) -> bool {
		let mut loads = self.loads.lock();
		if !loads.is_current(name, id) {
			return false;
		}
		loads.set(name.clone(), slot);
		true
	}

	fn release_slot(&self, name: &StratumName, id: u64) {
		let mut loads = self.loads.lock();
		if loads.is_current(name, id) {
			loads.remove(name);
		}
	}

	fn input_matches(&self, loader: &dyn StratumLoader, stack: &Arc<StrataStack>, input: &str) -> bool {
		let snapshot = Snapshot::new(self.ty.clone(), stack.clone());
		loader.input(&snapshot).is_ok_and(|current| current == input)
	}

	fn raise(&self, stratum: &str, error: &LoadError) {
		if !self.options.raise_failures {
			tracing::debug!(domain = "load", model = %self.id, stratum, error = %error, "load failed");
			return;
		}
		self.options.sink.raise(LoadFailure {
			model: self.id,
			key: &self.key,
			stratum,
			error,
		});
	}
}

/// Publishes an outcome to waiters even if the fetch task panics or is dropped.
struct FetchGuard {
	model: Arc<Model>,
	name: StratumName,
	id: u64,
	tx: watch::Sender<Option<SharedOutcome>>,
	completed: bool,
}

impl FetchGuard {
	fn complete(mut self, outcome: SharedOutcome) {
		self.completed = true;
		let _ = self.tx.send(Some(outcome));
	}
}

impl Drop for FetchGuard {
	fn drop(&mut self) {
		if self.completed {
			return;
		}
		self.model.release_slot(&self.name, self.id);
		tracing::warn!(domain = "load", model = %self.model.id, stratum = %self.name, "load task ended without a result");
		let _ = self.tx.send(Some(Err(Arc::new(LoadError::Aborted(self.name.to_string())))));
	}
}
