//! Stack change notifications.
//!
//! A model emits exactly one [`StackEvent`] per successful stratum install,
//! replace or remove, after the new stack is published. Subscribers reading the
//! model on receipt therefore observe the change.

use geocat_traits::{ModelId, StratumName};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackChange {
	/// A stratum was added under a new name.
	Installed,
	/// A stratum replaced an existing one of the same name.
	Replaced,
	/// A stratum was removed.
	Removed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackEvent {
	pub model: ModelId,
	pub stratum: StratumName,
	pub change: StackChange,
}

/// Sending half owned by a model.
#[derive(Debug)]
pub(crate) struct EventBus {
	tx: broadcast::Sender<StackEvent>,
}

impl EventBus {
	pub(crate) fn new(capacity: usize) -> Self {
		let (tx, _) = broadcast::channel(capacity.max(1));
		Self { tx }
	}

	pub(crate) fn subscribe(&self) -> broadcast::Receiver<StackEvent> {
		self.tx.subscribe()
	}

	pub(crate) fn emit(&self, event: StackEvent) {
		tracing::trace!(domain = "events", model = %event.model, stratum = %event.stratum, change = ?event.change, "stack event");
		// No receivers is the common case.
		let _ = self.tx.send(event);
	}
}
