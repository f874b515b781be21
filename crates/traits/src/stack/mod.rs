//! Ordered strata.
//!
//! # Stack order
//!
//! | Band | Members | Order within band |
//! |---|---|---|
//! | top | names listed in [`StackOrder::top`] | list order |
//! | middle | any other name (loaded strata, ad-hoc derived strata) | installation order, earlier ranks higher |
//! | bottom | names listed in [`StackOrder::bottom`] | list order |
//!
//! Re-installing an existing name replaces its stratum in place and keeps its
//! rank. [`StrataStack`] is a value: every mutation returns a new stack, which the
//! owning model publishes with one atomic pointer swap.

use std::sync::Arc;

use crate::error::StratumError;
use crate::stratum::{ModelId, Stratum, StratumName, names};

#[cfg(test)]
mod tests;

/// Fixed band assignment of well-known stratum names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackOrder {
	top: Vec<StratumName>,
	bottom: Vec<StratumName>,
}

impl Default for StackOrder {
	fn default() -> Self {
		Self::new([names::USER, names::OVERRIDE, names::DEFINITION], [names::COMPUTED, names::DEFAULTS])
	}
}

impl StackOrder {
	pub fn new<T, B>(top: T, bottom: B) -> Self
	where
		T: IntoIterator,
		T::Item: Into<StratumName>,
		B: IntoIterator,
		B::Item: Into<StratumName>,
	{
		Self {
			top: top.into_iter().map(Into::into).collect(),
			bottom: bottom.into_iter().map(Into::into).collect(),
		}
	}

	pub fn top(&self) -> &[StratumName] {
		&self.top
	}

	pub fn bottom(&self) -> &[StratumName] {
		&self.bottom
	}

	fn fixed_rank(&self, name: &str) -> Option<Rank> {
		if let Some(i) = self.top.iter().position(|n| &**n == name) {
			return Some(Rank::Top(i));
		}
		self.bottom.iter().position(|n| &**n == name).map(Rank::Bottom)
	}
}

/// Sort key of a stack entry; variant order is band order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Rank {
	Top(usize),
	Middle(u64),
	Bottom(usize),
}

#[derive(Debug, Clone)]
pub(crate) struct StackEntry {
	pub(crate) rank: Rank,
	pub(crate) stratum: Arc<Stratum>,
}

/// Immutable ordered strata, highest priority first.
#[derive(Debug, Clone)]
pub struct StrataStack {
	order: Arc<StackOrder>,
	entries: Vec<StackEntry>,
	next_seq: u64,
}

impl StrataStack {
	pub fn new(order: Arc<StackOrder>) -> Self {
		Self {
			order,
			entries: Vec::new(),
			next_seq: 0,
		}
	}

	pub fn order(&self) -> &Arc<StackOrder> {
		&self.order
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn get(&self, name: &str) -> Option<&Arc<Stratum>> {
		self.entries.iter().find(|e| e.stratum.name() == name).map(|e| &e.stratum)
	}

	pub fn contains(&self, name: &str) -> bool {
		self.get(name).is_some()
	}

	/// Stratum names, top to bottom.
	pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
		self.entries.iter().map(|e| e.stratum.name())
	}

	/// Strata, top to bottom.
	pub fn iter(&self) -> impl Iterator<Item = &Arc<Stratum>> + '_ {
		self.entries.iter().map(|e| &e.stratum)
	}

	/// Returns a stack with `stratum` installed, replacing any stratum of the same name.
	pub fn installed(&self, stratum: Arc<Stratum>) -> StrataStack {
		let mut next = self.clone();
		if let Some(entry) = next.entries.iter_mut().find(|e| e.stratum.name() == stratum.name()) {
			entry.stratum = stratum;
			return next;
		}

		let rank = match self.order.fixed_rank(stratum.name()) {
			Some(rank) => rank,
			None => {
				next.next_seq += 1;
				Rank::Middle(self.next_seq)
			}
		};
		let at = next.entries.partition_point(|e| e.rank < rank);
		next.entries.insert(at, StackEntry { rank, stratum });
		next
	}

	/// Returns a stack without the named stratum.
	pub fn removed(&self, name: &str) -> StrataStack {
		self.retained(|s| s.name() != name)
	}

	/// Returns a stack keeping only strata matching `keep`, in the same order.
	pub fn retained(&self, keep: impl Fn(&Stratum) -> bool) -> StrataStack {
		StrataStack {
			order: self.order.clone(),
			entries: self.entries.iter().filter(|e| keep(&e.stratum)).cloned().collect(),
			next_seq: self.next_seq,
		}
	}

	/// Duplicates every stratum for a new owner, preserving names and ranks.
	pub fn rebind(&self, owner: ModelId) -> Result<StrataStack, StratumError> {
		let entries = self
			.entries
			.iter()
			.map(|e| {
				Ok(StackEntry {
					rank: e.rank,
					stratum: Arc::new(e.stratum.duplicate(owner)?),
				})
			})
			.collect::<Result<Vec<_>, StratumError>>()?;
		Ok(StrataStack {
			order: self.order.clone(),
			entries,
			next_seq: self.next_seq,
		})
	}

	/// Read view over the whole stack.
	pub fn view(&self) -> StackView<'_> {
		StackView::new(&self.entries)
	}
}

/// Borrowed, possibly filtered view of stack entries used during resolution.
///
/// Derived strata at or above `derived_cutoff` are hidden so a derivation never
/// reads itself or anything derived above it.
#[derive(Debug, Clone, Copy)]
pub struct StackView<'a> {
	entries: &'a [StackEntry],
	derived_cutoff: Option<usize>,
}

impl<'a> StackView<'a> {
	pub(crate) fn new(entries: &'a [StackEntry]) -> Self {
		Self {
			entries,
			derived_cutoff: None,
		}
	}

	/// View used by the derived stratum at `index`.
	pub(crate) fn for_derivation(self, index: usize) -> Self {
		Self {
			entries: self.entries,
			derived_cutoff: Some(self.derived_cutoff.map_or(index, |c| c.max(index))),
		}
	}

	fn visible(&self, index: usize, stratum: &Stratum) -> bool {
		!(stratum.is_derived() && self.derived_cutoff.is_some_and(|c| index <= c))
	}

	/// Visible strata with their stack index, top to bottom.
	pub fn iter(self) -> impl Iterator<Item = (usize, &'a Stratum)> {
		let view = self;
		self.entries
			.iter()
			.enumerate()
			.map(|(i, e)| (i, &*e.stratum))
			.filter(move |(i, s)| view.visible(*i, s))
	}

	/// Returns a visible stratum by name.
	pub fn get(self, name: &str) -> Option<&'a Stratum> {
		self.iter().map(|(_, s)| s).find(|s| s.name() == name)
	}

	/// Visible stratum names, top to bottom.
	pub fn names(self) -> Vec<&'a str> {
		self.iter().map(|(_, s)| s.name()).collect()
	}
}
