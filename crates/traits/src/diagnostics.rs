use crate::error::TraitError;

/// Non-fatal validation problems collected while reading a stratum.
///
/// These are reported to the caller but do not prevent the remaining valid
/// properties from being installed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
	entries: Vec<TraitError>,
}

impl Diagnostics {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn push(&mut self, error: TraitError) {
		self.entries.push(error);
	}

	pub fn extend(&mut self, other: Diagnostics) {
		self.entries.extend(other.entries);
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn iter(&self) -> std::slice::Iter<'_, TraitError> {
		self.entries.iter()
	}

	/// Returns true if any entry concerns `trait_id`.
	pub fn mentions(&self, trait_id: &str) -> bool {
		self.entries.iter().any(|e| e.trait_id() == trait_id || e.trait_id().starts_with(&format!("{trait_id}[")))
	}

	pub fn into_vec(self) -> Vec<TraitError> {
		self.entries
	}
}

impl IntoIterator for Diagnostics {
	type Item = TraitError;
	type IntoIter = std::vec::IntoIter<TraitError>;

	fn into_iter(self) -> Self::IntoIter {
		self.entries.into_iter()
	}
}

impl<'a> IntoIterator for &'a Diagnostics {
	type Item = &'a TraitError;
	type IntoIter = std::slice::Iter<'a, TraitError>;

	fn into_iter(self) -> Self::IntoIter {
		self.entries.iter()
	}
}
