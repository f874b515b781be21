//! Loader reading JSON documents from the local filesystem.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use geocat_traits::{StratumName, Value, json_type_name};

use super::{LoadedDocument, StratumLoader};
use crate::error::LoadError;
use crate::model::Snapshot;

/// Reads the file named by a string trait (typically `url`) and installs the
/// object found at `pointer` as raw trait values.
#[derive(Debug, Clone)]
pub struct FileLoader {
	stratum: StratumName,
	input_trait: &'static str,
	base_dir: Option<PathBuf>,
	pointer: String,
}

impl FileLoader {
	pub fn new(stratum: impl Into<StratumName>, input_trait: &'static str) -> Self {
		Self {
			stratum: stratum.into(),
			input_trait,
			base_dir: None,
			pointer: String::new(),
		}
	}

	/// Resolves relative inputs against `dir`.
	pub fn base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
		self.base_dir = Some(dir.into());
		self
	}

	/// Selects the values object with a JSON pointer (e.g. `/metadata`).
	pub fn pointer(mut self, pointer: impl Into<String>) -> Self {
		self.pointer = pointer.into();
		self
	}

	fn path_for(&self, input: &str) -> PathBuf {
		let path = Path::new(input.strip_prefix("file://").unwrap_or(input));
		match &self.base_dir {
			Some(base) if path.is_relative() => base.join(path),
			_ => path.to_path_buf(),
		}
	}
}

#[async_trait]
impl StratumLoader for FileLoader {
	fn stratum_name(&self) -> &str {
		&self.stratum
	}

	fn input(&self, snapshot: &Snapshot) -> Result<String, LoadError> {
		snapshot.get_str(self.input_trait).ok_or_else(|| LoadError::MissingInput {
			stratum: self.stratum.to_string(),
			reason: format!("trait '{}' is not set", self.input_trait),
		})
	}

	async fn fetch(&self, input: &str) -> Result<LoadedDocument, LoadError> {
		let path = self.path_for(input);
		tracing::debug!(domain = "load", stratum = %self.stratum, path = %path.display(), "reading document");

		let content = tokio::fs::read_to_string(&path).await.map_err(|error| LoadError::Io { path: path.clone(), error })?;
		let document: Value = serde_json::from_str(&content).map_err(|error| LoadError::Json {
			input: input.to_string(),
			error,
		})?;

		let values = match document.pointer(&self.pointer) {
			Some(Value::Object(values)) => values.clone(),
			Some(other) => {
				return Err(LoadError::Fetch {
					input: input.to_string(),
					reason: format!("'{}' is {}, expected object", self.pointer, json_type_name(other)),
				});
			}
			None => {
				return Err(LoadError::Fetch {
					input: input.to_string(),
					reason: format!("document has no '{}'", self.pointer),
				});
			}
		};

		Ok(LoadedDocument {
			values,
			document: Arc::new(document),
		})
	}
}
