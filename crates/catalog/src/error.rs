//! Error types for catalog models, loading and configuration.

use std::path::PathBuf;
use std::sync::Arc;

use geocat_traits::{ModelId, SchemaError, StratumError, TraitError};
use thiserror::Error;

/// A loadable stratum could not be produced.
///
/// Shared behind an `Arc` so every caller coalesced onto one fetch receives the
/// same error.
#[derive(Debug, Error)]
pub enum LoadError {
	/// The model type has no loader for this stratum name.
	#[error("no loader registered for stratum '{0}'")]
	NoLoader(String),

	/// The loader's input could not be computed from the model's traits.
	#[error("stratum '{stratum}' has no input: {reason}")]
	MissingInput { stratum: String, reason: String },

	/// The external fetch was rejected.
	#[error("fetch of '{input}' failed: {reason}")]
	Fetch { input: String, reason: String },

	/// The loaded values failed error-level validation.
	#[error("loaded values rejected: {0}")]
	Invalid(#[from] TraitError),

	/// Error reading a source document.
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path of the document that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},

	/// The source document is not valid JSON.
	#[error("malformed document '{input}': {error}")]
	Json { input: String, error: serde_json::Error },

	/// The load task ended without publishing an outcome.
	#[error("load of stratum '{0}' aborted")]
	Aborted(String),
}

/// Errors from model, registry and persistence operations.
#[derive(Debug, Error)]
pub enum CatalogError {
	/// No model type is registered under this name.
	#[error("unknown model type '{0}'")]
	UnknownType(String),

	/// The model type does not declare this trait.
	#[error("model type '{model_type}' has no trait '{trait_id}'")]
	UnknownTrait { model_type: String, trait_id: String },

	/// A catalog id is already taken.
	#[error("a model with id '{0}' is already registered")]
	DuplicateId(String),

	/// A stratum bound to another model was installed.
	#[error("stratum '{stratum}' belongs to {owner}, not {model}")]
	ForeignStratum { stratum: String, owner: ModelId, model: ModelId },

	/// A persisted definition lacks a required key.
	#[error("definition is missing '{0}'")]
	MissingField(&'static str),

	/// A persisted definition is not a JSON object.
	#[error("definition must be a JSON object, got {0}")]
	NotAnObject(&'static str),

	#[error(transparent)]
	Invalid(#[from] TraitError),

	#[error(transparent)]
	Schema(#[from] SchemaError),

	#[error(transparent)]
	Stratum(#[from] StratumError),

	#[error(transparent)]
	Load(#[from] Arc<LoadError>),
}

/// Errors that can occur when reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error reading a configuration file.
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path to the file that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},

	/// Error parsing TOML syntax or shape.
	#[error("TOML parse error: {0}")]
	Toml(#[from] toml::de::Error),
}

/// Result type for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;
