//! Process-wide routing of user-facing load failures.

use geocat_traits::ModelId;

use crate::error::LoadError;

/// A load failure being raised.
#[derive(Debug, Clone, Copy)]
pub struct LoadFailure<'a> {
	pub model: ModelId,
	/// Catalog id of the model.
	pub key: &'a str,
	pub stratum: &'a str,
	pub error: &'a LoadError,
}

/// Receives load failures in addition to the caller that requested the load.
///
/// Delivery is best-effort; the caller always gets the error regardless.
pub trait ErrorSink: Send + Sync {
	fn raise(&self, failure: LoadFailure<'_>);
}

/// Logs failures through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
	fn raise(&self, failure: LoadFailure<'_>) {
		tracing::error!(
			domain = "load",
			model = %failure.model,
			key = failure.key,
			stratum = failure.stratum,
			error = %failure.error,
			"stratum load failed"
		);
	}
}
