//! Catalog models over layered strata.
//!
//! Builds on [`geocat_traits`] to provide:
//!
//! - **Models**: catalog objects that publish a strata stack atomically and
//!   resolve every declared trait on each read ([`Model`])
//! - **Capabilities**: composable trait sets and typed views ([`Capability`])
//! - **Registry**: ownership of models and resolution of model handles ([`ModelRegistry`])
//! - **Loading**: coalesced, stale-guarded async fetches that install loadable
//!   strata ([`StratumLoader`], [`Model::load`])
//! - **Events**: one [`StackEvent`] per stratum install, replace or remove
//! - **Persistence**: definitions restricted to chosen strata ([`persist`])
//! - **Configuration**: layered TOML files ([`config`])
//!
//! # Example
//!
//! ```no_run
//! use geocat_catalog::{ModelRegistry, builtins, config::CatalogConfig};
//! use serde_json::json;
//!
//! let registry = ModelRegistry::new(CatalogConfig::default());
//! builtins::register(&registry, None)?;
//! let model = registry.create(builtins::JSON_LAYER, "roads")?;
//! model.set_trait("user", "opacity", &json!(0.5))?;
//! assert_eq!(model.get("opacity"), Some(json!(0.5)));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod builtins;
pub mod capability;
pub mod config;
pub mod error;
pub mod events;
pub mod load;
pub mod model;
pub mod persist;
pub mod registry;

pub use capability::{Capabilities, Capability};
pub use error::{CatalogError, ConfigError, LoadError, Result};
pub use events::{StackChange, StackEvent};
pub use load::{ErrorSink, FileLoader, LoadFailure, LoadOutcome, LoadState, LoadedDocument, SharedOutcome, StratumLoader, TracingErrorSink};
pub use model::{GroupView, MappableView, Model, ModelOptions, ModelType, ModelTypeBuilder, Rectangle, Snapshot};
pub use registry::ModelRegistry;
