//! geocat command-line tool.
//!
//! Registers the built-in model types, reads a catalog file of persisted
//! definitions and resolves, validates or re-saves its models.

use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::Parser;
use geocat_catalog::config::load_layered;
use geocat_catalog::{ModelRegistry, builtins, persist};
use geocat_traits::{Map, Value};
use tracing::{info, warn};

mod catalog_file;
mod cli;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();
	setup_tracing(cli.verbose);

	match cli.command {
		Command::Resolve { file, load, id } => {
			let registry = registry(Some(&file), cli.config.as_deref())?;
			let registered = catalog_file::register(&registry, &catalog_file::read_entries(&file)?);
			let mut out = Map::new();
			for model in registered.models.iter().filter(|m| id.as_deref().is_none_or(|id| m.key() == id)) {
				if load {
					load_strata(model).await;
				}
				out.insert(model.key().to_string(), Value::Object(model.resolved()));
			}
			if let Some(id) = id
				&& out.is_empty()
			{
				bail!("no model with id '{id}' in {}", file.display());
			}
			print_json(&Value::Object(out))?;
		}
		Command::Validate { file } => {
			let registry = registry(Some(&file), cli.config.as_deref())?;
			let registered = catalog_file::register(&registry, &catalog_file::read_entries(&file)?);
			for (index, reason) in &registered.rejected {
				println!("entry {index}: {reason}");
			}
			println!("{} valid, {} rejected, {} warnings", registered.models.len(), registered.rejected.len(), registered.warnings);
			if !registered.rejected.is_empty() {
				bail!("{} definitions rejected", registered.rejected.len());
			}
		}
		Command::Save { file, load } => {
			let registry = registry(Some(&file), cli.config.as_deref())?;
			let registered = catalog_file::register(&registry, &catalog_file::read_entries(&file)?);
			let strata = &registry.config().persist.strata;
			let mut saved = Vec::with_capacity(registered.models.len());
			for model in &registered.models {
				if load {
					load_strata(model).await;
				}
				saved.push(Value::Object(persist::to_json(model, strata)));
			}
			print_json(&Value::Array(saved))?;
		}
		Command::Types => {
			let registry = registry(None, cli.config.as_deref())?;
			for name in registry.type_names() {
				let Some(ty) = registry.model_type(name) else { continue };
				let caps: Vec<_> = ty.capabilities().capabilities().map(|c| c.name()).collect();
				println!("{name} [{}]", caps.join(", "));
				for def in ty.schema().iter() {
					println!("  {:<16} {}", def.id, def.kind.describe());
				}
			}
		}
	}
	Ok(())
}

/// Builds a registry from layered configuration with the built-in types.
///
/// Relative loader inputs resolve against the catalog file's directory.
fn registry(catalog: Option<&Path>, explicit: Option<&Path>) -> Result<ModelRegistry> {
	let dir = catalog.and_then(Path::parent).filter(|d| !d.as_os_str().is_empty());
	let report = load_layered(dir, explicit);
	for (path, error) in &report.errors {
		warn!(path = %path.display(), error = %error, "configuration layer skipped");
	}
	if let Some(path) = explicit
		&& !report.sources.iter().any(|s| s == path)
	{
		bail!("could not load configuration from {}", path.display());
	}
	for path in &report.sources {
		info!(path = %path.display(), "configuration loaded");
	}

	let registry = ModelRegistry::new(report.config);
	builtins::register(&registry, dir).context("registering built-in model types")?;
	Ok(registry)
}

async fn load_strata(model: &std::sync::Arc<geocat_catalog::Model>) {
	for (stratum, outcome) in model.load_all().await {
		match outcome {
			Ok(outcome) => info!(model = model.key(), stratum = %stratum, outcome = ?outcome, "stratum loaded"),
			Err(error) => warn!(model = model.key(), stratum = %stratum, error = %error, "stratum not loaded"),
		}
	}
}

fn print_json(value: &Value) -> Result<()> {
	println!("{}", serde_json::to_string_pretty(value)?);
	Ok(())
}

fn setup_tracing(verbose: bool) {
	use tracing_subscriber::EnvFilter;

	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
		if verbose {
			EnvFilter::new("geocat=debug,geocat_catalog=debug,geocat_traits=debug,info")
		} else {
			EnvFilter::new("warn")
		}
	});

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}
