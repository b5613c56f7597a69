//! `intake` subcommands

pub mod bind;
pub mod check;

use anyhow::{Context, Result};
use intake_api::{Definitions, EndpointRegistry};
use std::path::Path;
use tracing::info;

/// Load and compile a definition file
pub fn load_registry(path: &Path) -> Result<EndpointRegistry> {
    let definitions = Definitions::load(path)
        .with_context(|| format!("Failed to load definitions from {}", path.display()))?;
    let registry = definitions
        .build()
        .with_context(|| format!("Invalid definitions in {}", path.display()))?;
    info!(
        path = %path.display(),
        models = registry.schemas().len(),
        endpoints = registry.len(),
        "definitions loaded"
    );
    Ok(registry)
}
