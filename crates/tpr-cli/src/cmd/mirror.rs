//! Mirror command

use crate::config::{MirrorConfig, load_target};
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tpr_core::{
    LocalRepositoryManager, MirrorApplication, RepositoryManager, RootSelection,
    TargetDefinitionResolver,
};

/// Run the mirror job described by `config_path`.
pub fn mirror(config_path: &Path) -> Result<()> {
    let config = MirrorConfig::load(config_path)?;
    let manager: Arc<dyn RepositoryManager> = Arc::new(LocalRepositoryManager::new());

    let roots = match &config.target {
        Some(target) => {
            if !config.units.is_empty() {
                tracing::warn!("Explicit units are ignored when a target definition is given");
            }
            let definition = load_target(target)?;
            let content =
                TargetDefinitionResolver::new(config.environments.clone(), Arc::clone(&manager))
                    .resolve_content(&definition)
                    .with_context(|| format!("Failed to resolve {}", target.display()))?;
            RootSelection::Units(content.units().clone())
        }
        None => RootSelection::References(config.units.clone()),
    };

    let mut job = MirrorApplication::new(manager, config.destination.clone())
        .with_sources(config.sources.iter().cloned())
        .with_extra_properties(config.properties.clone())
        .with_references(config.references.iter().cloned())
        .with_ignore_errors(config.ignore_errors);
    if let Some(options) = &config.slicing {
        job = job.with_slicing_options(options.clone());
    }

    let report = job
        .run(&roots)
        .with_context(|| format!("Mirror into {} failed", config.destination.location))?;

    println!(
        "Mirrored {} units ({} already present) and {} artifacts into {}",
        report.units_copied, report.units_present, report.artifacts_copied, config.destination.location
    );
    for key in &report.missing_artifacts {
        println!("  missing artifact {key}");
    }
    Ok(())
}
