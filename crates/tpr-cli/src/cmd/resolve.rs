//! Resolve command

use crate::config::load_target;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tpr_core::{LocalRepositoryManager, TargetDefinitionResolver, TargetPlatformContent};
use tpr_schema::TargetEnvironment;

#[derive(Debug, Serialize)]
struct ResolvedUnit<'a> {
    id: &'a str,
    version: String,
}

#[derive(Debug, Serialize)]
struct ResolvedTarget<'a> {
    units: Vec<ResolvedUnit<'a>>,
    artifact_repositories: Vec<&'a str>,
}

impl<'a> From<&'a TargetPlatformContent> for ResolvedTarget<'a> {
    fn from(content: &'a TargetPlatformContent) -> Self {
        Self {
            units: content
                .units()
                .iter()
                .map(|u| ResolvedUnit {
                    id: &u.id,
                    version: u.version.to_string(),
                })
                .collect(),
            artifact_repositories: content
                .artifact_repositories()
                .iter()
                .map(url::Url::as_str)
                .collect(),
        }
    }
}

/// Resolve a target definition file and print the result.
pub fn resolve(target: &Path, environments: Vec<TargetEnvironment>, json: bool) -> Result<()> {
    let definition = load_target(target)?;
    let resolver = TargetDefinitionResolver::new(environments, Arc::new(LocalRepositoryManager::new()));
    let content = resolver
        .resolve_content(&definition)
        .with_context(|| format!("Failed to resolve {}", target.display()))?;

    let resolved = ResolvedTarget::from(&content);
    if json {
        println!("{}", serde_json::to_string_pretty(&resolved)?);
        return Ok(());
    }

    let width = resolved.units.iter().map(|u| u.id.len()).max().unwrap_or(0);
    for unit in &resolved.units {
        println!("{:<width$}  {}", unit.id, unit.version);
    }
    if !resolved.artifact_repositories.is_empty() {
        println!();
        println!("Artifact repositories:");
        for location in &resolved.artifact_repositories {
            println!("  {location}");
        }
    }
    Ok(())
}
