//! TOML job descriptions read by the CLI.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tpr_core::{RepositoryDescriptor, SlicingOptions};
use tpr_schema::{RepositoryReference, TargetDefinition, TargetEnvironment, UnitReference};
use url::Url;

/// Read a target definition from a TOML file.
pub fn load_target(path: &Path) -> Result<TargetDefinition> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read target definition {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse target definition {}", path.display()))
}

/// A mirror job.
///
/// ```toml
/// sources = ["file:///srv/repos/release"]
/// units = [{ id = "org.example.feature.group" }]
///
/// [destination]
/// location = "file:///srv/repos/mirror"
/// append = true
///
/// [properties]
/// "p2.compressed" = "true"
///
/// [[references]]
/// location = "https://download.example.org/releases/latest"
/// enabled = true
///
/// [slicing]
/// include_optional_dependencies = false
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MirrorConfig {
    /// Source repositories.
    pub sources: Vec<Url>,
    /// Where to write.
    pub destination: RepositoryDescriptor,
    /// Explicit root units.
    #[serde(default)]
    pub units: Vec<UnitReference>,
    /// A target definition whose resolved content becomes the roots.
    #[serde(default)]
    pub target: Option<PathBuf>,
    /// Environments used when resolving `target`.
    #[serde(default)]
    pub environments: Vec<TargetEnvironment>,
    /// Properties applied to the destination artifact repository.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    /// References recorded in the destination metadata repository.
    #[serde(default)]
    pub references: Vec<RepositoryReference>,
    /// Follow dependencies under these options; only roots are mirrored when absent.
    #[serde(default)]
    pub slicing: Option<SlicingOptions>,
    /// Report missing artifacts instead of failing.
    #[serde(default)]
    pub ignore_errors: bool,
}

impl MirrorConfig {
    /// Read a mirror job. A relative `target` is resolved against the job file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read mirror config {}", path.display()))?;
        let mut config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse mirror config {}", path.display()))?;

        if let Some(target) = &config.target {
            if target.is_relative() {
                let base = path.parent().unwrap_or(Path::new("."));
                config.target = Some(base.join(target));
            }
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_mirror_config() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("mirror.toml");
        fs::write(
            &path,
            r#"
sources = ["file:///srv/source"]
target = "target.toml"
ignore_errors = true

[destination]
location = "file:///srv/dest"

[properties]
"p2.compressed" = "true"

[[references]]
location = "https://example.org/updates"
enabled = true

[slicing]
include_optional_dependencies = false
filter = { "osgi.os" = "linux", "osgi.ws" = "gtk" }
"#,
        )
        .unwrap();

        let config = MirrorConfig::load(&path).unwrap();
        assert_eq!(config.sources.len(), 1);
        assert!(!config.destination.append);
        assert_eq!(config.target, Some(temp.path().join("target.toml")));
        assert_eq!(config.properties["p2.compressed"], "true");
        assert!(config.references[0].enabled);
        let slicing = config.slicing.unwrap();
        assert!(!slicing.include_optional_dependencies);
        assert!(slicing.everything_greedy);
        assert!(slicing.considers_filter());
        assert!(config.ignore_errors);
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("mirror.toml");
        fs::write(
            &path,
            r#"
sources = []
colour = "blue"
[destination]
location = "file:///srv/dest"
"#,
        )
        .unwrap();
        assert!(MirrorConfig::load(&path).is_err());
    }
}
