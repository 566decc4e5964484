//! Declarative target platform definitions.
//!
//! A definition is an ordered list of locations. Only installable-unit
//! locations take part in resolution; the other kinds are recognised so that
//! a definition containing them still loads.
//!
//! ```toml
//! [[locations]]
//! type = "installable-unit"
//! repositories = [{ location = "https://download.example.org/releases/2024-06" }]
//! units = [{ id = "org.example.feature.group", version = "0.0.0" }]
//! ```

use crate::context::TargetEnvironment;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

/// Version string a unit reference uses to mean "latest available".
pub const ANY_VERSION: &str = "0.0.0";

fn any_version() -> String {
    ANY_VERSION.to_string()
}

/// A complete target definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDefinition {
    /// Optional display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Locations in declaration order.
    #[serde(default)]
    pub locations: Vec<Location>,
    /// Environments to resolve for when the caller does not supply any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub environments: Vec<TargetEnvironment>,
}

/// One entry of a target definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Location {
    /// Units resolved from p2-style repositories.
    InstallableUnit(UnitLocation),
    /// A plain directory of bundles.
    Directory {
        /// Directory path.
        path: PathBuf,
    },
    /// An installed product profile.
    Profile {
        /// Installation path.
        path: PathBuf,
    },
    /// A single feature inside an installation.
    Feature {
        /// Installation path.
        path: PathBuf,
        /// Feature id.
        id: String,
        /// Feature version, if pinned.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        version: Option<String>,
    },
}

impl Location {
    /// Human-readable kind, used in diagnostics.
    pub fn type_description(&self) -> &'static str {
        match self {
            Self::InstallableUnit(_) => "InstallableUnit",
            Self::Directory { .. } => "Directory",
            Self::Profile { .. } => "Profile",
            Self::Feature { .. } => "Feature",
        }
    }
}

/// Repositories plus the seed units to take from them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitLocation {
    /// Repositories loaded for this location.
    #[serde(default)]
    pub repositories: Vec<Repository>,
    /// Seed unit references.
    #[serde(default)]
    pub units: Vec<UnitReference>,
}

/// A repository entry of a location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    /// Optional repository id (used for credentials lookup by callers).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Repository URL.
    pub location: Url,
}

impl Repository {
    /// A repository entry without id.
    pub fn new(location: Url) -> Self {
        Self { id: None, location }
    }
}

/// A symbolic reference to a unit: id plus version or [`ANY_VERSION`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitReference {
    /// Unit id.
    pub id: String,
    /// Version string; `0.0.0` selects the latest version.
    #[serde(default = "any_version")]
    pub version: String,
}

impl UnitReference {
    /// Create a reference.
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
        }
    }

    /// A reference to the latest version of `id`.
    pub fn latest(id: impl Into<String>) -> Self {
        Self::new(id, ANY_VERSION)
    }
}
