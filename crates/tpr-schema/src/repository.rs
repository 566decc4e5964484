//! Repository references and artifact descriptors.

use crate::unit::ArtifactKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

/// The two kinds of repository a location can point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryKind {
    /// Unit metadata.
    Metadata,
    /// Binary artifacts.
    Artifact,
}

impl RepositoryKind {
    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Metadata => "metadata",
            Self::Artifact => "artifact",
        }
    }
}

impl fmt::Display for RepositoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A caller-supplied reference to another repository.
///
/// During mirroring each reference is expanded into one [`ReferenceEntry`]
/// per [`RepositoryKind`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryReference {
    /// Location of the referenced repository.
    pub location: Url,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Whether clients should enable the reference by default.
    #[serde(default)]
    pub enabled: bool,
}

impl RepositoryReference {
    /// Create a reference.
    pub fn new(location: Url, name: Option<String>, enabled: bool) -> Self {
        Self {
            location,
            name,
            enabled,
        }
    }

    /// The metadata and artifact entries for this reference, in that order.
    pub fn to_entries(&self) -> [ReferenceEntry; 2] {
        [RepositoryKind::Metadata, RepositoryKind::Artifact].map(|kind| ReferenceEntry {
            location: self.location.clone(),
            name: self.name.clone(),
            kind,
            enabled: self.enabled,
        })
    }
}

/// A typed entry in a metadata repository's reference list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReferenceEntry {
    /// Location of the referenced repository.
    pub location: Url,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Which kind of repository the location is.
    pub kind: RepositoryKind,
    /// Enabled or disabled.
    pub enabled: bool,
}

/// Describes one artifact stored in an artifact repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    /// Artifact identity.
    pub key: ArtifactKey,
    /// Descriptor properties (size, checksums, format).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

impl ArtifactDescriptor {
    /// Create a descriptor without properties.
    pub fn new(key: ArtifactKey) -> Self {
        Self {
            key,
            properties: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_expands_to_both_kinds() {
        let reference = RepositoryReference::new(
            Url::parse("https://download.example.org/releases/latest").unwrap(),
            Some("Latest".into()),
            false,
        );
        let [metadata, artifact] = reference.to_entries();
        assert_eq!(metadata.kind, RepositoryKind::Metadata);
        assert_eq!(artifact.kind, RepositoryKind::Artifact);
        assert_eq!(metadata.location, artifact.location);
        assert_eq!(artifact.name.as_deref(), Some("Latest"));
        assert!(!metadata.enabled && !artifact.enabled);
    }
}
