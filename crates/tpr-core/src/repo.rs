//! Metadata and artifact repositories and the managers that load them.
//!
//! Storage is pluggable through [`RepositoryManager`]. Two managers ship
//! with the crate: [`InMemoryRepositoryManager`] for embedding and tests, and
//! [`LocalRepositoryManager`] which keeps each repository as a directory
//! holding `content.json` and `artifacts.json`.

use crate::error::RepositoryError;
use crate::space::{UnitSet, UnitSource};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tpr_schema::{ArtifactDescriptor, ArtifactKey, InstallableUnit, ReferenceEntry};
use url::Url;

/// File holding a metadata repository inside a local repository directory.
pub const CONTENT_FILE: &str = "content.json";
/// File holding an artifact repository inside a local repository directory.
pub const ARTIFACTS_FILE: &str = "artifacts.json";

/// A repository of installable-unit metadata.
#[derive(Debug, Clone)]
pub struct MetadataRepository {
    location: Url,
    name: String,
    properties: BTreeMap<String, String>,
    units: UnitSet,
    references: Vec<ReferenceEntry>,
}

impl MetadataRepository {
    /// An empty repository.
    pub fn new(location: Url, name: impl Into<String>) -> Self {
        Self {
            location,
            name: name.into(),
            properties: BTreeMap::new(),
            units: UnitSet::new(),
            references: Vec::new(),
        }
    }

    /// Builder-style unit insertion.
    pub fn with_units(mut self, units: impl IntoIterator<Item = InstallableUnit>) -> Self {
        self.add_units(units.into_iter().map(Arc::new));
        self
    }

    /// Repository location.
    pub fn location(&self) -> &Url {
        &self.location
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read a property.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Set a property.
    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }

    /// Add units, returning how many were new.
    pub fn add_units(&mut self, units: impl IntoIterator<Item = Arc<InstallableUnit>>) -> usize {
        units
            .into_iter()
            .filter(|unit| self.units.insert(Arc::clone(unit)))
            .count()
    }

    /// The stored units.
    pub fn unit_set(&self) -> &UnitSet {
        &self.units
    }

    /// Add entries to the reference list.
    ///
    /// Entries are keyed by location and kind; re-adding one replaces its
    /// name and enabled flag in place.
    pub fn add_references(&mut self, entries: impl IntoIterator<Item = ReferenceEntry>) {
        for entry in entries {
            let existing = self
                .references
                .iter_mut()
                .find(|r| r.location == entry.location && r.kind == entry.kind);
            match existing {
                Some(existing) => *existing = entry,
                None => self.references.push(entry),
            }
        }
    }

    /// The reference list.
    pub fn references(&self) -> &[ReferenceEntry] {
        &self.references
    }
}

impl UnitSource for MetadataRepository {
    fn units(&self) -> Box<dyn Iterator<Item = &Arc<InstallableUnit>> + '_> {
        self.units.units()
    }
}

/// A repository of artifact descriptors.
#[derive(Debug, Clone)]
pub struct ArtifactRepository {
    location: Url,
    name: String,
    properties: BTreeMap<String, String>,
    descriptors: BTreeMap<ArtifactKey, ArtifactDescriptor>,
}

impl ArtifactRepository {
    /// An empty repository.
    pub fn new(location: Url, name: impl Into<String>) -> Self {
        Self {
            location,
            name: name.into(),
            properties: BTreeMap::new(),
            descriptors: BTreeMap::new(),
        }
    }

    /// Builder-style descriptor insertion.
    pub fn with_descriptors(
        mut self,
        descriptors: impl IntoIterator<Item = ArtifactDescriptor>,
    ) -> Self {
        for descriptor in descriptors {
            self.add_descriptor(descriptor);
        }
        self
    }

    /// Repository location.
    pub fn location(&self) -> &Url {
        &self.location
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read a property.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// All properties.
    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// Set a property.
    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }

    /// Check for an artifact.
    pub fn contains(&self, key: &ArtifactKey) -> bool {
        self.descriptors.contains_key(key)
    }

    /// Look up a descriptor.
    pub fn descriptor(&self, key: &ArtifactKey) -> Option<&ArtifactDescriptor> {
        self.descriptors.get(key)
    }

    /// Add a descriptor; returns `false` if the key was already present.
    pub fn add_descriptor(&mut self, descriptor: ArtifactDescriptor) -> bool {
        if self.descriptors.contains_key(&descriptor.key) {
            return false;
        }
        self.descriptors.insert(descriptor.key.clone(), descriptor);
        true
    }

    /// Iterate descriptors in key order.
    pub fn descriptors(&self) -> impl Iterator<Item = &ArtifactDescriptor> {
        self.descriptors.values()
    }
}

/// Where and how to create a destination repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryDescriptor {
    /// Destination location.
    pub location: Url,
    /// Display name; defaults to the location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Keep existing content instead of starting empty.
    #[serde(default)]
    pub append: bool,
}

impl RepositoryDescriptor {
    /// A fresh (non-appending) destination.
    pub fn new(location: Url) -> Self {
        Self {
            location,
            name: None,
            append: false,
        }
    }

    fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.location.to_string())
    }
}

/// Storage backend for repositories.
///
/// Implementations must be safe to share; a destination repository is only
/// ever written by one mirror run at a time.
pub trait RepositoryManager: Send + Sync + fmt::Debug {
    /// Load the metadata repository at `location`.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] if the repository is missing or unreadable.
    fn load_metadata_repository(
        &self,
        location: &Url,
    ) -> Result<Arc<MetadataRepository>, RepositoryError>;

    /// Load the artifact repository at `location`.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] if the repository is missing or unreadable.
    fn load_artifact_repository(
        &self,
        location: &Url,
    ) -> Result<Arc<ArtifactRepository>, RepositoryError>;

    /// Persist a metadata repository at its own location.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] if the repository cannot be written.
    fn store_metadata_repository(&self, repo: &MetadataRepository)
    -> Result<(), RepositoryError>;

    /// Persist an artifact repository at its own location.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] if the repository cannot be written.
    fn store_artifact_repository(&self, repo: &ArtifactRepository)
    -> Result<(), RepositoryError>;

    /// Open a destination metadata repository, reusing existing content when appending.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] if an existing repository cannot be read.
    fn create_metadata_repository(
        &self,
        descriptor: &RepositoryDescriptor,
    ) -> Result<MetadataRepository, RepositoryError> {
        if descriptor.append {
            match self.load_metadata_repository(&descriptor.location) {
                Ok(existing) => return Ok((*existing).clone()),
                Err(RepositoryError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(MetadataRepository::new(
            descriptor.location.clone(),
            descriptor.display_name(),
        ))
    }

    /// Open a destination artifact repository, reusing existing content when appending.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] if an existing repository cannot be read.
    fn create_artifact_repository(
        &self,
        descriptor: &RepositoryDescriptor,
    ) -> Result<ArtifactRepository, RepositoryError> {
        if descriptor.append {
            match self.load_artifact_repository(&descriptor.location) {
                Ok(existing) => return Ok((*existing).clone()),
                Err(RepositoryError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(ArtifactRepository::new(
            descriptor.location.clone(),
            descriptor.display_name(),
        ))
    }
}

/// Repositories held in process memory, keyed by location.
#[derive(Debug, Default)]
pub struct InMemoryRepositoryManager {
    metadata: Mutex<HashMap<Url, Arc<MetadataRepository>>>,
    artifacts: Mutex<HashMap<Url, Arc<ArtifactRepository>>>,
}

impl InMemoryRepositoryManager {
    /// An empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a metadata repository under its location.
    pub fn add_metadata(&self, repo: MetadataRepository) {
        self.metadata
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(repo.location().clone(), Arc::new(repo));
    }

    /// Register an artifact repository under its location.
    pub fn add_artifacts(&self, repo: ArtifactRepository) {
        self.artifacts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(repo.location().clone(), Arc::new(repo));
    }
}

impl RepositoryManager for InMemoryRepositoryManager {
    fn load_metadata_repository(
        &self,
        location: &Url,
    ) -> Result<Arc<MetadataRepository>, RepositoryError> {
        self.metadata
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(location)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(location.clone()))
    }

    fn load_artifact_repository(
        &self,
        location: &Url,
    ) -> Result<Arc<ArtifactRepository>, RepositoryError> {
        self.artifacts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(location)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(location.clone()))
    }

    fn store_metadata_repository(
        &self,
        repo: &MetadataRepository,
    ) -> Result<(), RepositoryError> {
        self.add_metadata(repo.clone());
        Ok(())
    }

    fn store_artifact_repository(
        &self,
        repo: &ArtifactRepository,
    ) -> Result<(), RepositoryError> {
        self.add_artifacts(repo.clone());
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct MetadataDocument {
    name: String,
    #[serde(default)]
    properties: BTreeMap<String, String>,
    #[serde(default)]
    units: Vec<InstallableUnit>,
    #[serde(default)]
    references: Vec<ReferenceEntry>,
}

#[derive(Serialize, Deserialize)]
struct ArtifactDocument {
    name: String,
    #[serde(default)]
    properties: BTreeMap<String, String>,
    #[serde(default)]
    artifacts: Vec<ArtifactDescriptor>,
}

/// Directory-backed repositories addressed by `file:` URLs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalRepositoryManager;

impl LocalRepositoryManager {
    /// Create a manager.
    pub fn new() -> Self {
        Self
    }

    fn directory(location: &Url) -> Result<PathBuf, RepositoryError> {
        if location.scheme() != "file" {
            return Err(RepositoryError::UnsupportedLocation(location.clone()));
        }
        location
            .to_file_path()
            .map_err(|()| RepositoryError::UnsupportedLocation(location.clone()))
    }

    fn read<T: for<'de> Deserialize<'de>>(
        location: &Url,
        file: &str,
    ) -> Result<T, RepositoryError> {
        let path = Self::directory(location)?.join(file);
        if !path.exists() {
            return Err(RepositoryError::NotFound(location.clone()));
        }
        let content = fs::read_to_string(&path).map_err(|source| RepositoryError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| RepositoryError::Format { path, source })
    }

    fn write<T: Serialize>(location: &Url, file: &str, doc: &T) -> Result<(), RepositoryError> {
        let dir = Self::directory(location)?;
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| RepositoryError::Io { path, source }
        };
        fs::create_dir_all(&dir).map_err(io_err(&dir))?;

        let path = dir.join(file);
        let content = serde_json::to_string_pretty(doc).map_err(|source| {
            RepositoryError::Format {
                path: path.clone(),
                source,
            }
        })?;

        // Atomic write: write to temp file, then rename
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, content).map_err(io_err(&temp_path))?;
        fs::rename(&temp_path, &path).map_err(io_err(&path))?;
        Ok(())
    }
}

impl RepositoryManager for LocalRepositoryManager {
    fn load_metadata_repository(
        &self,
        location: &Url,
    ) -> Result<Arc<MetadataRepository>, RepositoryError> {
        let doc: MetadataDocument = Self::read(location, CONTENT_FILE)?;
        let mut repo = MetadataRepository::new(location.clone(), doc.name);
        repo.properties = doc.properties;
        repo.add_units(doc.units.into_iter().map(Arc::new));
        repo.add_references(doc.references);
        tracing::debug!(
            "Loaded {} units from {}",
            repo.unit_set().len(),
            location
        );
        Ok(Arc::new(repo))
    }

    fn load_artifact_repository(
        &self,
        location: &Url,
    ) -> Result<Arc<ArtifactRepository>, RepositoryError> {
        let doc: ArtifactDocument = Self::read(location, ARTIFACTS_FILE)?;
        let mut repo = ArtifactRepository::new(location.clone(), doc.name);
        repo.properties = doc.properties;
        for descriptor in doc.artifacts {
            repo.add_descriptor(descriptor);
        }
        Ok(Arc::new(repo))
    }

    fn store_metadata_repository(
        &self,
        repo: &MetadataRepository,
    ) -> Result<(), RepositoryError> {
        let doc = MetadataDocument {
            name: repo.name.clone(),
            properties: repo.properties.clone(),
            units: repo.units.iter().map(|u| (**u).clone()).collect(),
            references: repo.references.clone(),
        };
        Self::write(&repo.location, CONTENT_FILE, &doc)
    }

    fn store_artifact_repository(
        &self,
        repo: &ArtifactRepository,
    ) -> Result<(), RepositoryError> {
        let doc = ArtifactDocument {
            name: repo.name.clone(),
            properties: repo.properties.clone(),
            artifacts: repo.descriptors.values().cloned().collect(),
        };
        Self::write(&repo.location, ARTIFACTS_FILE, &doc)
    }
}
