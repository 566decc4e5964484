//! Mirroring of units and artifacts into a destination repository.
//!
//! A mirror run loads its sources, opens (or creates) the destination,
//! computes which units to copy starting from the caller's root selection,
//! and writes the destination back through the repository manager.

use crate::error::{MirrorError, RepositoryError};
use crate::matcher::find_unit;
use crate::repo::{ArtifactRepository, MetadataRepository, RepositoryDescriptor, RepositoryManager};
use crate::slicer::{Slicer, SlicingOptions, SlicingPolicy};
use crate::space::{CompoundSpace, UnitSet, UnitSource};
use std::collections::BTreeMap;
use std::sync::Arc;
use tpr_schema::{ArtifactKey, RepositoryReference, UnitReference};
use url::Url;

/// Destination artifact repository flag enabling packed artifacts stored
/// next to their canonical form.
pub const PROP_PACK_SIBLINGS: &str = "publishPackFilesAsSiblings";

/// The units a mirror run starts from.
#[derive(Debug, Clone)]
pub enum RootSelection {
    /// Already resolved units, e.g. the content of a target platform.
    Units(UnitSet),
    /// Symbolic references looked up in the sources.
    References(Vec<UnitReference>),
}

/// Outcome of a mirror run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorReport {
    /// Units added to the destination.
    pub units_copied: usize,
    /// Units the destination already had.
    pub units_present: usize,
    /// Artifact descriptors added to the destination.
    pub artifacts_copied: usize,
    /// Artifacts no source had; only populated when errors are ignored.
    pub missing_artifacts: Vec<ArtifactKey>,
    /// Warnings produced while computing the closure.
    pub diagnostics: Vec<String>,
}

/// A configured mirror job.
#[derive(Debug, Clone)]
pub struct MirrorApplication {
    manager: Arc<dyn RepositoryManager>,
    sources: Vec<Url>,
    destination: RepositoryDescriptor,
    extra_properties: BTreeMap<String, String>,
    references: Vec<RepositoryReference>,
    slicing_options: Option<SlicingOptions>,
    ignore_errors: bool,
}

impl MirrorApplication {
    /// A job writing into `destination`.
    pub fn new(manager: Arc<dyn RepositoryManager>, destination: RepositoryDescriptor) -> Self {
        Self {
            manager,
            sources: Vec::new(),
            destination,
            extra_properties: BTreeMap::new(),
            references: Vec::new(),
            slicing_options: None,
            ignore_errors: false,
        }
    }

    /// Add source repositories.
    pub fn with_sources(mut self, sources: impl IntoIterator<Item = Url>) -> Self {
        self.sources.extend(sources);
        self
    }

    /// Properties set on the destination artifact repository.
    pub fn with_extra_properties(mut self, properties: BTreeMap<String, String>) -> Self {
        self.extra_properties.extend(properties);
        self
    }

    /// References written into the destination metadata repository.
    pub fn with_references(mut self, references: impl IntoIterator<Item = RepositoryReference>) -> Self {
        self.references.extend(references);
        self
    }

    /// Follow dependencies of the roots under these options. Without options
    /// only the roots themselves are mirrored.
    pub fn with_slicing_options(mut self, options: SlicingOptions) -> Self {
        self.slicing_options = Some(options);
        self
    }

    /// Record missing artifacts in the report instead of failing.
    pub fn with_ignore_errors(mut self, ignore_errors: bool) -> Self {
        self.ignore_errors = ignore_errors;
        self
    }

    /// Open the destination artifact repository and apply the mirror's properties.
    ///
    /// The pack-siblings flag is set first, so an extra property can override it.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Destination`] if an existing destination cannot be read.
    pub fn initialize_artifact_destination(&self) -> Result<ArtifactRepository, MirrorError> {
        let mut repo = self
            .manager
            .create_artifact_repository(&self.destination)
            .map_err(|source| self.destination_error(source))?;
        repo.set_property(PROP_PACK_SIBLINGS, "true");
        for (key, value) in &self.extra_properties {
            repo.set_property(key.clone(), value.clone());
        }
        Ok(repo)
    }

    /// Open the destination metadata repository and append the mirror's references.
    ///
    /// Each reference is recorded twice: once as a metadata repository and
    /// once as an artifact repository.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Destination`] if an existing destination cannot be read.
    pub fn initialize_metadata_destination(&self) -> Result<MetadataRepository, MirrorError> {
        let mut repo = self
            .manager
            .create_metadata_repository(&self.destination)
            .map_err(|source| self.destination_error(source))?;
        repo.add_references(self.references.iter().flat_map(RepositoryReference::to_entries));
        Ok(repo)
    }

    /// The policy deciding which dependencies of the roots are mirrored.
    pub fn slicing_policy(&self) -> Option<SlicingPolicy> {
        self.slicing_options
            .clone()
            .map(SlicingPolicy::for_mirroring)
    }

    /// Mirror `roots` and whatever the slicing policy pulls along.
    ///
    /// # Errors
    ///
    /// Fails if a source or the destination cannot be accessed, a root cannot
    /// be found, the closure cannot be computed, or (unless errors are
    /// ignored) an artifact is missing from every source.
    pub fn run(&self, roots: &RootSelection) -> Result<MirrorReport, MirrorError> {
        if self.sources.is_empty() {
            return Err(MirrorError::NoSources);
        }

        let mut spaces: Vec<Arc<dyn UnitSource>> = Vec::with_capacity(self.sources.len());
        let mut artifact_sources = Vec::with_capacity(self.sources.len());
        for location in &self.sources {
            let metadata = self
                .manager
                .load_metadata_repository(location)
                .map_err(|source| MirrorError::Source {
                    location: location.clone(),
                    source,
                })?;
            spaces.push(metadata);
            match self.manager.load_artifact_repository(location) {
                Ok(artifacts) => artifact_sources.push(artifacts),
                Err(RepositoryError::NotFound(_)) => {
                    tracing::debug!("No artifact repository at {}", location);
                }
                Err(source) => {
                    return Err(MirrorError::Source {
                        location: location.clone(),
                        source,
                    });
                }
            }
        }
        let space = CompoundSpace::of(spaces);

        let seeds = match roots {
            RootSelection::Units(units) => units.clone(),
            RootSelection::References(references) => references
                .iter()
                .map(|reference| find_unit(space.as_ref(), reference))
                .collect::<Result<UnitSet, _>>()?,
        };

        let mut report = MirrorReport::default();
        let units = match self.slicing_policy() {
            Some(policy) => {
                let slice = Slicer::new(space.as_ref(), &policy).slice(&seeds)?;
                report.diagnostics = slice.diagnostics.iter().map(ToString::to_string).collect();
                slice.units
            }
            None => seeds,
        };

        let mut metadata = self.initialize_metadata_destination()?;
        let mut artifacts = self.initialize_artifact_destination()?;

        for unit in &units {
            if metadata.add_units([Arc::clone(unit)]) == 0 {
                report.units_present += 1;
            } else {
                report.units_copied += 1;
            }

            for key in &unit.artifacts {
                if artifacts.contains(key) {
                    continue;
                }
                let descriptor = artifact_sources
                    .iter()
                    .find_map(|source| source.descriptor(key));
                match descriptor {
                    Some(descriptor) => {
                        artifacts.add_descriptor(descriptor.clone());
                        report.artifacts_copied += 1;
                    }
                    None if self.ignore_errors => {
                        tracing::warn!("Artifact {} not found in any source repository", key);
                        report.missing_artifacts.push(key.clone());
                    }
                    None => return Err(MirrorError::ArtifactNotFound(key.clone())),
                }
            }
        }

        self.manager
            .store_metadata_repository(&metadata)
            .map_err(|source| self.destination_error(source))?;
        self.manager
            .store_artifact_repository(&artifacts)
            .map_err(|source| self.destination_error(source))?;

        tracing::info!(
            "Mirrored {} units and {} artifacts into {}",
            report.units_copied,
            report.artifacts_copied,
            self.destination.location
        );
        Ok(report)
    }

    fn destination_error(&self, source: RepositoryError) -> MirrorError {
        MirrorError::Destination {
            location: self.destination.location.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::InMemoryRepositoryManager;
    use crate::space::tests::unit;
    use tpr_schema::{ArtifactDescriptor, RepositoryKind, Version};

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn app_artifact() -> ArtifactKey {
        ArtifactKey::new("osgi.bundle", "app", Version::new(1, 0, 0))
    }

    fn setup() -> Arc<InMemoryRepositoryManager> {
        let manager = Arc::new(InMemoryRepositoryManager::new());
        manager.add_metadata(
            MetadataRepository::new(url("memory://source"), "source")
                .with_units([unit("app", "1.0").with_artifact(app_artifact())]),
        );
        manager.add_artifacts(
            ArtifactRepository::new(url("memory://source"), "source")
                .with_descriptors([ArtifactDescriptor::new(app_artifact())]),
        );
        manager
    }

    fn job(manager: &Arc<InMemoryRepositoryManager>) -> MirrorApplication {
        MirrorApplication::new(
            manager.clone(),
            RepositoryDescriptor::new(url("memory://dest")),
        )
        .with_sources([url("memory://source")])
    }

    #[test]
    fn test_artifact_destination_properties() {
        let manager = setup();
        let mut extra = BTreeMap::new();
        extra.insert("p2.compressed".to_string(), "true".to_string());
        extra.insert(PROP_PACK_SIBLINGS.to_string(), "false".to_string());

        let repo = job(&manager)
            .with_extra_properties(extra)
            .initialize_artifact_destination()
            .unwrap();
        assert_eq!(repo.property("p2.compressed"), Some("true"));
        assert_eq!(repo.property(PROP_PACK_SIBLINGS), Some("false"));

        let plain = job(&manager).initialize_artifact_destination().unwrap();
        assert_eq!(plain.property(PROP_PACK_SIBLINGS), Some("true"));
    }

    #[test]
    fn test_metadata_destination_references() {
        let manager = setup();
        let repo = job(&manager)
            .with_references([
                RepositoryReference::new(url("https://example.org/a"), Some("A".into()), true),
                RepositoryReference::new(url("https://example.org/b"), None, false),
            ])
            .initialize_metadata_destination()
            .unwrap();

        let entries = repo.references();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].kind, RepositoryKind::Metadata);
        assert_eq!(entries[1].kind, RepositoryKind::Artifact);
        assert_eq!(entries[1].name.as_deref(), Some("A"));
        assert!(entries[1].enabled);
        assert!(!entries[3].enabled);
    }

    #[test]
    fn test_run_copies_units_and_artifacts() {
        let manager = setup();
        let report = job(&manager)
            .run(&RootSelection::References(vec![UnitReference::latest("app")]))
            .unwrap();
        assert_eq!(report.units_copied, 1);
        assert_eq!(report.artifacts_copied, 1);

        let dest = manager.load_metadata_repository(&url("memory://dest")).unwrap();
        assert_eq!(dest.len(), 1);
        let dest_artifacts = manager.load_artifact_repository(&url("memory://dest")).unwrap();
        assert!(dest_artifacts.contains(&app_artifact()));
    }

    #[test]
    fn test_missing_artifact() {
        let manager = setup();
        let orphan = ArtifactKey::new("osgi.bundle", "orphan", Version::new(1, 0, 0));
        manager.add_metadata(
            MetadataRepository::new(url("memory://source"), "source")
                .with_units([unit("orphan", "1.0").with_artifact(orphan.clone())]),
        );
        let roots = RootSelection::References(vec![UnitReference::latest("orphan")]);

        let err = job(&manager).run(&roots).unwrap_err();
        assert!(matches!(err, MirrorError::ArtifactNotFound(ref key) if *key == orphan));

        let report = job(&manager).with_ignore_errors(true).run(&roots).unwrap();
        assert_eq!(report.missing_artifacts, vec![orphan]);
        assert_eq!(report.units_copied, 1);
    }

    #[test]
    fn test_no_sources() {
        let manager = setup();
        let err = MirrorApplication::new(manager, RepositoryDescriptor::new(url("memory://dest")))
            .run(&RootSelection::Units(UnitSet::new()))
            .unwrap_err();
        assert!(matches!(err, MirrorError::NoSources));
    }

    #[test]
    fn test_unknown_source() {
        let manager = setup();
        let err = job(&manager)
            .with_sources([url("memory://elsewhere")])
            .run(&RootSelection::Units(UnitSet::new()))
            .unwrap_err();
        assert!(matches!(err, MirrorError::Source { .. }));
    }
}
