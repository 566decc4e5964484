//! Loading of target definition locations.

use crate::error::ResolutionError;
use crate::matcher::find_unit;
use crate::repo::RepositoryManager;
use crate::space::{CompoundSpace, UnitSet, UnitSource};
use std::sync::Arc;
use tpr_schema::UnitLocation;
use url::Url;

/// One installable-unit location with its repositories loaded and its seed
/// references resolved.
#[derive(Debug, Clone)]
pub struct LoadedLocation {
    space: Arc<dyn UnitSource>,
    seeds: UnitSet,
    artifact_repositories: Vec<Url>,
}

impl LoadedLocation {
    /// Load every repository of `location` and resolve its unit references.
    ///
    /// # Errors
    ///
    /// Fails with [`ResolutionError::RepositoryLoadFailure`] for the first
    /// repository that cannot be loaded, or with the matcher's error for the
    /// first reference that cannot be resolved.
    pub fn load(
        location: &UnitLocation,
        manager: &dyn RepositoryManager,
    ) -> Result<Self, ResolutionError> {
        let mut sources: Vec<Arc<dyn UnitSource>> = Vec::with_capacity(location.repositories.len());
        let mut artifact_repositories = Vec::with_capacity(location.repositories.len());

        for repository in &location.repositories {
            let loaded = manager
                .load_metadata_repository(&repository.location)
                .map_err(|source| ResolutionError::RepositoryLoadFailure {
                    location: repository.location.clone(),
                    source,
                })?;
            tracing::debug!(
                "Loaded repository {} ({} units)",
                repository.location,
                loaded.len()
            );
            sources.push(loaded);
            artifact_repositories.push(repository.location.clone());
        }

        let space = CompoundSpace::of(sources);
        let seeds = location
            .units
            .iter()
            .map(|reference| find_unit(space.as_ref(), reference))
            .collect::<Result<UnitSet, _>>()?;

        Ok(Self {
            space,
            seeds,
            artifact_repositories,
        })
    }

    /// All units of the location's repositories.
    pub fn available_units(&self) -> &Arc<dyn UnitSource> {
        &self.space
    }

    /// The resolved seed units.
    pub fn seed_units(&self) -> &UnitSet {
        &self.seeds
    }

    /// Locations of the repositories, in declaration order.
    pub fn artifact_repositories(&self) -> &[Url] {
        &self.artifact_repositories
    }
}
