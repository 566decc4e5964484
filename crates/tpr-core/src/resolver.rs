//! Target definition resolution.
//!
//! The coordinator loads every location, gathers the seeds and available
//! units of all of them, resolves each execution environment on its own and
//! unions the per-environment results.

use crate::environment::EnvironmentResolver;
use crate::error::ResolutionError;
use crate::location::LoadedLocation;
use crate::planner::Planner;
use crate::pubgrub_adapter::PubGrubPlanner;
use crate::repo::RepositoryManager;
use crate::space::{CompoundSpace, UnitSet, UnitSource};
use std::sync::Arc;
use tpr_schema::{Location, SelectionContext, TargetDefinition, TargetEnvironment};
use url::Url;

/// The resolved content of a target definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetPlatformContent {
    units: UnitSet,
    artifact_repositories: Vec<Url>,
}

impl TargetPlatformContent {
    /// Every unit selected in at least one environment.
    pub fn units(&self) -> &UnitSet {
        &self.units
    }

    /// Repositories the units' artifacts can be fetched from, in declaration order.
    pub fn artifact_repositories(&self) -> &[Url] {
        &self.artifact_repositories
    }
}

/// Resolves target definitions into [`TargetPlatformContent`].
#[derive(Debug, Clone)]
pub struct TargetDefinitionResolver {
    environments: Vec<TargetEnvironment>,
    manager: Arc<dyn RepositoryManager>,
    planner: Arc<dyn Planner>,
}

impl TargetDefinitionResolver {
    /// Resolver for `environments`, loading repositories through `manager`.
    ///
    /// When `environments` is empty, those declared by the definition are
    /// used; when it declares none either, a single unconstrained environment
    /// is resolved.
    pub fn new(environments: Vec<TargetEnvironment>, manager: Arc<dyn RepositoryManager>) -> Self {
        Self {
            environments,
            manager,
            planner: Arc::new(PubGrubPlanner::new()),
        }
    }

    /// Replace the default planner.
    pub fn with_planner(mut self, planner: Arc<dyn Planner>) -> Self {
        self.planner = planner;
        self
    }

    /// Resolve `definition`.
    ///
    /// # Errors
    ///
    /// Fails on the first location that cannot be loaded or the first
    /// environment that cannot be resolved; no partial content is returned.
    pub fn resolve_content(
        &self,
        definition: &TargetDefinition,
    ) -> Result<TargetPlatformContent, ResolutionError> {
        let mut seeds = UnitSet::new();
        let mut spaces: Vec<Arc<dyn UnitSource>> = Vec::new();
        let mut artifact_repositories: Vec<Url> = Vec::new();

        for location in &definition.locations {
            let Location::InstallableUnit(unit_location) = location else {
                tracing::warn!(
                    "Target location type: {} is not supported",
                    location.type_description()
                );
                continue;
            };

            let loaded = LoadedLocation::load(unit_location, self.manager.as_ref())?;
            seeds.extend(loaded.seed_units().iter().cloned());
            spaces.push(Arc::clone(loaded.available_units()));
            for url in loaded.artifact_repositories() {
                if !artifact_repositories.contains(url) {
                    artifact_repositories.push(url.clone());
                }
            }
        }

        let available = CompoundSpace::of(spaces);
        let environments = self.environments_for(definition);
        tracing::info!(
            "Resolving {} seed units for {} environment(s)",
            seeds.len(),
            environments.len()
        );

        let mut units = UnitSet::new();
        for environment in &environments {
            let context = SelectionContext::from_environment(environment);
            let resolver = EnvironmentResolver::new(self.planner.as_ref(), context);
            let resolved = resolver.resolve(&seeds, available.as_ref())?;
            tracing::debug!("{} units resolved for {}", resolved.len(), environment);
            units.extend(resolved);
        }

        Ok(TargetPlatformContent {
            units,
            artifact_repositories,
        })
    }

    fn environments_for(&self, definition: &TargetDefinition) -> Vec<TargetEnvironment> {
        if !self.environments.is_empty() {
            return self.environments.clone();
        }
        if !definition.environments.is_empty() {
            return definition.environments.clone();
        }
        vec![TargetEnvironment::default()]
    }
}
