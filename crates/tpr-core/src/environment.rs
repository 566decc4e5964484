//! Resolution of one execution environment: slice, then solve.

use crate::error::ResolutionError;
use crate::meta::create_meta_unit;
use crate::planner::{Planner, SolveRequest};
use crate::slicer::SlicingPolicy;
use crate::space::{UnitSet, UnitSource};
use tpr_schema::SelectionContext;

/// Resolves seeds against an available unit space for one selection context.
#[derive(Debug)]
pub struct EnvironmentResolver<'a> {
    planner: &'a dyn Planner,
    context: SelectionContext,
}

impl<'a> EnvironmentResolver<'a> {
    /// Resolver for `context` using `planner`.
    pub fn new(planner: &'a dyn Planner, context: SelectionContext) -> Self {
        Self { planner, context }
    }

    /// The selection context filters are evaluated in.
    pub fn context(&self) -> &SelectionContext {
        &self.context
    }

    /// Pick a consistent unit set containing every seed.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::SlicingFailed`] if the closure cannot be
    /// computed and [`ResolutionError::UnresolvedDependency`] if the planner
    /// finds no consistent set.
    pub fn resolve(
        &self,
        seeds: &UnitSet,
        available: &dyn UnitSource,
    ) -> Result<UnitSet, ResolutionError> {
        let policy = SlicingPolicy::strict(self.context.clone());
        let slice = self.planner.slice(available, &seeds.to_vec(), &policy)?;

        let root = create_meta_unit(seeds.iter().map(|u| &**u));
        let nothing = UnitSet::new();
        let request = SolveRequest {
            root: &root,
            installed: &nothing,
            existing_roots: &nothing,
            new_roots: seeds,
            candidates: &slice.units,
            context: &self.context,
        };

        self.planner.solve(&request).map_err(|unsatisfiable| {
            tracing::debug!("No solution for context {:?}", self.context);
            ResolutionError::UnresolvedDependency {
                explanation: unsatisfiable.to_string(),
            }
        })
    }
}
