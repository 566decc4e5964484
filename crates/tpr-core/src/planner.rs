//! The slice-and-solve contract the resolver relies on.

use crate::error::ResolutionError;
use crate::slicer::{Slice, Slicer, SlicingPolicy};
use crate::space::{UnitSet, UnitSource};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tpr_schema::{InstallableUnit, SelectionContext};

/// Everything a planner needs to pick a consistent set of units.
#[derive(Debug, Clone, Copy)]
pub struct SolveRequest<'a> {
    /// Transient root whose requirements name the units to install.
    pub root: &'a InstallableUnit,
    /// Units already installed.
    pub installed: &'a UnitSet,
    /// Roots of the existing installation.
    pub existing_roots: &'a UnitSet,
    /// Roots being added by this request.
    pub new_roots: &'a UnitSet,
    /// Units the planner may choose from.
    pub candidates: &'a UnitSet,
    /// Environment the filters are evaluated in.
    pub context: &'a SelectionContext,
}

/// The request cannot be satisfied.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}", .explanations.join("\n"))]
pub struct Unsatisfiable {
    /// Descriptions of the conflicting constraints.
    pub explanations: Vec<String>,
}

impl Unsatisfiable {
    /// A single-line explanation.
    pub fn new(explanation: impl Into<String>) -> Self {
        Self {
            explanations: vec![explanation.into()],
        }
    }
}

/// A dependency closure and constraint-solving backend.
///
/// Implementations must be usable from several environments at once; they
/// receive only shared references to immutable data.
pub trait Planner: Send + Sync + fmt::Debug {
    /// Compute the closure of `seeds` over `space` under `policy`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::SlicingFailed`] if the closure cannot be used.
    fn slice(
        &self,
        space: &dyn UnitSource,
        seeds: &[Arc<InstallableUnit>],
        policy: &SlicingPolicy,
    ) -> Result<Slice, ResolutionError> {
        Slicer::new(space, policy).slice(seeds)
    }

    /// Pick a consistent set of units satisfying `request.root`.
    ///
    /// The returned set never contains the root itself.
    ///
    /// # Errors
    ///
    /// Returns [`Unsatisfiable`] with an explanation if no such set exists.
    fn solve(&self, request: &SolveRequest<'_>) -> Result<UnitSet, Unsatisfiable>;
}
