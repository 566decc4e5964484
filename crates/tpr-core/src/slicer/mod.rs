//! Dependency closure ("slicing") over a unit space.
//!
//! Starting from a set of seed units, the [`Slicer`] follows every
//! requirement its [`SlicingPolicy`] declares applicable and greedy, and
//! collects all providers it can reach. The result is the candidate space
//! handed to a planner; it is deliberately over-approximate, since choosing
//! between alternatives is the planner's job.

mod policy;

pub use policy::{ApplicabilityRule, GroupMembershipRule, SlicingOptions, SlicingPolicy};

use crate::error::ResolutionError;
use crate::space::{CapabilityIndex, UnitSet, UnitSource};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tpr_schema::InstallableUnit;

/// How serious a slicing diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Recorded, but the slice is still usable.
    Warning,
    /// The slice cannot be used.
    Error,
}

/// A message produced while slicing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Severity.
    pub severity: Severity,
    /// Human-readable message.
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// The closure computed by [`Slicer::slice`].
#[derive(Debug, Clone, Default)]
pub struct Slice {
    /// Reachable units, seeds included.
    pub units: UnitSet,
    /// Non-fatal problems found on the way.
    pub diagnostics: Vec<Diagnostic>,
}

/// Computes closures of seeds over one unit space.
#[derive(Debug)]
pub struct Slicer<'a> {
    space: &'a dyn UnitSource,
    policy: &'a SlicingPolicy,
}

impl<'a> Slicer<'a> {
    /// Slice `space` under `policy`.
    pub fn new(space: &'a dyn UnitSource, policy: &'a SlicingPolicy) -> Self {
        Self { space, policy }
    }

    /// Compute the closure of `seeds`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::SlicingFailed`] when a seed does not apply
    /// under the policy. Requirements without providers are only reported as
    /// warnings in [`Slice::diagnostics`].
    pub fn slice<'s>(
        &self,
        seeds: impl IntoIterator<Item = &'s Arc<InstallableUnit>>,
    ) -> Result<Slice, ResolutionError> {
        let index = CapabilityIndex::build(self.space);
        let mut slice = Slice::default();
        let mut queue = VecDeque::new();

        for seed in seeds {
            if !self.policy.includes_unit(seed) {
                slice.diagnostics.push(Diagnostic {
                    severity: Severity::Error,
                    message: format!("The unit {} does not apply to the target environment", seed.key()),
                });
                continue;
            }
            if slice.units.insert(Arc::clone(seed)) {
                queue.push_back(Arc::clone(seed));
            }
        }

        if slice
            .diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
        {
            return Err(failure(slice.diagnostics));
        }

        while let Some(unit) = queue.pop_front() {
            for requirement in &unit.requirements {
                if requirement.max == 0
                    || !self.policy.is_applicable(&unit, requirement)
                    || !self.policy.is_greedy(requirement)
                {
                    continue;
                }

                let mut matched = false;
                for provider in index.providers(requirement) {
                    if !self.policy.includes_unit(&provider) {
                        continue;
                    }
                    matched = true;
                    if slice.units.insert(Arc::clone(&provider)) {
                        queue.push_back(provider);
                    }
                }

                if !matched && !requirement.is_optional() {
                    let message = format!(
                        "Unable to satisfy dependency from {} to {}",
                        unit.key(),
                        requirement
                    );
                    tracing::warn!("{message}");
                    slice.diagnostics.push(Diagnostic {
                        severity: Severity::Warning,
                        message,
                    });
                }
            }
        }

        tracing::debug!("Slice contains {} units", slice.units.len());
        Ok(slice)
    }
}

fn failure(diagnostics: Vec<Diagnostic>) -> ResolutionError {
    let cause = diagnostics
        .iter()
        .find(|d| d.severity == Severity::Error)
        .map(ToString::to_string);
    ResolutionError::SlicingFailed {
        diagnostics: diagnostics.iter().map(ToString::to_string).collect(),
        cause,
    }
}
