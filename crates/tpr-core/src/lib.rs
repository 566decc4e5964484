//! Target platform resolution and repository mirroring.
//!
//! # Overview
//!
//! A target definition lists repository locations and the seed units to take
//! from them. [`TargetDefinitionResolver`] turns it into a closed,
//! dependency-consistent set of units for every execution environment:
//!
//! 1. each location is loaded and its unit references are matched
//!    ([`location`], [`matcher`]);
//! 2. per environment, the seeds are sliced over all available units and a
//!    [`Planner`] picks a consistent subset ([`environment`], [`slicer`]);
//! 3. the per-environment results are unioned.
//!
//! [`MirrorApplication`] copies a selection of units, their dependencies and
//! their artifacts into a destination repository.

pub mod environment;
pub mod error;
pub mod location;
pub mod matcher;
pub mod meta;
pub mod mirror;
pub mod planner;
pub mod pubgrub_adapter;
pub mod repo;
pub mod resolver;
pub mod slicer;
pub mod space;

pub use error::{MirrorError, RepositoryError, ResolutionError};
pub use mirror::{MirrorApplication, MirrorReport, RootSelection};
pub use planner::{Planner, SolveRequest, Unsatisfiable};
pub use pubgrub_adapter::PubGrubPlanner;
pub use repo::{
    ArtifactRepository, InMemoryRepositoryManager, LocalRepositoryManager, MetadataRepository,
    RepositoryDescriptor, RepositoryManager,
};
pub use resolver::{TargetDefinitionResolver, TargetPlatformContent};
pub use slicer::{SlicingOptions, SlicingPolicy};
pub use space::{UnitSet, UnitSource};
