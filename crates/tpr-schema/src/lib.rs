//! Metadata model shared by the target platform resolver crates.
//!
//! Versions and ranges, filter expressions, selection contexts, installable
//! units, repository references and target definitions. Everything here is
//! plain data with `serde` support; the behaviour lives in `tpr-core`.

pub mod context;
pub mod filter;
pub mod repository;
pub mod target;
pub mod unit;
pub mod version;

// Re-exports
pub use context::{SelectionContext, TargetEnvironment};
pub use filter::{Filter, FilterError};
pub use repository::{ArtifactDescriptor, ReferenceEntry, RepositoryKind, RepositoryReference};
pub use target::{Location, Repository, TargetDefinition, UnitLocation, UnitReference};
pub use unit::{
    ArtifactKey, InstallableUnit, NAMESPACE_IU_ID, ProvidedCapability, Requirement, UNBOUNDED,
    UnitKey,
};
pub use version::{Version, VersionError, VersionRange};
