//! Domain-specific errors for repository access, resolution and mirroring

use std::path::PathBuf;
use thiserror::Error;
use tpr_schema::{ArtifactKey, VersionError};
use url::Url;

/// Failure to read or write a repository through a
/// [`RepositoryManager`](crate::repo::RepositoryManager).
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Nothing exists at the location.
    #[error("No repository found at {0}")]
    NotFound(Url),

    /// The manager cannot handle this kind of URL.
    #[error("Unsupported repository location {0}")]
    UnsupportedLocation(Url),

    /// Reading or writing the repository files failed.
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        /// File that was being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The repository document could not be (de)serialized.
    #[error("Malformed repository document {}: {source}", .path.display())]
    Format {
        /// File that was being parsed or written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
}

/// Everything that can abort a target resolution run.
#[derive(Error, Debug)]
pub enum ResolutionError {
    /// A repository declared by a location could not be loaded.
    #[error("Failed to load metadata repository from URL {location}: {source}")]
    RepositoryLoadFailure {
        /// The repository location.
        location: Url,
        /// Why loading failed.
        #[source]
        source: RepositoryError,
    },

    /// A seed reference matched nothing in its location.
    #[error("Unit {id}/{version} is not contained in the repositories in the same location")]
    UnitNotFound {
        /// Referenced unit id.
        id: String,
        /// Referenced version string.
        version: String,
    },

    /// A seed reference carries an unparseable version.
    #[error("Cannot parse version \"{version}\" of unit \"{id}\"")]
    InvalidVersion {
        /// Referenced unit id.
        id: String,
        /// The offending version string.
        version: String,
        /// Parser error.
        #[source]
        source: VersionError,
    },

    /// Closure computation reported problems.
    #[error("Slicing failed: {}", .diagnostics.join("; "))]
    SlicingFailed {
        /// Collected problem messages.
        diagnostics: Vec<String>,
        /// Deepest underlying cause, if any.
        cause: Option<String>,
    },

    /// The solver found the request unsatisfiable.
    #[error("Cannot resolve dependencies:\n{explanation}")]
    UnresolvedDependency {
        /// Human-readable description of the conflicting constraints.
        explanation: String,
    },
}

/// Failures of a mirror run.
#[derive(Error, Debug)]
pub enum MirrorError {
    /// A source repository could not be loaded.
    #[error("Failed to load source repository {location}: {source}")]
    Source {
        /// Source location.
        location: Url,
        /// Why loading failed.
        #[source]
        source: RepositoryError,
    },

    /// The destination could not be created, opened or written.
    #[error("Failed to initialize destination repository {location}: {source}")]
    Destination {
        /// Destination location.
        location: Url,
        /// Why the destination failed.
        #[source]
        source: RepositoryError,
    },

    /// Root unit lookup or slicing failed.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// A unit references an artifact that no source repository has.
    #[error("Artifact {0} not found in any source repository")]
    ArtifactNotFound(ArtifactKey),

    /// No metadata source was configured.
    #[error("No source repositories configured")]
    NoSources,
}
