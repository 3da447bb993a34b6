//! Error types for ledger, revision, and stage operations.

use thiserror::Error;

/// Boxed failure returned by a candidate source collaborator.
pub type SourceError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors returned by the coordinator core.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid version '{version}': {source}")]
    InvalidVersion {
        version: String,
        #[source]
        source: semver::Error,
    },

    #[error("Invalid version constraint '{constraint}': {source}")]
    InvalidConstraint {
        constraint: String,
        #[source]
        source: semver::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Dependency not found in ledger: {0}")]
    DependencyNotFound(String),

    #[error("Stage not found: {0}")]
    StageNotFound(String),

    #[error("Deployment not found: {0}")]
    DeploymentNotFound(String),

    #[error("No ledger data for dependency '{0}'")]
    NoLedgerData(String),

    #[error("Unable to resolve dependency '{name}' with constraint '{constraint}'")]
    UnresolvedDependency { name: String, constraint: String },

    #[error("Stage '{stage}' cannot be initialized before stage '{requires}'")]
    OutOfOrderInitialization { stage: String, requires: String },

    #[error("Revision log is empty")]
    EmptyRevisionLog,

    #[error("Stage '{stage}' points at revision {id}, which is not in the revision log")]
    RevisionNotFound { stage: String, id: i64 },

    #[error("Failed to fetch candidates for '{name}': {source}")]
    Fetch {
        name: String,
        #[source]
        source: SourceError,
    },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid deployment spec: {0}")]
    InvalidSpec(String),
}

impl Error {
    /// Malformed version, constraint, or document.
    pub fn is_parse(&self) -> bool {
        matches!(
            self,
            Error::InvalidVersion { .. } | Error::InvalidConstraint { .. } | Error::Yaml(_)
        )
    }

    /// Unknown dependency, stage, or deployment name.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::DependencyNotFound(_) | Error::StageNotFound(_) | Error::DeploymentNotFound(_)
        )
    }
}

/// Result type for coordinator operations
pub type Result<T> = std::result::Result<T, Error>;
