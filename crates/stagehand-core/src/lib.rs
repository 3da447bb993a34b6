//! Stagehand Core Library
//!
//! Tracks observed versions of external dependencies in an append-only
//! ledger, derives immutable revisions from it under per-dependency semver
//! constraints, and promotes those revisions through an ordered pipeline of
//! stages, for a single deployment or a collection sharing one ledger.

pub mod config;
pub mod deployment;
pub mod document;
pub mod error;
pub mod ledger;
pub mod revision;
pub mod sources;
pub mod stage;
pub mod store;
pub mod version;

pub use error::{Error, Result};

/// Re-exports of commonly used types
pub mod prelude {
    // Errors
    pub use crate::error::{Error, Result};

    // Ledger
    pub use crate::ledger::{
        Candidate, CandidateSource, DependencyLedger, IngestReport, LedgerView, Metadata,
    };

    // Revisions
    pub use crate::revision::{Revision, RevisionLog, UpdateTarget};

    // Stages
    pub use crate::stage::{StageAdvance, StagePointers, StageSpec, StageState, StageSummary};

    // Coordinators
    pub use crate::deployment::{
        CoordinatorConfig, DependencySpec, DeploymentSpec, DeploymentState, MultiDeployment,
        MultiSpec, MultiState, SingleDeployment, SingleState,
    };

    // Persistence
    pub use crate::document::SpecDocument;
    pub use crate::store::StateStore;

    // Version
    pub use crate::version::{Constraint, Version};
}
