//! Coordinator for a single deployment that owns its ledger.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::ledger::{CandidateSource, DependencyLedger, IngestReport};
use crate::revision::{Revision, UpdateTarget};
use crate::stage::{StageAdvance, StageSummary};

use super::{CoordinatorConfig, DeploymentSpec, DeploymentState, ingest_names};

/// Mutable state of a single deployment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SingleState {
    pub deployment: DeploymentState,
    pub dependencies: DependencyLedger,
}

/// One deployment spec composed with its state.
#[derive(Debug)]
pub struct SingleDeployment {
    spec: DeploymentSpec,
    state: SingleState,
    config: CoordinatorConfig,
}

impl SingleDeployment {
    /// Compose a spec with loaded state.
    ///
    /// The spec is always validated; the state is validated unless the
    /// config disables it.
    pub fn new(
        spec: DeploymentSpec,
        state: SingleState,
        config: CoordinatorConfig,
    ) -> Result<Self> {
        spec.validate()?;
        if config.validate_state {
            state.dependencies.validate()?;
            state.deployment.validate(&spec)?;
        }
        Ok(Self {
            spec,
            state,
            config,
        })
    }

    pub fn spec(&self) -> &DeploymentSpec {
        &self.spec
    }

    pub fn state(&self) -> &SingleState {
        &self.state
    }

    pub fn into_state(self) -> SingleState {
        self.state
    }

    pub fn ledger(&self) -> &DependencyLedger {
        &self.state.dependencies
    }

    pub fn constraints(&self) -> BTreeMap<String, String> {
        self.spec.constraints()
    }

    pub fn latest_revision(&self) -> Option<&Revision> {
        self.state.deployment.revisions.latest()
    }

    /// Fetch candidates for declared and already-tracked dependencies.
    pub fn ingest<S>(&mut self, source: &mut S) -> IngestReport
    where
        S: CandidateSource + ?Sized,
    {
        let _guard = self.config.span.enter();
        let names = ingest_names([&self.spec], &self.state.dependencies);
        self.state
            .dependencies
            .ingest(names.iter().map(String::as_str), source)
    }

    /// Append the next revision if any dependency moved.
    pub fn recompute(&mut self, target: &UpdateTarget) -> Result<Option<Revision>> {
        let _guard = self.config.span.enter();
        self.state
            .deployment
            .recompute(&self.spec, &self.state.dependencies, target)
    }

    pub fn advance_stage(&mut self, stage: &str) -> Result<StageAdvance> {
        let _guard = self.config.span.enter();
        self.state.deployment.advance(&self.spec, stage)
    }

    pub fn stage_summary(&self, stage: &str) -> Result<StageSummary> {
        let _guard = self.config.span.enter();
        self.state
            .deployment
            .summary(&self.spec, stage, &self.state.dependencies)
    }
}
