//! Coordinator for a named collection of deployments sharing one ledger.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ledger::{CandidateSource, DependencyLedger, IngestReport};
use crate::revision::{Revision, UpdateTarget};
use crate::stage::{StageAdvance, StageSummary};

use super::{CoordinatorConfig, DeploymentSpec, DeploymentState, ingest_names};

/// Static description of every deployment in a collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiSpec {
    #[serde(default)]
    pub deployments: Vec<DeploymentSpec>,
}

impl MultiSpec {
    pub fn deployment(&self, name: &str) -> Option<&DeploymentSpec> {
        self.deployments.iter().find(|spec| spec.name == name)
    }

    pub fn validate(&self) -> Result<()> {
        let mut names = BTreeSet::new();
        for spec in &self.deployments {
            if !names.insert(spec.name.as_str()) {
                return Err(Error::InvalidSpec(format!(
                    "deployment '{}' is declared more than once",
                    spec.name
                )));
            }
            spec.validate()?;
        }
        Ok(())
    }
}

/// Per-deployment state plus the shared ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiState {
    pub deployments: BTreeMap<String, DeploymentState>,
    pub dependencies: DependencyLedger,
}

/// Many deployments composed with their states and one shared ledger.
#[derive(Debug)]
pub struct MultiDeployment {
    spec: MultiSpec,
    state: MultiState,
    config: CoordinatorConfig,
}

impl MultiDeployment {
    /// Compose the collection spec with loaded state.
    ///
    /// A deployment may be declared without state (it has not been
    /// bootstrapped yet); state for an undeclared deployment is rejected
    /// when validation is enabled.
    pub fn new(spec: MultiSpec, state: MultiState, config: CoordinatorConfig) -> Result<Self> {
        spec.validate()?;
        if config.validate_state {
            state.dependencies.validate()?;
            for (name, deployment) in &state.deployments {
                let deployment_spec = spec.deployment(name).ok_or_else(|| {
                    Error::InvalidState(format!("state recorded for undeclared deployment '{name}'"))
                })?;
                deployment.validate(deployment_spec)?;
            }
        }
        Ok(Self {
            spec,
            state,
            config,
        })
    }

    pub fn spec(&self) -> &MultiSpec {
        &self.spec
    }

    pub fn state(&self) -> &MultiState {
        &self.state
    }

    pub fn into_state(self) -> MultiState {
        self.state
    }

    pub fn ledger(&self) -> &DependencyLedger {
        &self.state.dependencies
    }

    /// Names of declared deployments, in spec order.
    pub fn deployment_names(&self) -> Vec<&str> {
        self.spec
            .deployments
            .iter()
            .map(|spec| spec.name.as_str())
            .collect()
    }

    /// Constraints declared by one deployment.
    pub fn deployment_dependency_constraints(
        &self,
        deployment: &str,
    ) -> Result<BTreeMap<String, String>> {
        Ok(self.deployment_spec(deployment)?.constraints())
    }

    pub fn latest_revision(&self, deployment: &str) -> Result<Option<&Revision>> {
        let (_, state) = self.lookup(deployment)?;
        Ok(state.revisions.latest())
    }

    /// Fetch candidates for every deployment's dependencies into the shared ledger.
    pub fn ingest<S>(&mut self, source: &mut S) -> IngestReport
    where
        S: CandidateSource + ?Sized,
    {
        let _guard = self.config.span.enter();
        let names = ingest_names(&self.spec.deployments, &self.state.dependencies);
        self.state
            .dependencies
            .ingest(names.iter().map(String::as_str), source)
    }

    /// Append the next revision to one deployment's log.
    pub fn recompute(
        &mut self,
        deployment: &str,
        target: &UpdateTarget,
    ) -> Result<Option<Revision>> {
        let _guard = self.config.span.enter();
        let _span = tracing::info_span!("deployment", name = deployment).entered();
        let spec = self
            .spec
            .deployment(deployment)
            .ok_or_else(|| Error::DeploymentNotFound(deployment.to_string()))?;
        let state = self
            .state
            .deployments
            .get_mut(deployment)
            .ok_or_else(|| Error::DeploymentNotFound(deployment.to_string()))?;
        state.recompute(spec, &self.state.dependencies, target)
    }

    pub fn advance_stage(&mut self, deployment: &str, stage: &str) -> Result<StageAdvance> {
        let _guard = self.config.span.enter();
        let _span = tracing::info_span!("deployment", name = deployment).entered();
        let spec = self
            .spec
            .deployment(deployment)
            .ok_or_else(|| Error::DeploymentNotFound(deployment.to_string()))?;
        let state = self
            .state
            .deployments
            .get_mut(deployment)
            .ok_or_else(|| Error::DeploymentNotFound(deployment.to_string()))?;
        state.advance(spec, stage)
    }

    pub fn stage_summary(&self, deployment: &str, stage: &str) -> Result<StageSummary> {
        let _guard = self.config.span.enter();
        let (spec, state) = self.lookup(deployment)?;
        state.summary(spec, stage, &self.state.dependencies)
    }

    fn deployment_spec(&self, deployment: &str) -> Result<&DeploymentSpec> {
        self.spec
            .deployment(deployment)
            .ok_or_else(|| Error::DeploymentNotFound(deployment.to_string()))
    }

    fn lookup(&self, deployment: &str) -> Result<(&DeploymentSpec, &DeploymentState)> {
        let spec = self.deployment_spec(deployment)?;
        let state = self
            .state
            .deployments
            .get(deployment)
            .ok_or_else(|| Error::DeploymentNotFound(deployment.to_string()))?;
        Ok((spec, state))
    }
}
