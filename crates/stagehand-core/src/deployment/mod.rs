//! Deployment specs, mutable deployment state, and the coordinators.
//!
//! Both coordinators drive the same revision selection and stage promotion
//! code; they differ only in where the ledger lives:
//! - [`SingleDeployment`]: one deployment owning its own ledger
//! - [`MultiDeployment`]: many deployments sharing one ledger

pub mod multi;
pub mod single;

pub use multi::{MultiDeployment, MultiSpec, MultiState};
pub use single::{SingleDeployment, SingleState};

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ledger::LedgerView;
use crate::revision::{Revision, RevisionLog, UpdateTarget};
use crate::stage::{StageAdvance, StagePointers, StageSpec, StageSummary};
use crate::version::Constraint;

/// A dependency a deployment tracks, with its version constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySpec {
    pub name: String,

    /// Constraint expression; empty accepts any version
    #[serde(default)]
    pub version: String,
}

impl DependencySpec {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Static description of one deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentSpec {
    pub name: String,

    /// Promotion chain, in order
    #[serde(default)]
    pub stages: Vec<StageSpec>,

    #[serde(default)]
    pub dependencies: Vec<DependencySpec>,
}

impl DeploymentSpec {
    /// Declared constraints keyed by dependency name.
    pub fn constraints(&self) -> BTreeMap<String, String> {
        self.dependencies
            .iter()
            .map(|dep| (dep.name.clone(), dep.version.clone()))
            .collect()
    }

    pub fn stage(&self, name: &str) -> Option<&StageSpec> {
        self.stages.iter().find(|stage| stage.name == name)
    }

    /// Reject duplicate names and unparseable constraints.
    pub fn validate(&self) -> Result<()> {
        let mut stages = BTreeSet::new();
        for stage in &self.stages {
            if !stages.insert(stage.name.as_str()) {
                return Err(Error::InvalidSpec(format!(
                    "deployment '{}' declares stage '{}' more than once",
                    self.name, stage.name
                )));
            }
        }

        let mut dependencies = BTreeSet::new();
        for dep in &self.dependencies {
            if !dependencies.insert(dep.name.as_str()) {
                return Err(Error::InvalidSpec(format!(
                    "deployment '{}' declares dependency '{}' more than once",
                    self.name, dep.name
                )));
            }
            Constraint::parse(&dep.version)?;
        }
        Ok(())
    }
}

/// Mutable state of one deployment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploymentState {
    pub revisions: RevisionLog,
    pub stages: StagePointers,
}

impl DeploymentState {
    pub fn new(revisions: RevisionLog, stages: StagePointers) -> Self {
        Self { revisions, stages }
    }

    pub fn validate(&self, spec: &DeploymentSpec) -> Result<()> {
        self.stages.validate(&spec.stages, &self.revisions)
    }

    pub(crate) fn recompute<L>(
        &mut self,
        spec: &DeploymentSpec,
        ledger: &L,
        target: &UpdateTarget,
    ) -> Result<Option<Revision>>
    where
        L: LedgerView + ?Sized,
    {
        let constraints = spec.constraints();
        Ok(self
            .revisions
            .recompute(ledger, target, &constraints)?
            .cloned())
    }

    pub(crate) fn advance(&mut self, spec: &DeploymentSpec, stage: &str) -> Result<StageAdvance> {
        self.stages.advance(&spec.stages, stage, &self.revisions)
    }

    pub(crate) fn summary<L>(
        &self,
        spec: &DeploymentSpec,
        stage: &str,
        ledger: &L,
    ) -> Result<StageSummary>
    where
        L: LedgerView + ?Sized,
    {
        self.stages
            .summary(&spec.stages, stage, &self.revisions, ledger)
    }
}

/// Construction options shared by both coordinators.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Span every coordinator operation is recorded in
    pub span: tracing::Span,

    /// Validate loaded ledger, revisions, and stage pointers on construction
    pub validate_state: bool,
}

impl CoordinatorConfig {
    pub fn new(span: tracing::Span) -> Self {
        Self {
            span,
            validate_state: true,
        }
    }

    pub fn without_validation(mut self) -> Self {
        self.validate_state = false;
        self
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self::new(tracing::Span::none())
    }
}

/// Names to ingest: declared dependencies plus everything already tracked.
fn ingest_names<'a, L>(
    specs: impl IntoIterator<Item = &'a DeploymentSpec>,
    ledger: &'a L,
) -> Vec<String>
where
    L: LedgerView + ?Sized,
{
    let mut names: BTreeSet<String> = specs
        .into_iter()
        .flat_map(|spec| spec.dependencies.iter().map(|dep| dep.name.clone()))
        .collect();
    names.extend(ledger.dependency_names().into_iter().map(str::to_string));
    names.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_duplicate_stage() {
        let spec = DeploymentSpec {
            name: "web".to_string(),
            stages: vec![StageSpec::new("dev"), StageSpec::new("dev")],
            dependencies: Vec::new(),
        };
        assert!(matches!(spec.validate(), Err(Error::InvalidSpec(_))));
    }

    #[test]
    fn test_validate_bad_constraint() {
        let spec = DeploymentSpec {
            name: "web".to_string(),
            stages: vec![StageSpec::new("dev")],
            dependencies: vec![DependencySpec::new("app", ">= nope")],
        };
        assert!(spec.validate().unwrap_err().is_parse());
    }

    #[test]
    fn test_constraints_map() {
        let spec = DeploymentSpec {
            name: "web".to_string(),
            stages: Vec::new(),
            dependencies: vec![
                DependencySpec::new("app", ">=1.0.0"),
                DependencySpec::new("db", ""),
            ],
        };
        let constraints = spec.constraints();
        assert_eq!(constraints["app"], ">=1.0.0");
        assert_eq!(constraints["db"], "");
    }
}
