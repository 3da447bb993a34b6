//! Loads the configured spec and state, and saves state back as one unit.

use anyhow::{Context, Result};

use stagehand_core::config::StagehandConfig;
use stagehand_core::deployment::{CoordinatorConfig, MultiDeployment, SingleDeployment};
use stagehand_core::document::SpecDocument;
use stagehand_core::ledger::{CandidateSource, IngestReport};
use stagehand_core::revision::{Revision, UpdateTarget};
use stagehand_core::stage::{StageAdvance, StageSummary};
use stagehand_core::store::{self, StateStore};

/// The coordinator for whichever spec shape the project uses.
pub enum Workspace {
    Single(SingleDeployment),
    Multi {
        coordinator: MultiDeployment,
        selected: Option<String>,
    },
}

impl Workspace {
    pub fn open(
        config: &StagehandConfig,
        deployment: Option<String>,
    ) -> Result<(Self, StateStore)> {
        let state_store = StateStore::new(&config.state);
        let workspace = match store::load_spec(&config.spec)? {
            SpecDocument::Single(spec) => {
                if deployment.is_some() {
                    tracing::warn!("--deployment ignored for a single-deployment spec");
                }
                let span = tracing::info_span!("deployment", name = %spec.name);
                let state = state_store.load_single()?;
                Workspace::Single(SingleDeployment::new(
                    spec,
                    state,
                    CoordinatorConfig::new(span),
                )?)
            }
            SpecDocument::Multi(spec) => {
                let span = tracing::info_span!("collection");
                let state = state_store.load_multi()?;
                Workspace::Multi {
                    coordinator: MultiDeployment::new(spec, state, CoordinatorConfig::new(span))?,
                    selected: deployment,
                }
            }
        };
        Ok((workspace, state_store))
    }

    pub fn save(&self, store: &StateStore) -> Result<()> {
        match self {
            Workspace::Single(coordinator) => store.save_single(coordinator.state()),
            Workspace::Multi { coordinator, .. } => store.save_multi(coordinator.state()),
        }
        .with_context(|| format!("Failed to save state to {}", store.path().display()))
    }

    pub fn ingest(&mut self, source: &mut dyn CandidateSource) -> IngestReport {
        match self {
            Workspace::Single(coordinator) => coordinator.ingest(source),
            Workspace::Multi { coordinator, .. } => coordinator.ingest(source),
        }
    }

    pub fn recompute(&mut self, target: &UpdateTarget) -> Result<Option<Revision>> {
        Ok(match self {
            Workspace::Single(coordinator) => coordinator.recompute(target)?,
            Workspace::Multi {
                coordinator,
                selected,
            } => {
                let name = require(coordinator, selected)?;
                coordinator.recompute(name, target)?
            }
        })
    }

    pub fn advance(&mut self, stage: &str) -> Result<StageAdvance> {
        Ok(match self {
            Workspace::Single(coordinator) => coordinator.advance_stage(stage)?,
            Workspace::Multi {
                coordinator,
                selected,
            } => {
                let name = require(coordinator, selected)?;
                coordinator.advance_stage(name, stage)?
            }
        })
    }

    pub fn summary(&self, stage: &str) -> Result<StageSummary> {
        Ok(match self {
            Workspace::Single(coordinator) => coordinator.stage_summary(stage)?,
            Workspace::Multi {
                coordinator,
                selected,
            } => {
                let name = require(coordinator, selected)?;
                coordinator.stage_summary(name, stage)?
            }
        })
    }

    /// One status block per deployment: name, latest revision, stage pins.
    pub fn status(&self) -> Vec<DeploymentStatus> {
        match self {
            Workspace::Single(coordinator) => {
                let deployment = &coordinator.state().deployment;
                vec![DeploymentStatus {
                    name: coordinator.spec().name.clone(),
                    latest: deployment.revisions.latest().map(|r| r.id),
                    stages: coordinator
                        .spec()
                        .stages
                        .iter()
                        .map(|spec| {
                            let pin = deployment.stages.state(&spec.name).map(|s| s.revision);
                            (spec.name.clone(), pin)
                        })
                        .collect(),
                }]
            }
            Workspace::Multi { coordinator, .. } => coordinator
                .spec()
                .deployments
                .iter()
                .map(|spec| {
                    let deployment = coordinator.state().deployments.get(&spec.name);
                    DeploymentStatus {
                        name: spec.name.clone(),
                        latest: deployment.and_then(|d| d.revisions.latest()).map(|r| r.id),
                        stages: spec
                            .stages
                            .iter()
                            .map(|stage| {
                                let pin = deployment
                                    .and_then(|d| d.stages.state(&stage.name))
                                    .map(|s| s.revision);
                                (stage.name.clone(), pin)
                            })
                            .collect(),
                    }
                })
                .collect(),
        }
    }
}

pub struct DeploymentStatus {
    pub name: String,
    pub latest: Option<i64>,
    pub stages: Vec<(String, Option<i64>)>,
}

fn require<'a>(coordinator: &MultiDeployment, selected: &'a Option<String>) -> Result<&'a str> {
    selected.as_deref().ok_or_else(|| {
        anyhow::anyhow!(
            "Multi-deployment spec: pass --deployment <NAME> (one of: {})",
            coordinator.deployment_names().join(", ")
        )
    })
}
