//! YAML encoding of deployment specs and mutable state.
//!
//! State file layout (single deployment):
//!
//! ```yaml
//! stages:
//! - name: dev
//!   revision: 2
//! revisions:
//! - id: 2
//!   versions:
//!     app: v1.0.1
//! dependencies:
//!   app:
//!     versions:
//!     - v1.0.0
//!     - v1.0.1
//! meta:
//!   dependencies:
//!     app:
//!       v1.0.1:
//!         digest: sha256:...
//! ```
//!
//! The multi-deployment layout nests per-deployment `stages`/`revisions`
//! under `state.deployments.<name>`, with the shared ledger at
//! `state.dependencies` and `state.meta`. Every map is a `BTreeMap`, so
//! output is key-sorted and stable across runs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::deployment::{DeploymentSpec, DeploymentState, MultiSpec, MultiState, SingleState};
use crate::error::{Error, Result};
use crate::ledger::{DependencyLedger, LedgerEntry, Metadata};
use crate::revision::{Revision, RevisionLog};
use crate::stage::{StagePointers, StageState};

/// A parsed spec document of either shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecDocument {
    Single(DeploymentSpec),
    Multi(MultiSpec),
}

impl SpecDocument {
    /// Parse a spec, treating a top-level `deployments` key as a multi spec.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let value: serde_yaml::Value = serde_yaml::from_slice(bytes)?;
        let is_multi = value
            .as_mapping()
            .is_some_and(|mapping| mapping.contains_key("deployments"));
        if is_multi {
            parse_multi_spec(bytes).map(SpecDocument::Multi)
        } else {
            parse_spec(bytes).map(SpecDocument::Single)
        }
    }
}

pub fn parse_spec(bytes: &[u8]) -> Result<DeploymentSpec> {
    Ok(serde_yaml::from_slice(bytes)?)
}

pub fn parse_multi_spec(bytes: &[u8]) -> Result<MultiSpec> {
    Ok(serde_yaml::from_slice(bytes)?)
}

#[derive(Debug, Serialize, Deserialize)]
struct StageRecord {
    name: String,
    revision: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct RevisionRecord {
    id: i64,
    #[serde(default)]
    versions: BTreeMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct LedgerRecord {
    #[serde(default)]
    versions: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct MetaRecord {
    #[serde(default)]
    dependencies: BTreeMap<String, BTreeMap<String, Metadata>>,
}

impl MetaRecord {
    fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StateFile {
    #[serde(default)]
    stages: Vec<StageRecord>,
    #[serde(default)]
    revisions: Vec<RevisionRecord>,
    #[serde(default)]
    dependencies: BTreeMap<String, LedgerRecord>,
    #[serde(default, skip_serializing_if = "MetaRecord::is_empty")]
    meta: MetaRecord,
}

#[derive(Debug, Serialize, Deserialize)]
struct MultiStateFile {
    state: MultiStateBody,
}

#[derive(Debug, Serialize, Deserialize)]
struct MultiStateBody {
    #[serde(default)]
    deployments: BTreeMap<String, DeploymentRecord>,
    #[serde(default)]
    dependencies: BTreeMap<String, LedgerRecord>,
    #[serde(default, skip_serializing_if = "MetaRecord::is_empty")]
    meta: MetaRecord,
}

#[derive(Debug, Serialize, Deserialize)]
struct DeploymentRecord {
    #[serde(default)]
    stages: Vec<StageRecord>,
    #[serde(default)]
    revisions: Vec<RevisionRecord>,
}

/// Decode a single-deployment state file.
pub fn parse_state(bytes: &[u8]) -> Result<SingleState> {
    let file: StateFile = serde_yaml::from_slice(bytes)?;
    Ok(SingleState {
        deployment: decode_deployment(file.stages, file.revisions)?,
        dependencies: decode_ledger(file.dependencies, file.meta)?,
    })
}

/// Encode a single-deployment state file.
pub fn marshal_state(state: &SingleState) -> Result<Vec<u8>> {
    let (stages, revisions) = encode_deployment(&state.deployment);
    let (dependencies, meta) = encode_ledger(&state.dependencies);
    let file = StateFile {
        stages,
        revisions,
        dependencies,
        meta,
    };
    Ok(serde_yaml::to_string(&file)?.into_bytes())
}

/// Decode a multi-deployment state file.
pub fn parse_multi_state(bytes: &[u8]) -> Result<MultiState> {
    let file: MultiStateFile = serde_yaml::from_slice(bytes)?;
    let deployments = file
        .state
        .deployments
        .into_iter()
        .map(|(name, record)| {
            let state = decode_deployment(record.stages, record.revisions)?;
            Ok((name, state))
        })
        .collect::<Result<BTreeMap<_, _>>>()?;
    Ok(MultiState {
        deployments,
        dependencies: decode_ledger(file.state.dependencies, file.state.meta)?,
    })
}

/// Encode a multi-deployment state file.
pub fn marshal_multi_state(state: &MultiState) -> Result<Vec<u8>> {
    let deployments = state
        .deployments
        .iter()
        .map(|(name, deployment)| {
            let (stages, revisions) = encode_deployment(deployment);
            (name.clone(), DeploymentRecord { stages, revisions })
        })
        .collect();
    let (dependencies, meta) = encode_ledger(&state.dependencies);
    let file = MultiStateFile {
        state: MultiStateBody {
            deployments,
            dependencies,
            meta,
        },
    };
    Ok(serde_yaml::to_string(&file)?.into_bytes())
}

fn decode_deployment(
    stages: Vec<StageRecord>,
    revisions: Vec<RevisionRecord>,
) -> Result<DeploymentState> {
    let revisions = RevisionLog::from_revisions(
        revisions
            .into_iter()
            .map(|record| Revision::new(record.id, record.versions))
            .collect(),
    )?;
    let stages = StagePointers::from_states(
        stages
            .into_iter()
            .map(|record| StageState {
                name: record.name,
                revision: record.revision,
            })
            .collect(),
    );
    Ok(DeploymentState::new(revisions, stages))
}

fn encode_deployment(state: &DeploymentState) -> (Vec<StageRecord>, Vec<RevisionRecord>) {
    let stages = state
        .stages
        .states()
        .iter()
        .map(|stage| StageRecord {
            name: stage.name.clone(),
            revision: stage.revision,
        })
        .collect();
    let revisions = state
        .revisions
        .revisions()
        .iter()
        .map(|revision| RevisionRecord {
            id: revision.id,
            versions: revision.versions.clone(),
        })
        .collect();
    (stages, revisions)
}

fn decode_ledger(
    dependencies: BTreeMap<String, LedgerRecord>,
    meta: MetaRecord,
) -> Result<DependencyLedger> {
    let mut entries: BTreeMap<String, LedgerEntry> = dependencies
        .into_iter()
        .map(|(name, record)| {
            let entry = LedgerEntry {
                versions: record.versions,
                meta: BTreeMap::new(),
            };
            (name, entry)
        })
        .collect();

    for (name, versions) in meta.dependencies {
        let entry = entries.get_mut(&name).ok_or_else(|| {
            Error::InvalidState(format!("metadata recorded for untracked dependency '{name}'"))
        })?;
        entry.meta = versions;
    }
    Ok(DependencyLedger::from_entries(entries))
}

fn encode_ledger(ledger: &DependencyLedger) -> (BTreeMap<String, LedgerRecord>, MetaRecord) {
    let mut dependencies = BTreeMap::new();
    let mut meta = MetaRecord::default();
    for (name, entry) in ledger.entries() {
        dependencies.insert(
            name.clone(),
            LedgerRecord {
                versions: entry.versions.clone(),
            },
        );
        if !entry.meta.is_empty() {
            meta.dependencies.insert(name.clone(), entry.meta.clone());
        }
    }
    (dependencies, meta)
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATE: &str = r#"
stages:
- name: first
  revision: 1
- name: second
  revision: 1
revisions:
- id: 1
  versions:
    exampleMaster: v1.0.0
- id: 2
  versions:
    exampleMaster: v1.0.1
dependencies:
  exampleMaster:
    versions:
    - v1.0.0
    - v1.0.1
meta:
  dependencies:
    exampleMaster:
      v1.0.1:
        commit: abc123
"#;

    #[test]
    fn test_parse_state() {
        let state = parse_state(STATE.as_bytes()).unwrap();
        assert_eq!(state.deployment.revisions.len(), 2);
        assert_eq!(state.deployment.stages.states()[1].name, "second");
        let entry = state.dependencies.entry("exampleMaster").unwrap();
        assert_eq!(entry.latest(), Some("v1.0.1"));
        assert_eq!(
            entry.meta["v1.0.1"]["commit"],
            serde_yaml::Value::from("abc123")
        );
    }

    #[test]
    fn test_marshal_layout_is_stable() {
        let state = parse_state(STATE.as_bytes()).unwrap();
        let first = marshal_state(&state).unwrap();
        let second = marshal_state(&parse_state(&first).unwrap()).unwrap();
        assert_eq!(first, second);

        let text = String::from_utf8(first).unwrap();
        assert!(text.starts_with("stages:\n- name: first\n  revision: 1\n"));
        let stages = text.find("stages:").unwrap();
        let revisions = text.find("revisions:").unwrap();
        let dependencies = text.find("\ndependencies:").unwrap();
        let meta = text.find("\nmeta:").unwrap();
        assert!(stages < revisions && revisions < dependencies && dependencies < meta);
    }

    #[test]
    fn test_parse_state_rejects_revision_gap() {
        let state = "revisions:\n- id: 1\n- id: 3\n";
        assert!(matches!(
            parse_state(state.as_bytes()),
            Err(Error::InvalidState(_))
        ));
    }

    #[test]
    fn test_parse_state_rejects_orphan_meta() {
        let state = "meta:\n  dependencies:\n    ghost:\n      v1.0.0: {a: b}\n";
        assert!(matches!(
            parse_state(state.as_bytes()),
            Err(Error::InvalidState(_))
        ));
    }

    #[test]
    fn test_parse_malformed_yaml() {
        let err = parse_state(b"stages: [unterminated").unwrap_err();
        assert!(err.is_parse());
    }

    #[test]
    fn test_multi_state_layout() {
        let text = r#"
state:
  deployments:
    api:
      stages:
      - name: dev
        revision: 1
      revisions:
      - id: 1
        versions:
          app: v1.0.0
  dependencies:
    app:
      versions:
      - v1.0.0
"#;
        let state = parse_multi_state(text.as_bytes()).unwrap();
        assert_eq!(state.deployments["api"].revisions.len(), 1);
        assert!(state.dependencies.entry("app").is_some());

        let encoded = String::from_utf8(marshal_multi_state(&state).unwrap()).unwrap();
        assert!(encoded.starts_with("state:\n  deployments:\n    api:\n"));
        assert_eq!(parse_multi_state(encoded.as_bytes()).unwrap(), state);
    }

    #[test]
    fn test_spec_document_detects_shape() {
        let single = r#"
name: web
stages:
- name: dev
  environments: [dev-eu]
dependencies:
- name: app
  version: ">= 1.0.0"
"#;
        let multi = r#"
deployments:
- name: web
  stages:
  - name: dev
"#;
        match SpecDocument::parse(single.as_bytes()).unwrap() {
            SpecDocument::Single(spec) => {
                assert_eq!(spec.name, "web");
                assert_eq!(spec.stages[0].environments, vec!["dev-eu".to_string()]);
                assert_eq!(spec.dependencies[0].version, ">= 1.0.0");
            }
            other => panic!("Expected single spec, got {other:?}"),
        }
        match SpecDocument::parse(multi.as_bytes()).unwrap() {
            SpecDocument::Multi(spec) => {
                assert_eq!(spec.deployments.len(), 1);
                assert!(spec.deployments[0].dependencies.is_empty());
            }
            other => panic!("Expected multi spec, got {other:?}"),
        }
        assert_eq!(parse_spec(single.as_bytes()).unwrap().name, "web");
        assert_eq!(parse_multi_spec(multi.as_bytes()).unwrap().deployments.len(), 1);
    }
}
