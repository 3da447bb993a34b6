use stagehand_core::deployment::{CoordinatorConfig, MultiDeployment, SingleDeployment};
use stagehand_core::document::{self, SpecDocument};
use stagehand_core::error::Error;
use stagehand_core::ledger::Candidate;
use stagehand_core::revision::UpdateTarget;
use stagehand_core::stage::StageAdvance;

const SPEC: &str = r#"
name: example
stages:
- name: first
  environments: [dev]
- name: second
  environments: [prod-eu, prod-us]
dependencies:
- name: exampleMaster
  version: ">=1.0.0"
- name: myappLatest
  version: ">=1.0.0"
"#;

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
    myappLatest: v2.0.0
- id: 2
  versions:
    exampleMaster: v1.0.1
    myappLatest: v2.0.0
dependencies:
  example:
    versions:
    - v0.1.0
    - v0.2.0
  exampleMaster:
    versions:
    - v1.0.0
    - v1.0.1
    - v1.1.0
  myappLatest:
    versions:
    - v2.0.0
    - v2.0.1
"#;

fn fixture() -> SingleDeployment {
    let SpecDocument::Single(spec) = SpecDocument::parse(SPEC.as_bytes()).unwrap() else {
        panic!("Expected single spec");
    };
    let state = document::parse_state(STATE.as_bytes()).unwrap();
    SingleDeployment::new(spec, state, CoordinatorConfig::default()).unwrap()
}

#[test]
fn recompute_selects_newest_satisfying_versions() {
    let mut deployment = fixture();

    let revision = deployment.recompute(&UpdateTarget::All).unwrap().unwrap();

    assert_eq!(revision.id, 3);
    assert_eq!(revision.version_of("exampleMaster"), Some("v1.1.0"));
    assert_eq!(revision.version_of("myappLatest"), Some("v2.0.1"));
    // Tracked in the ledger but not yet in any revision
    assert_eq!(revision.version_of("example"), Some("v0.2.0"));
}

#[test]
fn recompute_is_idempotent() {
    let mut deployment = fixture();
    deployment.recompute(&UpdateTarget::All).unwrap().unwrap();

    assert!(deployment.recompute(&UpdateTarget::All).unwrap().is_none());
    assert_eq!(deployment.state().deployment.revisions.len(), 3);
}

#[test]
fn selective_recompute_moves_only_target() {
    let mut deployment = fixture();

    let revision = deployment
        .recompute(&UpdateTarget::parse("myappLatest"))
        .unwrap()
        .unwrap();

    assert_eq!(revision.version_of("exampleMaster"), Some("v1.0.1"));
    assert_eq!(revision.version_of("myappLatest"), Some("v2.0.1"));
    assert_eq!(revision.version_of("example"), Some("v0.2.0"));
}

#[test]
fn stages_promote_one_hop_per_call() {
    let mut deployment = fixture();

    let first = deployment.advance_stage("first").unwrap();
    assert_eq!(first, StageAdvance::Advanced { from: 1, to: 2 });

    let second = deployment.advance_stage("second").unwrap();
    assert_eq!(second, StageAdvance::Advanced { from: 1, to: 2 });

    // A new revision reaches `second` only after `first` accepts it
    deployment.recompute(&UpdateTarget::All).unwrap();
    assert_eq!(
        deployment.advance_stage("second").unwrap(),
        StageAdvance::Unchanged { revision: 2 }
    );
    deployment.advance_stage("first").unwrap();
    assert_eq!(deployment.advance_stage("second").unwrap().revision(), 3);

    let summary = deployment.stage_summary("second").unwrap();
    assert_eq!(summary.environments, vec!["prod-eu", "prod-us"]);
    assert_eq!(summary.versions["myappLatest"], "v2.0.1");
}

#[test]
fn fresh_pipeline_rejects_out_of_order_advance() {
    let mut state = document::parse_state(STATE.as_bytes()).unwrap();
    state.deployment.stages = Default::default();
    let SpecDocument::Single(spec) = SpecDocument::parse(SPEC.as_bytes()).unwrap() else {
        panic!("Expected single spec");
    };
    let mut deployment = SingleDeployment::new(spec, state, CoordinatorConfig::default()).unwrap();

    let err = deployment.advance_stage("second").unwrap_err();
    assert!(matches!(
        err,
        Error::OutOfOrderInitialization { stage, requires } if stage == "second" && requires == "first"
    ));

    // Uninitialized stages have nothing to summarize
    assert!(matches!(
        deployment.stage_summary("first"),
        Err(Error::RevisionNotFound { id: -1, .. })
    ));
}

#[test]
fn ingestion_appends_only_newer_candidates() {
    let mut deployment = fixture();
    let mut source = |name: &str| -> anyhow::Result<Vec<Candidate>> {
        Ok(match name {
            "exampleMaster" => vec![Candidate::new("v1.2.0"), Candidate::new("v1.0.5")],
            _ => Vec::new(),
        })
    };

    let report = deployment.ingest(&mut source);

    assert!(report.is_clean());
    assert_eq!(
        deployment.ledger().entry("exampleMaster").unwrap().versions,
        vec!["v1.0.0", "v1.0.1", "v1.1.0", "v1.2.0"]
    );
}

#[test]
fn state_roundtrips_after_operations() {
    let mut deployment = fixture();
    deployment.recompute(&UpdateTarget::All).unwrap();
    deployment.advance_stage("first").unwrap();

    let state = deployment.into_state();
    let bytes = document::marshal_state(&state).unwrap();
    assert_eq!(document::parse_state(&bytes).unwrap(), state);
}

#[test]
fn multi_deployments_diverge_on_shared_ledger() {
    let spec = r#"
deployments:
- name: canary
  stages:
  - name: dev
  dependencies:
  - name: app
    version: ""
- name: stable
  stages:
  - name: dev
  - name: prod
  dependencies:
  - name: app
    version: "~1.0"
"#;
    let state = r#"
state:
  deployments:
    canary:
      revisions:
      - id: 1
        versions:
          app: v1.0.0
    stable:
      revisions:
      - id: 1
        versions:
          app: v1.0.0
  dependencies:
    app:
      versions:
      - v1.0.0
"#;
    let SpecDocument::Multi(spec) = SpecDocument::parse(spec.as_bytes()).unwrap() else {
        panic!("Expected multi spec");
    };
    let state = document::parse_multi_state(state.as_bytes()).unwrap();
    let mut multi = MultiDeployment::new(spec, state, CoordinatorConfig::default()).unwrap();

    let mut source = |_: &str| -> anyhow::Result<Vec<Candidate>> {
        Ok(vec![Candidate::new("v1.0.4"), Candidate::new("v1.3.0")])
    };
    let report = multi.ingest(&mut source);
    assert_eq!(report.appended_count(), 2);

    let canary = multi.recompute("canary", &UpdateTarget::All).unwrap().unwrap();
    let stable = multi.recompute("stable", &UpdateTarget::All).unwrap().unwrap();
    assert_eq!(canary.version_of("app"), Some("v1.3.0"));
    assert_eq!(stable.version_of("app"), Some("v1.0.4"));

    multi.advance_stage("stable", "dev").unwrap();
    let summary = multi.stage_summary("stable", "dev").unwrap();
    assert_eq!(summary.versions["app"], "v1.0.4");
    assert!(multi.stage_summary("canary", "dev").is_err());

    let bytes = document::marshal_multi_state(multi.state()).unwrap();
    assert_eq!(&document::parse_multi_state(&bytes).unwrap(), multi.state());
}
