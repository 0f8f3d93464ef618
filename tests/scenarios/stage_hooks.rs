//! Test: Stage Hooks - initialize guards its stage, finalize always follows

use crate::helpers::*;
use bomba::core::{HookOutcome, RunPhase, StageKind, StatusState, StepOutcome};
use bomba::execution::{ExecutionEvent, Hook};

const TWO_STAGES: &str = r#"
build:
  initialize: npm ci
  steps:
    - name: compile
      command: npm run build
    - name: bundle
      command: npm run bundle
  finalize: npm prune
test:
  initialize: docker compose up -d
  steps:
    - name: unit
      command: npm test
  finalize: docker compose down
"#;

/// Hooks wrap the steps of their own stage
#[tokio::test]
async fn test_hook_order() {
    let result = run_definition(TWO_STAGES).await;

    assert_eq!(
        result.commands(),
        vec![
            "npm ci",
            "npm run build",
            "npm run bundle",
            "npm prune",
            "docker compose up -d",
            "npm test",
            "docker compose down",
        ]
    );
    let build = result.report.stage(StageKind::Build).unwrap();
    assert_eq!(build.initialize, HookOutcome::Succeeded);
    assert_eq!(build.finalize, HookOutcome::Succeeded);
}

/// A failing initialize skips its stage's steps and finalize but not the next stage
#[tokio::test]
async fn test_initialize_failure_skips_stage() {
    let result = run_definition_failing(TWO_STAGES, &["npm ci"]).await;

    assert_eq!(result.report.phase, RunPhase::Completed);
    assert_eq!(
        result.commands(),
        vec!["npm ci", "docker compose up -d", "npm test", "docker compose down"]
    );

    let build = result.report.stage(StageKind::Build).unwrap();
    assert!(build.initialize.is_failed());
    assert_eq!(build.finalize, HookOutcome::Skipped);
    assert_eq!(build.step("compile"), Some(&StepOutcome::Skipped));
    assert_eq!(build.step("bundle"), Some(&StepOutcome::Skipped));

    let test = result.report.stage(StageKind::Test).unwrap();
    assert_eq!(test.step("unit"), Some(&StepOutcome::Succeeded));
}

/// The abandoned stage's checks end as `error` instead of staying pending
#[tokio::test]
async fn test_initialize_failure_marks_checks_as_error() {
    let result = run_definition_failing(TWO_STAGES, &["npm ci"]).await;

    assert_eq!(
        result.calls(),
        vec![
            pending("build-compile"),
            pending("build-bundle"),
            pending("test-unit"),
            error("build-compile"),
            error("build-bundle"),
            success("test-unit"),
        ]
    );
    for context in ["build-compile", "build-bundle"] {
        let states = result.states_for(context);
        assert!(!states.contains(&StatusState::Success));
        assert!(!states.contains(&StatusState::Failure));
    }
}

/// A failing test initialize leaves the already reported build results alone
#[tokio::test]
async fn test_test_initialize_failure() {
    let result = run_definition_failing(TWO_STAGES, &["docker compose up -d"]).await;

    assert_eq!(
        result.commands(),
        vec![
            "npm ci",
            "npm run build",
            "npm run bundle",
            "npm prune",
            "docker compose up -d",
        ]
    );
    assert_eq!(result.states_for("build-compile").last(), Some(&StatusState::Success));
    assert_eq!(result.states_for("test-unit"), vec![StatusState::Pending, StatusState::Error]);
}

/// The failed hook is announced to event handlers
#[tokio::test]
async fn test_initialize_failure_event() {
    let result = run_definition_failing(TWO_STAGES, &["npm ci"]).await;

    let hook_failures: Vec<_> = result
        .events
        .iter()
        .filter_map(|e| match e {
            ExecutionEvent::HookFailed { stage, hook, .. } => Some((*stage, *hook)),
            _ => None,
        })
        .collect();
    assert_eq!(hook_failures, vec![(StageKind::Build, Hook::Initialize)]);
    assert!(!result
        .events
        .iter()
        .any(|e| matches!(e, ExecutionEvent::StepStarted { stage: StageKind::Build, .. })));
}
