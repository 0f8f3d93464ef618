//! Test: Aborts - checkout and definition failures end the run early

use crate::helpers::*;
use bomba::core::{RunPhase, StatusState};
use bomba::execution::ExecutionEvent;

/// No definition file: nothing pending, nothing run
#[tokio::test]
async fn test_missing_definition() {
    let result = Harness::new(ScriptedRunner::without_definition()).run().await;

    assert_eq!(result.report.phase, RunPhase::Aborted);
    assert!(result.updates.is_empty());
    assert!(result.commands().is_empty());
    assert!(result
        .report
        .abort_reason
        .as_deref()
        .unwrap()
        .contains("not found"));
}

/// A definition that fails validation reports `error` for every declared step
#[tokio::test]
async fn test_invalid_definition_reports_errors() {
    let yaml = r#"
build:
  - name: compile
    command: make
  - name: compile
    command: make again
test:
  - name: unit
    command: make test
"#;

    let result = run_definition(yaml).await;

    assert_eq!(result.report.phase, RunPhase::Aborted);
    assert_eq!(
        result.calls(),
        vec![error("build-compile"), error("test-unit")]
    );
    assert!(result.commands().is_empty());
}

/// A structurally broken definition still salvages its step names
#[tokio::test]
async fn test_malformed_definition_salvages_steps() {
    let yaml = r#"
build:
  - name: compile
  - name: lint
    command: [not, a, string]
"#;

    let result = run_definition(yaml).await;

    assert_eq!(result.report.phase, RunPhase::Aborted);
    assert_eq!(
        result.calls(),
        vec![error("build-compile"), error("build-lint")]
    );
    assert!(result.commands().is_empty());
}

/// Unparseable YAML gives nothing to salvage
#[tokio::test]
async fn test_unparseable_definition_reports_nothing() {
    let result = run_definition("build: [name: compile\n  command: {").await;

    assert_eq!(result.report.phase, RunPhase::Aborted);
    assert!(result.updates.is_empty());
    assert!(result.commands().is_empty());
}

/// A failed clone surfaces as one `error` on the `build` check
#[tokio::test]
async fn test_workspace_failure() {
    let runner = ScriptedRunner::with_definition("build: []").failing_clone();

    let result = Harness::new(runner).run().await;

    assert_eq!(result.report.phase, RunPhase::Aborted);
    assert_eq!(result.calls(), vec![error("build")]);
    assert!(result.commands().is_empty());
    assert!(result.log_contents().contains("Run aborted"));
    assert!(matches!(
        result.events.last(),
        Some(ExecutionEvent::RunAborted { .. })
    ));
}

/// The pre-positioned env file lands at the declared path
#[tokio::test]
async fn test_env_file_is_copied() {
    let yaml = r#"
env: config/.env
build:
  - name: compile
    command: make
"#;

    let result = Harness::new(ScriptedRunner::with_definition(yaml))
        .with_env_source("API_KEY=secret\n")
        .run()
        .await;

    assert!(result.report.is_completed());
    let copied = std::fs::read_to_string(result.checkout().join("config/.env")).unwrap();
    assert_eq!(copied, "API_KEY=secret\n");
    assert_eq!(result.states_for("build-compile"), vec![StatusState::Pending, StatusState::Success]);
}

/// A missing env source is fatal and errors every declared step
#[tokio::test]
async fn test_missing_env_source_aborts() {
    let yaml = r#"
env: .env
build:
  - name: compile
    command: make
test:
  - name: unit
    command: make test
"#;

    let result = run_definition(yaml).await;

    assert_eq!(result.report.phase, RunPhase::Aborted);
    assert_eq!(
        result.calls(),
        vec![error("build-compile"), error("test-unit")]
    );
    assert!(result.commands().is_empty());
}

/// Every run clones a fresh checkout
#[tokio::test]
async fn test_previous_checkout_is_removed() {
    let harness = Harness::new(ScriptedRunner::with_definition("build: []"));
    let stale = harness.work_dir().join(REPOSITORY).join("stale.txt");
    std::fs::create_dir_all(stale.parent().unwrap()).unwrap();
    std::fs::write(&stale, "left over").unwrap();

    let result = harness.run().await;

    assert!(result.report.is_completed());
    assert!(!stale.exists());
    assert!(result.checkout().join("bomba.yml").exists());
}
