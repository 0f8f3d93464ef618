//! Test: Step Isolation - a failing step never stops its stage

use crate::helpers::*;
use bomba::core::{HookOutcome, StageKind, StatusState, StepOutcome};

const FOUR_STEPS: &str = r#"
build:
  finalize: make clean
  steps:
    - name: one
      command: step 1
    - name: two
      command: step 2
    - name: three
      command: step 3
    - name: four
      command: step 4
"#;

/// Whichever step fails, exactly that one is `failure` and the rest `success`
#[tokio::test]
async fn test_single_failure_is_isolated() {
    let names = ["one", "two", "three", "four"];

    for (k, failing_name) in names.iter().enumerate() {
        let failing_command = format!("step {}", k + 1);
        let result = run_definition_failing(FOUR_STEPS, &[failing_command.as_str()]).await;

        let results: Vec<_> = result
            .updates
            .iter()
            .filter(|u| u.state != StatusState::Pending)
            .map(|u| (u.context.clone(), u.state))
            .collect();
        assert_eq!(results.len(), names.len());

        for (name, (context, state)) in names.iter().zip(&results) {
            assert_eq!(context, &format!("build-{}", name));
            let expected = if name == failing_name {
                StatusState::Failure
            } else {
                StatusState::Success
            };
            assert_eq!(*state, expected, "step {} with step {} failing", name, failing_name);
        }

        assert_eq!(
            result.commands(),
            vec!["step 1", "step 2", "step 3", "step 4", "make clean"]
        );
        let stage = result.report.stage(StageKind::Build).unwrap();
        assert_eq!(stage.failed_steps(), 1);
        assert_eq!(stage.succeeded_steps(), 3);
        assert_eq!(stage.finalize, HookOutcome::Succeeded);
    }
}

/// Every step failing still runs every step and the finalize hook
#[tokio::test]
async fn test_all_steps_fail() {
    let result =
        run_definition_failing(FOUR_STEPS, &["step 1", "step 2", "step 3", "step 4"]).await;

    assert!(result.report.is_completed());
    assert!(!result.report.is_green());
    assert_eq!(
        result.commands(),
        vec!["step 1", "step 2", "step 3", "step 4", "make clean"]
    );
    assert_eq!(
        result.calls()[4..],
        [
            failure("build-one"),
            failure("build-two"),
            failure("build-three"),
            failure("build-four"),
        ]
    );
}

/// A failing build step does not keep the test stage from running
#[tokio::test]
async fn test_build_failure_does_not_block_test_stage() {
    let yaml = r#"
build:
  - name: compile
    command: make
test:
  - name: unit
    command: make test
"#;

    let result = run_definition_failing(yaml, &["make"]).await;

    assert_eq!(result.commands(), vec!["make", "make test"]);
    assert_eq!(result.states_for("build-compile"), vec![StatusState::Pending, StatusState::Failure]);
    assert_eq!(result.states_for("test-unit"), vec![StatusState::Pending, StatusState::Success]);
}

/// A failing finalize hook changes no step status
#[tokio::test]
async fn test_finalize_failure_is_only_logged() {
    let yaml = r#"
build:
  finalize: make clean
  steps:
    - name: compile
      command: make
test:
  - name: unit
    command: make test
"#;

    let result = run_definition_failing(yaml, &["make clean"]).await;

    assert_eq!(
        result.calls(),
        vec![
            pending("build-compile"),
            pending("test-unit"),
            success("build-compile"),
            success("test-unit"),
        ]
    );
    let build = result.report.stage(StageKind::Build).unwrap();
    assert!(build.finalize.is_failed());
    assert_eq!(build.step("compile"), Some(&StepOutcome::Succeeded));
    assert!(result.log_contents().contains("build finalize hook failed"));
}

/// Every command runs from the checkout root
#[tokio::test]
async fn test_commands_run_in_checkout() {
    let yaml = r#"
build:
  initialize: npm ci
  steps:
    - name: compile
      command: npm run build
  finalize: npm prune
"#;

    let result = run_definition(yaml).await;

    assert_eq!(result.executed.len(), 3);
    for (command, cwd) in &result.executed {
        assert_eq!(cwd, &result.checkout(), "{} ran elsewhere", command);
    }
}
