//! CLI output formatting

use crate::{
    core::{PipelineConfig, RunPhase, RunReport, StageKind, StageOutcome, StepOutcome},
    execution::ExecutionEvent,
};
use console::Emoji;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");

/// Format a step outcome for display
pub fn format_step_outcome(outcome: &StepOutcome) -> String {
    match outcome {
        StepOutcome::Succeeded => style("SUCCEEDED").green().to_string(),
        StepOutcome::Failed { .. } => style("FAILED").red().to_string(),
        StepOutcome::Skipped => style("SKIPPED").dim().to_string(),
    }
}

/// Format an execution event for display
///
/// Phase changes are only interesting in logs, so they render as `None`.
pub fn format_execution_event(event: &ExecutionEvent) -> Option<String> {
    let line = match event {
        ExecutionEvent::RunStarted {
            run_id,
            repository,
            pull_request,
        } => format!(
            "{} Starting run for {} PR #{} ({})",
            ROCKET,
            style(repository).bold(),
            pull_request,
            style(&run_id.to_string()[..8]).dim()
        ),
        ExecutionEvent::PhaseChanged { .. } => return None,
        ExecutionEvent::StageStarted { stage, steps } => format!(
            "{} {} stage ({} steps)",
            INFO,
            style(stage).bold(),
            style(steps).cyan()
        ),
        ExecutionEvent::StepStarted { stage, name } => {
            format!("{} {}", SPINNER, style(stage.context_for(name)).cyan())
        }
        ExecutionEvent::StepCompleted { stage, name } => {
            format!("{} {}", CHECK, style(stage.context_for(name)).green())
        }
        ExecutionEvent::StepFailed { stage, name, error } => format!(
            "{} {}: {}",
            CROSS,
            style(stage.context_for(name)).red(),
            style(error).dim()
        ),
        ExecutionEvent::HookFailed { stage, hook, error } => format!(
            "{} {} {} hook failed: {}",
            WARN,
            style(stage).yellow(),
            hook,
            style(error).dim()
        ),
        ExecutionEvent::StageFinished {
            stage,
            succeeded,
            failed,
        } => format!(
            "{} {} stage finished ({} succeeded, {} failed)",
            INFO,
            style(stage).bold(),
            style(succeeded).green(),
            style(failed).red()
        ),
        ExecutionEvent::RunCompleted { run_id } => format!(
            "{} Run ({}) completed",
            INFO,
            style(&run_id.to_string()[..8]).dim()
        ),
        ExecutionEvent::RunAborted { run_id, reason } => format!(
            "{} Run ({}) aborted: {}",
            CROSS,
            style(&run_id.to_string()[..8]).dim(),
            style(reason).red()
        ),
    };
    Some(line)
}

/// Format one stage's outcome as an indented summary block
pub fn format_stage_summary(stage: &StageOutcome) -> String {
    let mut lines = vec![format!("  {}", style(stage.kind).bold())];
    for (name, outcome) in &stage.steps {
        let icon = match outcome {
            StepOutcome::Succeeded => CHECK,
            StepOutcome::Failed { .. } => CROSS,
            StepOutcome::Skipped => SKIP,
        };
        lines.push(format!(
            "    {}{} {}",
            icon,
            style(name).cyan(),
            format_step_outcome(outcome)
        ));
    }
    lines.join("\n")
}

/// Format the final report of a run
pub fn format_run_report(report: &RunReport) -> String {
    match report.phase {
        RunPhase::Aborted => format!(
            "{} Run {}: {}",
            CROSS,
            style("aborted").red(),
            report.abort_reason.as_deref().unwrap_or("unknown reason")
        ),
        _ => {
            let mut lines = Vec::with_capacity(report.stages.len() + 1);
            if report.is_green() {
                lines.push(format!("{} Run completed {}", CHECK, style("successfully").green()));
            } else {
                lines.push(format!("{} Run completed {}", CROSS, style("with failures").red()));
            }
            lines.extend(report.stages.iter().map(format_stage_summary));
            lines.join("\n")
        }
    }
}

/// Format a valid definition, either as a summary or as JSON alone
pub fn format_definition(config: &PipelineConfig, json: bool) -> serde_json::Result<String> {
    if json {
        return serde_json::to_string_pretty(config);
    }

    let mut lines = vec![format!("{} Pipeline definition is valid!", CHECK)];
    if let Some(env_file) = &config.env_file {
        lines.push(format!("  Env file: {}", style(env_file).cyan()));
    }
    for kind in StageKind::ORDER {
        lines.push(match config.stage(kind) {
            Some(stage) => format!(
                "  {}: {} steps{}{}",
                style(kind).bold(),
                style(stage.steps.len()).cyan(),
                if stage.initialize.is_some() { ", initialize" } else { "" },
                if stage.finalize.is_some() { ", finalize" } else { "" },
            ),
            None => format!("  {}: {}", style(kind).bold(), style("not declared").dim()),
        });
    }
    Ok(lines.join("\n"))
}
