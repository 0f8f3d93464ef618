//! Scenario-based tests for bomba

mod aborts;
mod stage_hooks;
mod step_isolation;
