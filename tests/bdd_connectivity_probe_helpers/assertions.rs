//! Assertion helpers for connectivity probe behavioural tests.

use rstest_bdd_macros::then;

use super::StepResult;
use super::state::{ProbeResult, ProbeState};

fn probe_result(probe_state: &ProbeState) -> StepResult<ProbeResult> {
    probe_state
        .result
        .get()
        .ok_or_else(|| String::from("probe result should be set"))
}

#[then("the probe selects {expected}")]
fn probe_selects(probe_state: &ProbeState, expected: String) -> StepResult<()> {
    match probe_result(probe_state)? {
        ProbeResult::Selected(driver) if driver == expected => Ok(()),
        ProbeResult::Selected(driver) => Err(format!("expected {expected}, selected {driver}")),
        ProbeResult::Failed(message) => Err(format!("expected {expected}, probe failed: {message}")),
    }
}

#[then("the probe fails with {expected}")]
fn probe_fails_with(probe_state: &ProbeState, expected: String) -> StepResult<()> {
    match probe_result(probe_state)? {
        ProbeResult::Failed(message) if message == expected => Ok(()),
        ProbeResult::Failed(message) => Err(format!("expected '{expected}', got '{message}'")),
        ProbeResult::Selected(driver) => Err(format!("expected a failure, selected {driver}")),
    }
}

#[then("{expected} connections were attempted")]
fn connections_attempted(probe_state: &ProbeState, expected: u32) -> StepResult<()> {
    let actual = probe_state
        .connections
        .get()
        .ok_or_else(|| String::from("connection count should be recorded"))?;
    if actual == expected {
        Ok(())
    } else {
        Err(format!("expected {expected} connection attempts, saw {actual}"))
    }
}
