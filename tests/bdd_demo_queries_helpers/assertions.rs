//! Assertion helpers for demonstration query behavioural tests.

use rstest_bdd_macros::then;
use tallydb_setup::api::DemoReport;

use super::StepResult;
use super::state::DemoState;

fn report(demo_state: &DemoState) -> StepResult<DemoReport> {
    demo_state
        .report
        .get()
        .ok_or_else(|| String::from("the battery should have run"))
}

#[then("{expected} queries succeed")]
fn queries_succeed(demo_state: &DemoState, expected: usize) -> StepResult<()> {
    let succeeded = report(demo_state)?.successes.len();
    if succeeded == expected {
        Ok(())
    } else {
        Err(format!("expected {expected} successful queries, got {succeeded}"))
    }
}

#[then("the query labelled {label} is reported as failed")]
fn query_reported_failed(demo_state: &DemoState, label: String) -> StepResult<()> {
    let failures = report(demo_state)?.failures;
    if failures.iter().any(|failure| failure.label == label) {
        Ok(())
    } else {
        Err(format!("expected {label} among failures {failures:?}"))
    }
}

#[then("the output includes {text}")]
fn output_includes(demo_state: &DemoState, text: String) -> StepResult<()> {
    let output = demo_state
        .output
        .get()
        .ok_or_else(|| String::from("output should be captured"))?;
    if output.contains(&text) {
        Ok(())
    } else {
        Err(format!("expected output to include '{text}', got:\n{output}"))
    }
}
