//! Scenario state for restore behavioural tests.

use std::sync::Arc;

use rstest::fixture;
use rstest_bdd::Slot;
use rstest_bdd_macros::ScenarioState;
use tempfile::TempDir;

/// One scripted answer to the table count query.
#[derive(Debug, Clone)]
pub(crate) enum Check {
    /// The server rejects the query.
    Error { code: u32, message: String },
    /// The query returns this count.
    Count(i64),
}

/// Outcome of a restore.
#[derive(Debug, Clone)]
pub(crate) enum RestoreResult {
    /// The restore finished with this many base tables.
    Restored(u64),
    /// The restore failed with this message.
    Failed(String),
}

#[derive(Default, ScenarioState)]
pub(crate) struct RestoreState {
    /// Working directory mounted into the container.
    pub(crate) workdir: Slot<Arc<TempDir>>,
    /// Configured backup path, relative to the working directory or absolute.
    pub(crate) backup: Slot<String>,
    pub(crate) checks_allowed: Slot<u32>,
    /// Answers to the first table count queries, in order.
    pub(crate) script: Slot<Vec<Check>>,
    /// Answer repeated once the script is used up. Defaults to the table count.
    pub(crate) repeat: Slot<Check>,
    pub(crate) tables: Slot<i64>,
    pub(crate) checks_made: Slot<u32>,
    pub(crate) result: Slot<RestoreResult>,
}

#[fixture]
pub(crate) fn restore_state() -> RestoreState {
    let state = RestoreState::default();
    state.checks_allowed.set(5);
    state.script.set(Vec::new());
    state.tables.set(42);
    state
}
