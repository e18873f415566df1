//! Given/when steps for restore scenarios.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use rstest_bdd_macros::{given, when};
use tallydb_setup::api::resolve_backup_path;
use tallydb_setup::config::RestoreConfig;
use tallydb_setup::database::{
    ConnectionParams, QueryResult, RestorePlan, TransientErrorClassifier, restore_database,
};
use tallydb_setup::retry::RetryPolicy;

use super::StepResult;
use super::state::{Check, RestoreResult, RestoreState};
use crate::sql_doubles::{
    MockConnector, MockSession, answer, connected, runtime, scalar, server_error,
};

const DATABASE: &str = "TallyDB";
const MOUNT_TARGET: &str = "/data";

fn push_checks(restore_state: &RestoreState, count: u32, check: &Check) {
    let mut script = restore_state.script.get().unwrap_or_default();
    for _ in 0..count {
        script.push(check.clone());
    }
    restore_state.script.set(script);
}

/// A session that accepts `plan`'s restore statement once and answers the
/// table count queries from `script`, then from `fallback`.
fn scripted_session(
    plan: &RestorePlan,
    script: Vec<Check>,
    fallback: Check,
    checks: Arc<AtomicU32>,
) -> MockSession {
    let mut session = MockSession::new();
    let restore = plan.restore_statement();
    session
        .expect_query()
        .withf(move |sql| sql == restore)
        .times(1)
        .returning(|_| answer(Ok(QueryResult::default())));

    let verification = plan.verification_query();
    let mut pending: VecDeque<Check> = script.into();
    session
        .expect_query()
        .withf(move |sql| sql == verification)
        .returning(move |_| {
            checks.fetch_add(1, Ordering::SeqCst);
            match pending.pop_front().unwrap_or_else(|| fallback.clone()) {
                Check::Error { code, message } => answer(Err(server_error(code, &message))),
                Check::Count(count) => answer(Ok(scalar(count))),
            }
        });
    session
}

fn workdir_path(restore_state: &RestoreState) -> StepResult<Utf8PathBuf> {
    let workdir = restore_state
        .workdir
        .get()
        .ok_or_else(|| String::from("working directory should be created"))?;
    Utf8PathBuf::from_path_buf(workdir.path().to_path_buf())
        .map_err(|path| format!("{} is not valid UTF-8", path.display()))
}

#[given("a backup named {name} in the working directory")]
fn given_backup_in_workdir(restore_state: &RestoreState, name: String) -> StepResult<()> {
    let dir = tempfile::tempdir().map_err(|e| format!("failed to create temp dir: {e}"))?;
    std::fs::write(dir.path().join(&name), b"TAPE")
        .map_err(|e| format!("failed to write backup: {e}"))?;
    restore_state.workdir.set(Arc::new(dir));
    restore_state.backup.set(name);
    Ok(())
}

#[given("the configured backup is {path}")]
fn given_configured_backup(restore_state: &RestoreState, path: String) {
    restore_state.backup.set(path);
}

#[given("the restored database has {tables} tables")]
fn given_restored_tables(restore_state: &RestoreState, tables: i64) {
    restore_state.tables.set(tables);
}

#[given("the restore allows {checks} checks")]
fn given_check_budget(restore_state: &RestoreState, checks: u32) {
    restore_state.checks_allowed.set(checks);
}

#[given("the first {count} checks report error {code} with {message}")]
fn given_first_checks_fail(restore_state: &RestoreState, count: u32, code: u32, message: String) {
    push_checks(restore_state, count, &Check::Error { code, message });
}

#[given("every check reports error {code} with {message}")]
fn given_every_check_fails(restore_state: &RestoreState, code: u32, message: String) {
    restore_state.repeat.set(Check::Error { code, message });
}

#[when("the backup is restored")]
fn when_backup_restored(restore_state: &RestoreState) -> StepResult<()> {
    let workdir = workdir_path(restore_state)?;
    let configured = restore_state
        .backup
        .get()
        .ok_or_else(|| String::from("backup should be configured"))?;
    let backup = resolve_backup_path(&workdir, Utf8Path::new(&configured));
    let checks = Arc::new(AtomicU32::new(0));
    restore_state.checks_made.set(0);

    let plan = match RestorePlan::locate(DATABASE, &backup, &workdir, Utf8Path::new(MOUNT_TARGET))
    {
        Ok(plan) => plan,
        Err(error) => {
            restore_state
                .result
                .set(RestoreResult::Failed(error.to_string()));
            return Ok(());
        }
    };

    let fallback = restore_state
        .repeat
        .get()
        .unwrap_or_else(|| Check::Count(restore_state.tables.get().unwrap_or(1)));
    let session = scripted_session(
        &plan,
        restore_state.script.get().unwrap_or_default(),
        fallback,
        Arc::clone(&checks),
    );
    let mut connector = MockConnector::new();
    connector
        .expect_connect()
        .times(1)
        .return_once(move |_| connected(session));

    let master = ConnectionParams::new("localhost", 1434)
        .with_credentials("sa", "InternPassword123#");
    let classifier = TransientErrorClassifier::from_config(&RestoreConfig::default());
    let attempts = restore_state.checks_allowed.get().unwrap_or(1);
    let policy = RetryPolicy::new(attempts, Duration::ZERO);

    let outcome = runtime()?.block_on(restore_database(
        &connector,
        &master,
        &plan,
        &classifier,
        policy,
    ));

    restore_state.result.set(match outcome {
        Ok(tables) => RestoreResult::Restored(tables),
        Err(error) => RestoreResult::Failed(error.to_string()),
    });
    restore_state.checks_made.set(checks.load(Ordering::SeqCst));
    Ok(())
}
