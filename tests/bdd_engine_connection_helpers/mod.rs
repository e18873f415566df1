//! Behavioural test helpers for container engine connection.
//!
//! Steps record engine environment variables in scenario state; the "when"
//! step replays them through a `MockEnv` so no real variables are touched.

use mockable::MockEnv;
use rstest::fixture;
use rstest_bdd::Slot;
use rstest_bdd_macros::{ScenarioState, given, then, when};
use tallydb_setup::engine::{EngineConnector, SocketResolver};

/// Step result type for BDD tests, using a static string for errors.
pub type StepResult<T> = Result<T, &'static str>;

/// Variables the resolver consults, highest priority first.
const ENGINE_VARIABLES: [&str; 3] = ["DOCKER_HOST", "CONTAINER_HOST", "PODMAN_HOST"];

/// State shared across engine connection test scenarios.
#[derive(Default, ScenarioState)]
pub struct EngineConnectionState {
    /// Environment variables visible to the resolver.
    env_vars: Slot<Vec<(String, String)>>,
    /// The configured socket (CLI, config file, `TALLYDB_ENGINE_SOCKET`).
    config_socket: Slot<Option<String>>,
    /// The resolved socket endpoint.
    resolved_socket: Slot<String>,
}

/// Fixture providing a fresh engine connection state.
#[fixture]
pub fn engine_connection_state() -> EngineConnectionState {
    let state = EngineConnectionState::default();
    state.env_vars.set(Vec::new());
    state.config_socket.set(None);
    state
}

fn known_variable(name: &str) -> StepResult<()> {
    if ENGINE_VARIABLES.contains(&name) {
        Ok(())
    } else {
        Err("unknown engine environment variable")
    }
}

fn set_env_var(state: &EngineConnectionState, key: &str, value: &str) -> StepResult<()> {
    known_variable(key)?;
    let mut vars = state.env_vars.get().unwrap_or_default();
    vars.retain(|(name, _)| name != key);
    vars.push((String::from(key), String::from(value)));
    state.env_vars.set(vars);
    Ok(())
}

/// A `MockEnv` answering from the variables recorded so far.
///
/// "Given" steps all run before the "when" step, so the snapshot is complete.
fn create_mock_env(state: &EngineConnectionState) -> MockEnv {
    let vars = state.env_vars.get().unwrap_or_default();
    let mut mock = MockEnv::new();
    mock.expect_string().returning(move |key| {
        vars.iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.clone())
    });
    mock
}

#[given("no engine socket is configured")]
fn no_engine_socket_configured(engine_connection_state: &EngineConnectionState) {
    engine_connection_state.config_socket.set(None);
}

#[given("engine socket is configured as {socket}")]
fn engine_socket_configured_as(engine_connection_state: &EngineConnectionState, socket: String) {
    engine_connection_state.config_socket.set(Some(socket));
}

#[given("{variable} is set to {value}")]
fn variable_is_set_to(
    engine_connection_state: &EngineConnectionState,
    variable: String,
    value: String,
) -> StepResult<()> {
    set_env_var(engine_connection_state, &variable, &value)
}

#[given("{variable} is empty")]
fn variable_is_empty(
    engine_connection_state: &EngineConnectionState,
    variable: String,
) -> StepResult<()> {
    set_env_var(engine_connection_state, &variable, "")
}

#[given("{variable} is not set")]
fn variable_is_not_set(
    engine_connection_state: &EngineConnectionState,
    variable: String,
) -> StepResult<()> {
    known_variable(&variable)?;
    let mut vars = engine_connection_state.env_vars.get().unwrap_or_default();
    vars.retain(|(name, _)| *name != variable);
    engine_connection_state.env_vars.set(vars);
    Ok(())
}

#[when("the socket is resolved")]
fn the_socket_is_resolved(engine_connection_state: &EngineConnectionState) {
    let env = create_mock_env(engine_connection_state);
    let resolver = SocketResolver::new(&env);
    let config_socket = engine_connection_state.config_socket.get().flatten();
    let socket = EngineConnector::resolve_socket(config_socket.as_deref(), &resolver);
    engine_connection_state.resolved_socket.set(socket);
}

#[then("the resolved socket is {expected}")]
fn the_resolved_socket_is(
    engine_connection_state: &EngineConnectionState,
    expected: String,
) -> StepResult<()> {
    let resolved = engine_connection_state
        .resolved_socket
        .get()
        .ok_or("resolved socket should be set")?;
    assert_eq!(
        resolved, expected,
        "Expected resolved socket to be '{expected}', but got '{resolved}'"
    );
    Ok(())
}

#[then("the socket resolves to the platform default")]
fn the_socket_resolves_to_platform_default(
    engine_connection_state: &EngineConnectionState,
) -> StepResult<()> {
    let resolved = engine_connection_state
        .resolved_socket
        .get()
        .ok_or("resolved socket should be set")?;
    let default = SocketResolver::<MockEnv>::default_socket();
    assert_eq!(
        resolved, default,
        "Expected the platform default '{default}', but got '{resolved}'"
    );
    Ok(())
}
