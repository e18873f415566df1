//! Assertion helpers for server provisioning behavioural tests.

use rstest_bdd_macros::then;
use tallydb_setup::database::{rank_drivers, select_driver};

use super::StepResult;
use super::state::ProvisioningState;

fn installed(provisioning_state: &ProvisioningState) -> StepResult<Vec<String>> {
    provisioning_state
        .installed
        .get()
        .ok_or_else(|| String::from("drivers should have been discovered"))
}

fn chosen_port(provisioning_state: &ProvisioningState) -> StepResult<Result<u16, String>> {
    provisioning_state
        .port
        .get()
        .ok_or_else(|| String::from("a port should have been chosen"))
}

#[then("the selected driver is {expected}")]
fn selected_driver_is(provisioning_state: &ProvisioningState, expected: String) -> StepResult<()> {
    let drivers = installed(provisioning_state)?;
    match select_driver(&drivers) {
        Some(driver) if driver == expected => Ok(()),
        Some(driver) => Err(format!("expected {expected}, selected {driver}")),
        None => Err(format!("expected {expected}, no driver selected")),
    }
}

#[then("the probe order is {expected}")]
fn probe_order_is(provisioning_state: &ProvisioningState, expected: String) -> StepResult<()> {
    let drivers = installed(provisioning_state)?;
    let ranked = rank_drivers(&drivers).join(", ");
    if ranked == expected {
        Ok(())
    } else {
        Err(format!("expected order '{expected}', got '{ranked}'"))
    }
}

#[then("no driver is selected")]
fn no_driver_selected(provisioning_state: &ProvisioningState) -> StepResult<()> {
    let drivers = installed(provisioning_state)?;
    select_driver(&drivers).map_or(Ok(()), |driver| {
        Err(format!("expected no driver, selected {driver}"))
    })
}

#[then("port {expected} is chosen")]
fn port_is_chosen(provisioning_state: &ProvisioningState, expected: u16) -> StepResult<()> {
    match chosen_port(provisioning_state)? {
        Ok(port) if port == expected => Ok(()),
        Ok(port) => Err(format!("expected port {expected}, chose {port}")),
        Err(message) => Err(format!("expected port {expected}, got error: {message}")),
    }
}

#[then("no port is available")]
fn no_port_available(provisioning_state: &ProvisioningState) -> StepResult<()> {
    match chosen_port(provisioning_state)? {
        Err(message) if message.starts_with("no free port available") => Ok(()),
        Err(message) => Err(format!("unexpected error: {message}")),
        Ok(port) => Err(format!("expected no port, chose {port}")),
    }
}
