//! Given/when steps for server provisioning scenarios.

use std::sync::Arc;

use camino::Utf8PathBuf;
use rstest_bdd_macros::{given, when};
use tallydb_setup::database::{DriverCatalog, OdbcInstCatalog};
use tallydb_setup::engine::{PortProbe, select_port};

use super::StepResult;
use super::state::ProvisioningState;

/// Filter applied by the default configuration.
const DRIVER_FILTER: &str = "SQL Server";

/// Ports reported busy by the scenario.
struct OccupiedPorts(Vec<u16>);

impl PortProbe for OccupiedPorts {
    fn in_use(&self, port: u16) -> bool {
        self.0.contains(&port)
    }
}

fn registry_contents(drivers: &[&str]) -> String {
    let mut contents = String::from("[ODBC Drivers]\n");
    for driver in drivers {
        contents.push_str(&format!("{driver}=Installed\n"));
    }
    for driver in drivers {
        contents.push_str(&format!(
            "\n[{driver}]\nDescription={driver}\nDriver=/opt/drivers/lib.so\nUsageCount=1\n"
        ));
    }
    contents
}

#[given("a driver registry listing {drivers}")]
fn given_registry(provisioning_state: &ProvisioningState, drivers: String) -> StepResult<()> {
    let names: Vec<&str> = drivers.split(", ").collect();
    let dir = tempfile::tempdir().map_err(|e| format!("failed to create temp dir: {e}"))?;
    let path = Utf8PathBuf::from_path_buf(dir.path().join("odbcinst.ini"))
        .map_err(|path| format!("{} is not valid UTF-8", path.display()))?;
    std::fs::write(&path, registry_contents(&names))
        .map_err(|e| format!("failed to write registry: {e}"))?;
    provisioning_state.registry_dir.set(Arc::new(dir));
    provisioning_state.registry_path.set(path);
    Ok(())
}

#[given("no driver registry exists")]
fn given_no_registry(provisioning_state: &ProvisioningState) -> StepResult<()> {
    let dir = tempfile::tempdir().map_err(|e| format!("failed to create temp dir: {e}"))?;
    let path = Utf8PathBuf::from_path_buf(dir.path().join("odbcinst.ini"))
        .map_err(|path| format!("{} is not valid UTF-8", path.display()))?;
    provisioning_state.registry_dir.set(Arc::new(dir));
    provisioning_state.registry_path.set(path);
    Ok(())
}

#[when("the installed drivers are discovered")]
fn when_drivers_discovered(provisioning_state: &ProvisioningState) -> StepResult<()> {
    let path = provisioning_state
        .registry_path
        .get()
        .ok_or_else(|| String::from("registry path should be configured"))?;
    let catalog = OdbcInstCatalog::new(path, DRIVER_FILTER);
    provisioning_state.installed.set(catalog.installed_drivers());
    Ok(())
}

#[given("host ports {ports} are in use")]
fn given_ports_in_use(provisioning_state: &ProvisioningState, ports: String) -> StepResult<()> {
    let parsed = ports
        .split(", ")
        .map(|port| {
            port.parse::<u16>()
                .map_err(|e| format!("invalid port '{port}': {e}"))
        })
        .collect::<Result<Vec<u16>, String>>()?;
    provisioning_state.ports_in_use.set(parsed);
    Ok(())
}

#[given("no host ports are in use")]
fn given_no_ports_in_use(provisioning_state: &ProvisioningState) {
    provisioning_state.ports_in_use.set(Vec::new());
}

#[when("a host port is chosen between {base} and {ceiling}")]
fn when_port_chosen(provisioning_state: &ProvisioningState, base: u16, ceiling: u16) {
    let probe = OccupiedPorts(provisioning_state.ports_in_use.get().unwrap_or_default());
    let chosen = select_port(&probe, base, ceiling).map_err(|e| e.to_string());
    provisioning_state.port.set(chosen);
}
