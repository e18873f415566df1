//! Client driver discovery and ranking.
//!
//! Installed drivers are read from the unixODBC registry. A missing or
//! unreadable registry is treated as "nothing installed" rather than an
//! error; the workflow decides what an empty list means.

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use tracing::{debug, warn};

/// Drivers in order of preference.
pub const DRIVER_PREFERENCE: [&str; 4] = [
    "ODBC Driver 18 for SQL Server",
    "ODBC Driver 17 for SQL Server",
    "ODBC Driver 13 for SQL Server",
    "SQL Server",
];

/// Registry sections that describe the driver manager rather than a driver.
const META_SECTIONS: [&str; 2] = ["ODBC", "ODBC Drivers"];

/// Source of installed driver names.
#[cfg_attr(test, mockall::automock)]
pub trait DriverCatalog {
    /// Driver names in discovery order. Empty when none are installed.
    fn installed_drivers(&self) -> Vec<String>;
}

/// Reads driver sections from an `odbcinst.ini` file.
#[derive(Debug, Clone)]
pub struct OdbcInstCatalog {
    path: Utf8PathBuf,
    filter: String,
}

impl OdbcInstCatalog {
    /// Catalog over the registry at `path`, keeping names containing `filter`.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>, filter: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            filter: filter.into(),
        }
    }

    fn read_registry(&self) -> std::io::Result<String> {
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_str().is_empty())
            .unwrap_or_else(|| Utf8Path::new("."));
        let file_name = self.path.file_name().unwrap_or(self.path.as_str());
        let dir = Dir::open_ambient_dir(parent, ambient_authority())?;
        dir.read_to_string(file_name)
    }
}

impl DriverCatalog for OdbcInstCatalog {
    fn installed_drivers(&self) -> Vec<String> {
        match self.read_registry() {
            Ok(contents) => parse_odbcinst(&contents)
                .into_iter()
                .filter(|name| name.contains(&self.filter))
                .collect(),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path, "driver registry not present");
                Vec::new()
            }
            Err(error) => {
                warn!(path = %self.path, %error, "driver registry unreadable");
                Vec::new()
            }
        }
    }
}

/// Extract driver section names from `odbcinst.ini` contents.
#[must_use]
pub fn parse_odbcinst(contents: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for line in contents.lines().map(str::trim) {
        let Some(name) = line
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .map(str::trim)
        else {
            continue;
        };
        let is_meta = META_SECTIONS
            .iter()
            .any(|meta| meta.eq_ignore_ascii_case(name));
        if name.is_empty() || is_meta || names.iter().any(|known| known == name) {
            continue;
        }
        names.push(String::from(name));
    }
    names
}

/// The driver to use: the first preferred driver that is installed, else the
/// first installed driver, else none.
#[must_use]
pub fn select_driver(installed: &[String]) -> Option<&str> {
    DRIVER_PREFERENCE
        .iter()
        .find_map(|preferred| installed.iter().find(|name| name == preferred))
        .or_else(|| installed.first())
        .map(String::as_str)
}

/// Every installed driver, preferred ones first in preference order, then
/// the rest in discovery order.
#[must_use]
pub fn rank_drivers(installed: &[String]) -> Vec<String> {
    let mut ranked: Vec<String> = DRIVER_PREFERENCE
        .iter()
        .filter(|preferred| installed.iter().any(|name| name == *preferred))
        .map(|preferred| String::from(*preferred))
        .collect();
    for name in installed {
        if !ranked.contains(name) {
            ranked.push(name.clone());
        }
    }
    ranked
}
