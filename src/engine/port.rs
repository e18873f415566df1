//! Host port selection for the server binding.

use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::time::Duration;

use crate::error::ContainerError;

const PROBE_TIMEOUT: Duration = Duration::from_millis(250);

/// Reports whether a local TCP port already has a listener.
#[cfg_attr(test, mockall::automock)]
pub trait PortProbe {
    /// `true` when something accepts connections on `port`.
    fn in_use(&self, port: u16) -> bool;
}

/// Probes ports by attempting a loopback connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpPortProbe;

impl PortProbe for TcpPortProbe {
    fn in_use(&self, port: u16) -> bool {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
        TcpStream::connect_timeout(&addr, PROBE_TIMEOUT).is_ok()
    }
}

/// Return the smallest port in `base..=ceiling` that `probe` reports free.
///
/// # Errors
///
/// Returns `ContainerError::NoPortAvailable` when every port in the range is
/// taken or the range is empty.
pub fn select_port<P: PortProbe + ?Sized>(
    probe: &P,
    base: u16,
    ceiling: u16,
) -> Result<u16, ContainerError> {
    (base..=ceiling)
        .find(|port| !probe.in_use(*port))
        .ok_or(ContainerError::NoPortAvailable { base, ceiling })
}
