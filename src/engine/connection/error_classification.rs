//! Error classification helpers for container engine connection failures.
//!
//! Low-level `Bollard` errors are mapped onto semantic `ContainerError`
//! variants so a missing or inaccessible engine reads as a missing
//! prerequisite rather than an opaque transport failure.

use std::io::ErrorKind;

use camino::Utf8Path;

use crate::error::ContainerError;

/// Extract the filesystem path from a socket URI.
///
/// Strips the `unix://` or `npipe://` scheme. HTTP endpoints and bare paths
/// yield `None`.
pub(super) fn extract_socket_path(socket_uri: &str) -> Option<&Utf8Path> {
    socket_uri
        .strip_prefix("unix://")
        .or_else(|| socket_uri.strip_prefix("npipe://"))
        .map(Utf8Path::new)
}

fn classify_io_error_kind(
    kind: ErrorKind,
    socket_path: Option<&Utf8Path>,
    error_msg: &str,
) -> ContainerError {
    let fallback = || ContainerError::ConnectionFailed {
        message: error_msg.to_owned(),
    };
    match (kind, socket_path) {
        (ErrorKind::PermissionDenied, Some(path)) => ContainerError::PermissionDenied {
            path: path.to_path_buf(),
        },
        (ErrorKind::NotFound, Some(path)) => ContainerError::SocketNotFound {
            path: path.to_path_buf(),
        },
        _ => fallback(),
    }
}

/// Classify a `Bollard` connection error into a semantic `ContainerError`.
///
/// Falls back to `ConnectionFailed` for errors that do not match known
/// patterns or for endpoints without filesystem paths.
pub(super) fn classify_connection_error(
    bollard_error: &bollard::errors::Error,
    socket_uri: &str,
) -> ContainerError {
    let socket_path = extract_socket_path(socket_uri);
    let error_msg = bollard_error.to_string();

    match bollard_error {
        bollard::errors::Error::SocketNotFoundError(_) => {
            if let Some(path) = socket_path {
                return ContainerError::SocketNotFound {
                    path: path.to_path_buf(),
                };
            }
        }
        bollard::errors::Error::IOError { err } => {
            let kind = io_error_kind_in_chain(err).unwrap_or_else(|| err.kind());
            return classify_io_error_kind(kind, socket_path, &error_msg);
        }
        _ => {}
    }

    if let Some(kind) = io_error_kind_in_chain(bollard_error) {
        return classify_io_error_kind(kind, socket_path, &error_msg);
    }

    ContainerError::ConnectionFailed { message: error_msg }
}

/// Walk the error source chain looking for an `io::Error` kind.
fn io_error_kind_in_chain(error: &dyn std::error::Error) -> Option<ErrorKind> {
    let mut current: Option<&(dyn std::error::Error + 'static)> = error.source();
    while let Some(err) = current {
        if let Some(io_err) = err.downcast_ref::<std::io::Error>() {
            return Some(io_err.kind());
        }
        current = err.source();
    }
    None
}
