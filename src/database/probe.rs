//! Connectivity probe.

use tracing::{debug, info, warn};

use super::{ConnectionParams, SqlConnector};
use crate::error::{DatabaseError, TallyError};
use crate::retry::{RetryError, RetryPolicy};

/// Round trip used to decide whether the server is answering.
pub const PROBE_STATEMENT: &str = "SELECT 1";

/// Try each driver in turn until one completes a [`PROBE_STATEMENT`] round
/// trip, returning that driver.
///
/// Each driver gets the full budget of `policy`. An empty driver list fails
/// without any connection attempt.
///
/// # Errors
///
/// Returns `DatabaseError::NoDriverAvailable` when `drivers` is empty and
/// `DatabaseError::ProbeExhausted` once every driver has used up its budget.
pub async fn probe_server<C: SqlConnector + ?Sized>(
    connector: &C,
    base: &ConnectionParams,
    drivers: &[String],
    policy: RetryPolicy,
) -> Result<String, TallyError> {
    if drivers.is_empty() {
        return Err(DatabaseError::NoDriverAvailable.into());
    }

    for driver in drivers {
        let candidate = base.clone().with_driver(driver.as_str());
        let target = &candidate;
        let outcome = policy
            .run(
                move |attempt| async move {
                    debug!(driver = target.driver(), attempt, "probing server");
                    let mut session = connector.connect(target).await?;
                    session.query(PROBE_STATEMENT).await.map(drop)
                },
                |_: &DatabaseError| true,
            )
            .await;

        match outcome {
            Ok(()) => {
                info!(driver = driver.as_str(), "server answered");
                return Ok(driver.clone());
            }
            Err(RetryError::Exhausted { last_error, .. } | RetryError::Fatal { error: last_error, .. }) => {
                warn!(driver = driver.as_str(), error = %last_error, "driver exhausted its attempts");
            }
        }
    }

    Err(DatabaseError::ProbeExhausted {
        drivers: drivers.len(),
        attempts: policy.max_attempts(),
    }
    .into())
}
