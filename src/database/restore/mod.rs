//! Backup restore and restore verification.
//!
//! The restore is issued once on an autocommit `master` session. The server
//! may still be bringing the database online when the statement returns, so
//! the base-table count is polled on the same session until the count query
//! succeeds.

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use tracing::{debug, info};

use super::{ConnectionParams, QueryResult, SqlConnector, SqlSession, Value};
use crate::config::RestoreConfig;
use crate::error::{DatabaseError, TallyError};
use crate::retry::{RetryError, RetryPolicy};

/// Resolve `.` and `..` without touching the filesystem.
///
/// A `..` above the root is dropped.
fn lexically_normalise(path: &Utf8Path) -> Utf8PathBuf {
    let mut normalised = Utf8PathBuf::new();
    for component in path.components() {
        match component {
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => {
                normalised.pop();
            }
            other => normalised.push(other),
        }
    }
    normalised
}

/// Where a backup lives on the host and inside the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestorePlan {
    database: String,
    host_path: Utf8PathBuf,
    container_path: Utf8PathBuf,
}

impl RestorePlan {
    /// Locate `backup` inside the directory mounted at `mount_target`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::BackupOutsideMount` when `backup`, with `.` and
    /// `..` resolved, is not under `mount_source`, and `DatabaseError::BackupNotFound` when the file does
    /// not exist.
    pub fn locate(
        database: impl Into<String>,
        backup: &Utf8Path,
        mount_source: &Utf8Path,
        mount_target: &Utf8Path,
    ) -> Result<Self, DatabaseError> {
        let resolved = lexically_normalise(backup);
        let relative =
            resolved
                .strip_prefix(mount_source)
                .map_err(|_| DatabaseError::BackupOutsideMount {
                    path: resolved.clone(),
                    mount: mount_source.to_path_buf(),
                })?;

        let present = Dir::open_ambient_dir(mount_source, ambient_authority())
            .is_ok_and(|dir| dir.is_file(relative));
        if !present {
            return Err(DatabaseError::BackupNotFound {
                path: backup.to_path_buf(),
            });
        }

        let container_path = mount_target.join(relative);
        Ok(Self {
            database: database.into(),
            host_path: resolved,
            container_path,
        })
    }

    /// Name of the database being restored.
    #[must_use]
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Backup location on the host.
    #[must_use]
    pub fn host_path(&self) -> &Utf8Path {
        &self.host_path
    }

    /// Backup location as the server sees it.
    #[must_use]
    pub fn container_path(&self) -> &Utf8Path {
        &self.container_path
    }

    /// The `RESTORE DATABASE` statement.
    #[must_use]
    pub fn restore_statement(&self) -> String {
        format!(
            "RESTORE DATABASE {} FROM DISK = N'{}' WITH REPLACE",
            quote_identifier(&self.database),
            self.container_path.as_str().replace('\'', "''")
        )
    }

    /// Query counting the restored base tables.
    #[must_use]
    pub fn verification_query(&self) -> String {
        format!(
            "SELECT COUNT(*) FROM {}.INFORMATION_SCHEMA.TABLES WHERE TABLE_TYPE = 'BASE TABLE'",
            quote_identifier(&self.database)
        )
    }
}

/// Bracket-quote an identifier.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

/// Decides which errors mean the database is still being restored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransientErrorClassifier {
    codes: Vec<u32>,
    markers: Vec<String>,
}

impl TransientErrorClassifier {
    /// Classifier over server error numbers and message fragments.
    /// Fragments match case-insensitively.
    #[must_use]
    pub fn new(codes: Vec<u32>, markers: &[String]) -> Self {
        Self {
            codes,
            markers: markers.iter().map(|m| m.to_lowercase()).collect(),
        }
    }

    /// Classifier built from the restore configuration.
    #[must_use]
    pub fn from_config(config: &RestoreConfig) -> Self {
        Self::new(config.transient_codes.clone(), &config.transient_markers)
    }

    /// Whether `error` means "still restoring".
    #[must_use]
    pub fn is_transient(&self, error: &DatabaseError) -> bool {
        if error
            .server_code()
            .is_some_and(|code| self.codes.contains(&code))
        {
            return true;
        }
        let message = error.to_string().to_lowercase();
        self.markers.iter().any(|marker| message.contains(marker))
    }
}

fn base_table_count(result: &QueryResult) -> Result<u64, DatabaseError> {
    result
        .scalar()
        .and_then(Value::as_int)
        .and_then(|count| u64::try_from(count).ok())
        .ok_or_else(|| DatabaseError::UnexpectedResult {
            message: String::from("table count query did not return a non-negative integer"),
        })
}

/// Restore the backup described by `plan` and wait for its tables.
///
/// Returns the base-table count from the first verification query that
/// succeeds, zero included.
///
/// # Errors
///
/// Fails at once if the `master` session cannot be opened, the restore
/// statement is rejected, or a verification poll fails with an error the
/// classifier does not recognise. Returns `DatabaseError::RestoreTimedOut`
/// when the poll budget runs out.
pub async fn restore_database<C: SqlConnector + ?Sized>(
    connector: &C,
    master: &ConnectionParams,
    plan: &RestorePlan,
    classifier: &TransientErrorClassifier,
    policy: RetryPolicy,
) -> Result<u64, TallyError> {
    let mut session = connector.connect(master).await?;
    info!(backup = %plan.container_path(), database = plan.database(), "issuing restore");
    session.query(&plan.restore_statement()).await?;

    let verification = plan.verification_query();
    let sql = verification.as_str();
    let outcome = policy
        .run_with(
            session,
            move |mut polled: Box<dyn SqlSession>, attempt| async move {
                debug!(attempt, "checking restored tables");
                let counted = polled
                    .query(sql)
                    .await
                    .and_then(|result| base_table_count(&result));
                (polled, counted)
            },
            |error: &DatabaseError| classifier.is_transient(error),
        )
        .await;

    match outcome {
        Ok(count) => {
            info!(tables = count, "restore verified");
            Ok(count)
        }
        Err(RetryError::Exhausted { attempts, .. }) => {
            Err(DatabaseError::RestoreTimedOut { attempts }.into())
        }
        Err(RetryError::Fatal { error, .. }) => Err(error.into()),
    }
}
