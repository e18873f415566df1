//! Demonstration query battery.
//!
//! Every query runs regardless of earlier failures; a failure is reported
//! inline under its label and recorded in the [`DemoReport`].

use std::io::Write;

use tokio::io::AsyncBufRead;
use tracing::warn;

use super::Console;
use crate::database::{QueryResult, SqlSession, Value, format_thousands, render_table};
use crate::error::{DatabaseError, SetupError};

/// How a demonstration query's result is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoKind {
    /// Table names, summarised by prefix.
    TableOverview,
    /// A single row count.
    Count,
    /// A sample printed as a table.
    Sample,
}

/// One labelled query in the battery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemoQuery {
    /// Label printed with the outcome.
    pub label: &'static str,
    /// Statement to run against the restored database.
    pub sql: &'static str,
    /// Presentation.
    pub kind: DemoKind,
}

/// Prefix of master-data tables.
pub const MASTER_PREFIX: &str = "mst_";

/// Prefix of transaction tables.
pub const TRANSACTION_PREFIX: &str = "trn_";

/// The standard battery, run against the restored database.
pub const DEMO_QUERIES: [DemoQuery; 6] = [
    DemoQuery {
        label: "Table Overview",
        sql: "SELECT TABLE_NAME FROM INFORMATION_SCHEMA.TABLES \
              WHERE TABLE_TYPE = 'BASE TABLE' ORDER BY TABLE_NAME",
        kind: DemoKind::TableOverview,
    },
    DemoQuery {
        label: "Ledger Summary",
        sql: "SELECT COUNT(*) AS total_ledgers FROM mst_ledger",
        kind: DemoKind::Count,
    },
    DemoQuery {
        label: "Transaction Summary",
        sql: "SELECT COUNT(*) AS total_transactions FROM trn_voucher",
        kind: DemoKind::Count,
    },
    DemoQuery {
        label: "Stock Items Summary",
        sql: "SELECT COUNT(*) AS total_items FROM mst_stock_item",
        kind: DemoKind::Count,
    },
    DemoQuery {
        label: "Recent Transactions",
        sql: "SELECT TOP 5 date, voucher_type, voucher_number, party_name \
              FROM trn_voucher ORDER BY date DESC",
        kind: DemoKind::Sample,
    },
    DemoQuery {
        label: "Top Ledgers by Balance",
        sql: "SELECT TOP 5 name, parent, opening_balance FROM mst_ledger \
              WHERE opening_balance IS NOT NULL AND opening_balance != 0 \
              ORDER BY ABS(opening_balance) DESC",
        kind: DemoKind::Sample,
    },
];

/// A query that failed, with the error text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoFailure {
    /// Label of the failed query.
    pub label: String,
    /// What went wrong.
    pub message: String,
}

/// Outcome of a battery run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DemoReport {
    /// Labels of the queries that succeeded, in run order.
    pub successes: Vec<String>,
    /// Queries that failed, in run order.
    pub failures: Vec<DemoFailure>,
}

impl DemoReport {
    /// Queries executed.
    #[must_use]
    pub fn executed(&self) -> usize {
        self.successes.len().saturating_add(self.failures.len())
    }

    /// Whether every query succeeded.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Table counts by prefix: (all, master, transaction).
fn table_overview(result: &QueryResult) -> (usize, usize, usize) {
    let names: Vec<&str> = result
        .rows
        .iter()
        .filter_map(|row| match row.first() {
            Some(Value::Text(name)) => Some(name.as_str()),
            _ => None,
        })
        .collect();
    let with_prefix = |prefix: &str| names.iter().filter(|n| n.starts_with(prefix)).count();
    (
        result.row_count(),
        with_prefix(MASTER_PREFIX),
        with_prefix(TRANSACTION_PREFIX),
    )
}

/// Lines presenting a successful result.
fn present(query: &DemoQuery, result: &QueryResult) -> Result<Vec<String>, DatabaseError> {
    match query.kind {
        DemoKind::TableOverview => {
            let (total, master, transaction) = table_overview(result);
            Ok(vec![
                format!("Database contains {total} tables:"),
                format!("   • Master Data Tables: {master}"),
                format!("   • Transaction Tables: {transaction}"),
            ])
        }
        DemoKind::Count => {
            let count = result.scalar().and_then(Value::as_int).ok_or_else(|| {
                DatabaseError::UnexpectedResult {
                    message: String::from("count query did not return an integer"),
                }
            })?;
            Ok(vec![format!(
                "   • {}: {} records",
                query.label,
                format_thousands(count)
            )])
        }
        DemoKind::Sample => Ok(vec![format!("{}:", query.label), render_table(result)]),
    }
}

const fn section_title(kind: DemoKind) -> Option<&'static str> {
    match kind {
        DemoKind::TableOverview => None,
        DemoKind::Count => Some("Data Summary:"),
        DemoKind::Sample => Some("Sample Data:"),
    }
}

/// Run every query in `queries` on `session`, printing each outcome.
///
/// # Errors
///
/// Only console failures abort the run; query failures are reported.
pub async fn run_demo<R, W>(
    session: &mut dyn SqlSession,
    queries: &[DemoQuery],
    console: &mut Console<R, W>,
) -> Result<DemoReport, SetupError>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut report = DemoReport::default();
    let mut section = None;

    for query in queries {
        if section != Some(query.kind) {
            section = Some(query.kind);
            if let Some(title) = section_title(query.kind) {
                console.blank()?;
                console.say(title)?;
            }
        }
        if query.kind == DemoKind::Sample {
            console.blank()?;
        }

        let outcome = session
            .query(query.sql)
            .await
            .and_then(|result| present(query, &result));
        match outcome {
            Ok(lines) => {
                for line in lines {
                    console.say(line)?;
                }
                report.successes.push(String::from(query.label));
            }
            Err(error) => {
                warn!(query = query.label, %error, "demonstration query failed");
                console.say(format_args!("   • {}: Error - {error}", query.label))?;
                report.failures.push(DemoFailure {
                    label: String::from(query.label),
                    message: error.to_string(),
                });
            }
        }
    }

    Ok(report)
}
