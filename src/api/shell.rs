//! Interactive SQL shell.

use std::future::Future;
use std::io::Write;

use tokio::io::AsyncBufRead;
use tracing::debug;

use super::Console;
use crate::database::{SqlSession, render_table};
use crate::error::SetupError;

/// Prompt shown before each statement.
pub const SHELL_PROMPT: &str = "SQL> ";

/// Lines that leave the shell, compared case-insensitively.
pub const EXIT_DIRECTIVES: [&str; 3] = ["exit", "quit", "q"];

/// Whether `line` asks to leave the shell.
#[must_use]
pub fn is_exit_directive(line: &str) -> bool {
    let trimmed = line.trim();
    EXIT_DIRECTIVES
        .iter()
        .any(|directive| directive.eq_ignore_ascii_case(trimmed))
}

/// Why the shell stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellExit {
    /// The user typed an exit directive.
    Directive,
    /// Input ran out.
    EndOfInput,
    /// The interrupt signal arrived.
    Interrupted,
}

/// What happened during a shell session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShellSummary {
    /// Statements sent to the server.
    pub executed: usize,
    /// Statements that returned an error.
    pub failed: usize,
    /// How the session ended.
    pub exit: ShellExit,
}

/// Read statements until an exit directive, end of input, or `interrupt`
/// resolves. Each result is printed as a table; errors are printed inline
/// and do not end the session.
///
/// # Errors
///
/// Returns `SetupError::Console` if reading or writing the console fails.
pub async fn run_shell<R, W, I>(
    session: &mut dyn SqlSession,
    console: &mut Console<R, W>,
    interrupt: I,
) -> Result<ShellSummary, SetupError>
where
    R: AsyncBufRead + Unpin,
    W: Write,
    I: Future<Output = ()>,
{
    let mut interrupt = std::pin::pin!(interrupt);
    let mut executed = 0_usize;
    let mut failed = 0_usize;

    console.say("Type your SQL queries below (or 'exit' to quit)")?;
    console.say("Example: SELECT TOP 10 * FROM mst_ledger")?;

    let exit = loop {
        console.blank()?;
        console.prompt(SHELL_PROMPT)?;
        let next = tokio::select! {
            () = &mut interrupt => None,
            line = console.read_line() => Some(line?),
        };
        let Some(read) = next else {
            console.blank()?;
            break ShellExit::Interrupted;
        };
        let Some(line) = read else {
            console.blank()?;
            break ShellExit::EndOfInput;
        };

        let statement = line.trim();
        if statement.is_empty() {
            continue;
        }
        if is_exit_directive(statement) {
            break ShellExit::Directive;
        }

        executed = executed.saturating_add(1);
        let outcome = tokio::select! {
            () = &mut interrupt => None,
            result = session.query(statement) => Some(result),
        };
        match outcome {
            None => break ShellExit::Interrupted,
            Some(Ok(result)) => {
                console.blank()?;
                console.say(format_args!("Results ({} rows):", result.row_count()))?;
                let table = render_table(&result);
                if !table.is_empty() {
                    console.say(table)?;
                }
            }
            Some(Err(error)) => {
                failed = failed.saturating_add(1);
                debug!(%error, "shell statement failed");
                console.say(format_args!("Query error: {error}"))?;
            }
        }
    };

    console.say("Exiting interactive mode...")?;
    Ok(ShellSummary {
        executed,
        failed,
        exit,
    })
}
