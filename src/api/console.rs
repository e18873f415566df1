//! Line-oriented user interaction.
//!
//! The workflow narrates to a `Write` sink and reads answers from an async
//! line source, so the binary can wire up stdin/stdout while tests use
//! in-memory buffers.

use std::fmt::Display;
use std::io::Write;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::error::SetupError;

const RULE_WIDTH: usize = 60;
const STEP_RULE_WIDTH: usize = 40;

fn console_error(error: &std::io::Error) -> SetupError {
    SetupError::Console {
        message: error.to_string(),
    }
}

/// Narrative output plus prompted input.
#[derive(Debug)]
pub struct Console<R, W> {
    input: R,
    output: W,
}

impl<R, W> Console<R, W>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    /// Wrap an input source and an output sink.
    pub const fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Write one line.
    ///
    /// # Errors
    ///
    /// Returns `SetupError::Console` if the sink fails.
    pub fn say(&mut self, line: impl Display) -> Result<(), SetupError> {
        writeln!(self.output, "{line}").map_err(|e| console_error(&e))
    }

    /// Write a blank line.
    ///
    /// # Errors
    ///
    /// Returns `SetupError::Console` if the sink fails.
    pub fn blank(&mut self) -> Result<(), SetupError> {
        self.say("")
    }

    /// Write a boxed section title.
    ///
    /// # Errors
    ///
    /// Returns `SetupError::Console` if the sink fails.
    pub fn header(&mut self, title: &str) -> Result<(), SetupError> {
        let rule = "=".repeat(RULE_WIDTH);
        self.blank()?;
        self.say(&rule)?;
        self.say(title)?;
        self.say(&rule)
    }

    /// Write a numbered stage heading.
    ///
    /// # Errors
    ///
    /// Returns `SetupError::Console` if the sink fails.
    pub fn step(&mut self, number: usize, title: &str) -> Result<(), SetupError> {
        self.blank()?;
        self.say(format_args!("{number}. {title}"))?;
        self.say("-".repeat(STEP_RULE_WIDTH))
    }

    /// Write `text` without a newline and flush.
    ///
    /// # Errors
    ///
    /// Returns `SetupError::Console` if the sink fails.
    pub fn prompt(&mut self, text: &str) -> Result<(), SetupError> {
        write!(self.output, "{text}")
            .and_then(|()| self.output.flush())
            .map_err(|e| console_error(&e))
    }

    /// Read one line without its terminator. `None` at end of input.
    ///
    /// # Errors
    ///
    /// Returns `SetupError::Console` if the source fails.
    pub async fn read_line(&mut self) -> Result<Option<String>, SetupError> {
        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .await
            .map_err(|e| console_error(&e))?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(String::from(line.trim_end_matches(['\r', '\n']))))
    }

    /// Ask a yes/no question. Only `y` or `yes` count as agreement; end of
    /// input counts as a refusal.
    ///
    /// # Errors
    ///
    /// Returns `SetupError::Console` if either side of the console fails.
    pub async fn confirm(&mut self, question: &str) -> Result<bool, SetupError> {
        self.prompt(&format!("{question} (y/n): "))?;
        let answer = self.read_line().await?;
        Ok(answer.is_some_and(|text| {
            let choice = text.trim().to_lowercase();
            choice == "y" || choice == "yes"
        }))
    }

    /// The output sink.
    pub const fn output(&self) -> &W {
        &self.output
    }
}
