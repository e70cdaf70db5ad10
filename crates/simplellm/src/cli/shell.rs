//! Line input for the interactive session.
use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::{Config, DefaultEditor};
use tracing::debug;

/// One read from the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellInput {
    Line(String),
    /// Ctrl-C or end of input. The session ends gracefully on either.
    Interrupted,
}

/// Source of user input lines.
pub trait LineReader {
    fn read_line(&mut self, prompt: &str) -> Result<ShellInput>;
}

/// Reads from the terminal with line editing and in-memory history.
pub struct TerminalShell {
    editor: DefaultEditor,
}

impl TerminalShell {
    pub fn new() -> Result<Self> {
        let config = Config::builder()
            .history_ignore_dups(true)?
            .history_ignore_space(true)
            .auto_add_history(false)
            .build();
        Ok(Self {
            editor: DefaultEditor::with_config(config)?,
        })
    }
}

impl LineReader for TerminalShell {
    fn read_line(&mut self, prompt: &str) -> Result<ShellInput> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    self.editor.add_history_entry(line.as_str())?;
                }
                Ok(ShellInput::Line(line))
            }
            Err(ReadlineError::Interrupted) => {
                debug!("Input interrupted");
                Ok(ShellInput::Interrupted)
            }
            Err(ReadlineError::Eof) => {
                debug!("End of input");
                Ok(ShellInput::Interrupted)
            }
            Err(err) => Err(err.into()),
        }
    }
}
