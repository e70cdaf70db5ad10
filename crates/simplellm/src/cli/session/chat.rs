use anyhow::Result;
use simplellm_core::generation::GenerationRequest;
use tracing::{debug, warn};

use super::{Session, SessionState};
use crate::cli::shell::ShellInput;
use crate::cli::ux::{GenerationSpinner, MessageType, rule, style_text};

/// What the user typed at the chat prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Quit,
    /// Show the catalog again, without refetching it.
    Models,
    Empty,
    Prompt(String),
}

impl ChatCommand {
    /// Commands are matched case-insensitively before input is treated as a prompt.
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            ChatCommand::Empty
        } else if line.eq_ignore_ascii_case("quit") {
            ChatCommand::Quit
        } else if line.eq_ignore_ascii_case("models") {
            ChatCommand::Models
        } else {
            ChatCommand::Prompt(line.to_string())
        }
    }
}

pub(super) enum ChatExit {
    Quit,
    Interrupted,
}

enum Turn {
    Continue,
    Interrupted,
}

impl Session<'_> {
    /// Reads prompts until `quit` or an interrupt. A failed turn is reported
    /// and the loop carries on.
    pub(super) async fn chat(&mut self, model: &str, state: &SessionState) -> Result<ChatExit> {
        self.blank()?;
        self.say(&format!("Chatting with {model}"), MessageType::Success)?;
        self.say(
            "Type 'quit' to exit, 'models' to see available models",
            MessageType::Info,
        )?;
        writeln!(self.out, "{}", rule('-'))?;

        let prompt = style_text("You: ", MessageType::Prompt).to_string();
        loop {
            self.blank()?;
            self.out.flush()?;
            let line = match self.input.read_line(&prompt)? {
                ShellInput::Line(line) => line,
                ShellInput::Interrupted => return Ok(ChatExit::Interrupted),
            };

            match ChatCommand::parse(&line) {
                ChatCommand::Quit => return Ok(ChatExit::Quit),
                ChatCommand::Models => self.show_catalog(&state.catalog)?,
                ChatCommand::Empty => continue,
                ChatCommand::Prompt(text) => {
                    if let Turn::Interrupted = self.turn(model, &text).await? {
                        return Ok(ChatExit::Interrupted);
                    }
                }
            }
        }
    }

    async fn turn(&mut self, model: &str, prompt: &str) -> Result<Turn> {
        let request = GenerationRequest::new(model, prompt, self.options.generation);
        debug!(model, prompt_len = prompt.len(), "Sending prompt");

        let service = self.service;
        let interrupted = (self.interrupt)();
        let spinner = GenerationSpinner::new("Thinking...");
        let result = tokio::select! {
            result = service.generate(&request) => Some(result),
            () = interrupted => None,
        };
        spinner.clear();

        match result {
            None => {
                debug!("Generation interrupted");
                Ok(Turn::Interrupted)
            }
            Some(Ok(response)) => {
                self.blank()?;
                writeln!(
                    self.out,
                    "{} {}",
                    style_text("Assistant:", MessageType::Prompt),
                    style_text(&response.text, MessageType::Assistant)
                )?;
                Ok(Turn::Continue)
            }
            Some(Err(e)) => {
                warn!("Generation turn failed: {e}");
                self.say(&format!("Error: {e}"), MessageType::Error)?;
                Ok(Turn::Continue)
            }
        }
    }
}
