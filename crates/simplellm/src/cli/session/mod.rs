//! Interactive session: startup checks, model selection and the chat loop.
//!
//! The session walks a fixed sequence of steps. Every failure a step can hit is
//! turned into a message and either the next step or a graceful end; only
//! terminal I/O errors escape [`Session::run`].
use std::future::Future;
use std::io::Write;
use std::pin::Pin;
use std::time::Duration;

use anyhow::Result;
use simplellm_core::catalog::Catalog;
use simplellm_core::config::Config;
use simplellm_core::generation::GenerationOptions;
use simplellm_core::process::{ServiceLauncher, wait_for_ready};
use simplellm_core::service::ModelService;
use tracing::{debug, info};

use crate::cli::shell::{LineReader, ShellInput};
use crate::cli::ux::{MessageType, rule, style_text};

mod chat;

const SETUP_INSTRUCTIONS: &str = "\
Simple LLM Install - Quick Start Guide

PREREQUISITES:
1. Install Ollama first: https://ollama.ai/
   - Windows: Download the installer
   - macOS: brew install ollama
   - Linux: curl -fsSL https://ollama.ai/install.sh | sh

2. Start Ollama service:
   ollama serve

POPULAR MODELS:
- llama2: General purpose (3.8GB)
- mistral: Efficient model (4.1GB)
- codellama: Coding assistant (3.8GB)
- llama2:13b: Larger version (7.3GB)

USAGE:
1. Run simplellm
2. Choose a model to use
3. Start chatting!

Nothing is downloaded unless you ask for it.";

/// Knobs for the startup wait and every generation turn.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub startup_wait: Duration,
    pub startup_attempts: u32,
    pub generation: GenerationOptions,
}

impl SessionOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            startup_wait: config.startup.wait(),
            startup_attempts: config.startup.attempts,
            generation: config.chat.options(),
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Everything the session knows, for the lifetime of one run.
#[derive(Debug, Default)]
pub struct SessionState {
    pub selected_model: Option<String>,
    pub catalog: Catalog,
}

/// How a session ended. All of these are graceful.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    NotInstalled,
    ServiceUnavailable,
    SetupDeclined,
    PullFailed,
    InvalidSelection,
    /// The user typed `quit`.
    Finished,
    /// Ctrl-C or end of input.
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    CheckInstalled,
    CheckRunning,
    AutoStart,
    EnsureModels,
    SelectModel,
    Chat,
    End(SessionEnd),
}

/// Resolves when the user asks to cancel an in-flight generation.
pub type InterruptSignal = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Waits for Ctrl-C. If the handler cannot be installed, never resolves.
pub fn ctrl_c_signal() -> InterruptSignal {
    Box::pin(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            debug!("Ctrl-C handler unavailable: {e}");
            std::future::pending::<()>().await;
        }
    })
}

pub struct Session<'a> {
    service: &'a dyn ModelService,
    launcher: &'a dyn ServiceLauncher,
    input: &'a mut dyn LineReader,
    out: &'a mut (dyn Write + Send),
    options: SessionOptions,
    interrupt: fn() -> InterruptSignal,
}

impl<'a> Session<'a> {
    pub fn new(
        service: &'a dyn ModelService,
        launcher: &'a dyn ServiceLauncher,
        input: &'a mut dyn LineReader,
        out: &'a mut (dyn Write + Send),
        options: SessionOptions,
    ) -> Self {
        Self {
            service,
            launcher,
            input,
            out,
            options,
            interrupt: ctrl_c_signal,
        }
    }

    /// Replaces the signal that cancels a generation turn.
    #[cfg(test)]
    pub fn with_interrupt(mut self, interrupt: fn() -> InterruptSignal) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Runs the session to completion.
    pub async fn run(&mut self, state: &mut SessionState) -> Result<SessionEnd> {
        self.banner()?;

        let mut step = Step::CheckInstalled;
        loop {
            debug!(?step, "Session step");
            step = match step {
                Step::CheckInstalled => self.check_installed().await?,
                Step::CheckRunning => self.check_running().await?,
                Step::AutoStart => self.auto_start().await?,
                Step::EnsureModels => self.ensure_models(state).await?,
                Step::SelectModel => self.select_model(state)?,
                Step::Chat => self.chat_step(state).await?,
                Step::End(end) => {
                    info!(?end, "Session ended");
                    self.out.flush()?;
                    return Ok(end);
                }
            };
        }
    }

    async fn check_installed(&mut self) -> Result<Step> {
        if self.launcher.is_installed().await {
            return Ok(Step::CheckRunning);
        }
        self.say("Ollama is not installed", MessageType::Error)?;
        self.instructions()?;
        Ok(Step::End(SessionEnd::NotInstalled))
    }

    async fn check_running(&mut self) -> Result<Step> {
        if self.service.probe_ready().await {
            self.say("Ollama is installed and running", MessageType::Success)?;
            return Ok(Step::EnsureModels);
        }
        self.say("Ollama service is not running", MessageType::Error)?;
        self.say("Start Ollama with: ollama serve", MessageType::Info)?;
        Ok(Step::AutoStart)
    }

    async fn auto_start(&mut self) -> Result<Step> {
        self.blank()?;
        self.say("Starting Ollama service...", MessageType::Info)?;

        if let Err(e) = self.launcher.start_background().await {
            self.say(&format!("Error starting Ollama: {e}"), MessageType::Error)?;
            self.instructions()?;
            return Ok(Step::End(SessionEnd::ServiceUnavailable));
        }

        self.say("Waiting for Ollama to start...", MessageType::Info)?;
        self.out.flush()?;
        let ready = wait_for_ready(
            self.service,
            self.options.startup_wait,
            self.options.startup_attempts,
        )
        .await;

        if ready {
            self.say("Ollama is installed and running", MessageType::Success)?;
            Ok(Step::EnsureModels)
        } else {
            self.say("Could not start Ollama automatically", MessageType::Error)?;
            self.say(
                "Please run 'ollama serve' manually in another terminal",
                MessageType::Info,
            )?;
            Ok(Step::End(SessionEnd::ServiceUnavailable))
        }
    }

    async fn ensure_models(&mut self, state: &mut SessionState) -> Result<Step> {
        state.catalog = self.service.list_models().await;
        if !state.catalog.is_empty() {
            return Ok(Step::SelectModel);
        }

        self.blank()?;
        self.say("No models available", MessageType::Info)?;
        self.say("You need to download models first", MessageType::Info)?;

        let Some(answer) = self.ask("Download a model? (y/n): ")? else {
            return self.farewell();
        };
        if !answer.trim().eq_ignore_ascii_case("y") {
            self.instructions()?;
            return Ok(Step::End(SessionEnd::SetupDeclined));
        }

        let Some(name) = self.ask("Enter model name (e.g., llama2): ")? else {
            return self.farewell();
        };
        let name = name.trim();
        if name.is_empty() {
            return Ok(Step::SelectModel);
        }

        self.blank()?;
        self.say(&format!("Downloading {name}..."), MessageType::Info)?;
        self.out.flush()?;
        let launcher = self.launcher;
        match launcher.pull_model(name, &mut *self.out).await {
            Ok(()) => {
                self.say(
                    &format!("Successfully downloaded {name}"),
                    MessageType::Success,
                )?;
                state.catalog = self.service.list_models().await;
                Ok(Step::SelectModel)
            }
            Err(e) => {
                self.say(&format!("Failed to download model: {e}"), MessageType::Error)?;
                Ok(Step::End(SessionEnd::PullFailed))
            }
        }
    }

    fn select_model(&mut self, state: &mut SessionState) -> Result<Step> {
        self.show_catalog(&state.catalog)?;

        self.blank()?;
        let Some(choice) = self.ask("Select model (number) or enter model name: ")? else {
            return self.farewell();
        };

        match state.catalog.resolve_selection(&choice) {
            Ok(name) => {
                self.say(&format!("Selected model: {name}"), MessageType::Success)?;
                state.selected_model = Some(name);
                Ok(Step::Chat)
            }
            Err(e) => {
                self.say(&e.to_string(), MessageType::Error)?;
                Ok(Step::End(SessionEnd::InvalidSelection))
            }
        }
    }

    async fn chat_step(&mut self, state: &SessionState) -> Result<Step> {
        let Some(model) = state.selected_model.clone() else {
            return Ok(Step::SelectModel);
        };
        match self.chat(&model, state).await? {
            chat::ChatExit::Quit => {
                self.say("Goodbye!", MessageType::Info)?;
                Ok(Step::End(SessionEnd::Finished))
            }
            chat::ChatExit::Interrupted => self.farewell(),
        }
    }

    /// Prints the numbered catalog, or a notice when it is empty.
    fn show_catalog(&mut self, catalog: &Catalog) -> Result<()> {
        match catalog.render() {
            Some(lines) => {
                self.blank()?;
                self.say("Available Models:", MessageType::Info)?;
                writeln!(self.out, "{}", rule('-'))?;
                for line in lines {
                    writeln!(self.out, "{line}")?;
                }
            }
            None => self.say("No models found", MessageType::Error)?,
        }
        Ok(())
    }

    /// Reads one line. `None` means the user interrupted.
    fn ask(&mut self, prompt: &str) -> Result<Option<String>> {
        self.out.flush()?;
        let prompt = style_text(prompt, MessageType::Prompt).to_string();
        match self.input.read_line(&prompt)? {
            ShellInput::Line(line) => Ok(Some(line)),
            ShellInput::Interrupted => Ok(None),
        }
    }

    fn farewell(&mut self) -> Result<Step> {
        self.blank()?;
        self.say("Goodbye!", MessageType::Info)?;
        Ok(Step::End(SessionEnd::Interrupted))
    }

    fn banner(&mut self) -> Result<()> {
        writeln!(self.out, "{}", rule('='))?;
        writeln!(self.out, "{}", style_text("Simple LLM Install", MessageType::Prompt))?;
        writeln!(self.out, "{}", rule('='))?;
        Ok(())
    }

    fn instructions(&mut self) -> Result<()> {
        self.blank()?;
        writeln!(self.out, "{SETUP_INSTRUCTIONS}")?;
        Ok(())
    }

    fn say(&mut self, text: &str, kind: MessageType) -> Result<()> {
        writeln!(self.out, "{}", style_text(text, kind))?;
        Ok(())
    }

    fn blank(&mut self) -> Result<()> {
        writeln!(self.out)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::test_utils::{FakeLauncher, FakeService, ScriptedInput, run_session};
    use simplellm_core::catalog::ModelDescriptor;
    use std::sync::atomic::Ordering;

    fn mistral_catalog() -> Catalog {
        Catalog::new(vec![ModelDescriptor::new("mistral", 4_404_019_200)])
    }

    #[tokio::test]
    async fn test_not_installed_prints_instructions_without_http() {
        let service = FakeService::ready_with(vec![mistral_catalog()]);
        let launcher = FakeLauncher::not_installed();
        let mut input = ScriptedInput::new(&[]);

        let (end, output) = run_session(&service, &launcher, &mut input).await;

        assert_eq!(end, SessionEnd::NotInstalled);
        assert!(output.contains("Ollama is not installed"));
        assert!(output.contains("https://ollama.ai/"));
        assert!(output.contains("ollama serve"));
        assert_eq!(service.probes.load(Ordering::SeqCst), 0);
        assert_eq!(service.lists.load(Ordering::SeqCst), 0);
        assert!(input.prompts.is_empty());
    }

    #[tokio::test]
    async fn test_auto_start_success_proceeds_to_listing() {
        let service = FakeService::with_catalogs(vec![mistral_catalog()]);
        let launcher = FakeLauncher::installed().starting(&service);
        let mut input = ScriptedInput::new(&["1", "quit"]);

        let (end, output) = run_session(&service, &launcher, &mut input).await;

        assert_eq!(end, SessionEnd::Finished);
        assert_eq!(launcher.starts.load(Ordering::SeqCst), 1);
        assert_eq!(service.probes.load(Ordering::SeqCst), 2);
        assert_eq!(service.lists.load(Ordering::SeqCst), 1);
        assert!(output.contains("Ollama service is not running"));
        assert!(output.contains("Waiting for Ollama to start..."));
        assert!(output.contains("1. mistral (4.1 GB)"));
        assert!(output.contains("Selected model: mistral"));
    }

    #[tokio::test]
    async fn test_auto_start_not_ready_ends_with_manual_hint() {
        let service = FakeService::with_catalogs(vec![mistral_catalog()]);
        let launcher = FakeLauncher::installed();
        let mut input = ScriptedInput::new(&[]);

        let (end, output) = run_session(&service, &launcher, &mut input).await;

        assert_eq!(end, SessionEnd::ServiceUnavailable);
        assert!(output.contains("Could not start Ollama automatically"));
        assert!(output.contains("manually in another terminal"));
        assert_eq!(service.lists.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_auto_start_spawn_failure_is_reported() {
        let service = FakeService::with_catalogs(vec![mistral_catalog()]);
        let launcher = FakeLauncher {
            start_fails: true,
            ..FakeLauncher::installed()
        };
        let mut input = ScriptedInput::new(&[]);

        let (end, output) = run_session(&service, &launcher, &mut input).await;

        assert_eq!(end, SessionEnd::ServiceUnavailable);
        assert!(output.contains("Error starting Ollama"));
        assert!(output.contains("Quick Start Guide"));
    }

    #[tokio::test]
    async fn test_empty_catalog_decline_prints_instructions() {
        let service = FakeService::ready_with(vec![Catalog::default()]);
        let launcher = FakeLauncher::installed();
        let mut input = ScriptedInput::new(&["n"]);

        let (end, output) = run_session(&service, &launcher, &mut input).await;

        assert_eq!(end, SessionEnd::SetupDeclined);
        assert!(output.contains("No models available"));
        assert!(output.contains("Quick Start Guide"));
        assert!(launcher.pulls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_catalog_pull_failure_ends_session() {
        let service = FakeService::ready_with(vec![Catalog::default()]);
        let launcher = FakeLauncher {
            pull_lines: vec!["pulling manifest".to_string()],
            pull_succeeds: false,
            ..FakeLauncher::installed()
        };
        let mut input = ScriptedInput::new(&["Y", "ghost-model"]);

        let (end, output) = run_session(&service, &launcher, &mut input).await;

        assert_eq!(end, SessionEnd::PullFailed);
        assert_eq!(*launcher.pulls.lock().unwrap(), vec!["ghost-model"]);
        assert!(output.contains("Failed to download model"));
    }

    #[tokio::test]
    async fn test_empty_catalog_pull_success_refreshes_catalog() {
        let service = FakeService::ready_with(vec![Catalog::default(), mistral_catalog()]);
        let launcher = FakeLauncher {
            pull_lines: vec!["pulling manifest".to_string(), "success".to_string()],
            ..FakeLauncher::installed()
        };
        let mut input = ScriptedInput::new(&["y", " mistral ", "1", "quit"]);

        let (end, output) = run_session(&service, &launcher, &mut input).await;

        assert_eq!(end, SessionEnd::Finished);
        assert_eq!(*launcher.pulls.lock().unwrap(), vec!["mistral"]);
        assert_eq!(service.lists.load(Ordering::SeqCst), 2);
        assert!(output.contains("Downloading mistral..."));
        assert!(output.contains("   pulling manifest"));
        assert!(output.contains("Successfully downloaded mistral"));
        assert!(output.contains("1. mistral (4.1 GB)"));
    }

    #[tokio::test]
    async fn test_empty_model_name_skips_pull() {
        let service = FakeService::ready_with(vec![Catalog::default()]);
        let launcher = FakeLauncher::installed();
        let mut input = ScriptedInput::new(&["y", "", "llama2", "quit"]);

        let (end, output) = run_session(&service, &launcher, &mut input).await;

        assert_eq!(end, SessionEnd::Finished);
        assert!(launcher.pulls.lock().unwrap().is_empty());
        assert!(output.contains("No models found"));
        assert!(output.contains("Selected model: llama2"));
    }

    #[tokio::test]
    async fn test_number_without_models_asks_for_a_name() {
        let service = FakeService::ready_with(vec![Catalog::default()]);
        let launcher = FakeLauncher::installed();
        let mut input = ScriptedInput::new(&["y", "", "1"]);

        let (end, output) = run_session(&service, &launcher, &mut input).await;

        assert_eq!(end, SessionEnd::InvalidSelection);
        assert!(output.contains("No models are available, enter a model name instead"));
        assert!(!output.contains("between 1 and 0"));
    }

    #[tokio::test]
    async fn test_invalid_selection_ends_session() {
        let service = FakeService::ready_with(vec![mistral_catalog()]);
        let launcher = FakeLauncher::installed();
        let mut input = ScriptedInput::new(&["7"]);

        let (end, output) = run_session(&service, &launcher, &mut input).await;

        assert_eq!(end, SessionEnd::InvalidSelection);
        assert!(output.contains("Invalid selection"));
        assert_eq!(service.requests.lock().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_literal_model_name_is_passed_through() {
        let service = FakeService::ready_with(vec![mistral_catalog()]);
        let launcher = FakeLauncher::installed();
        let mut input = ScriptedInput::new(&["custom-model", "hello", "quit"]);

        let (end, _) = run_session(&service, &launcher, &mut input).await;

        assert_eq!(end, SessionEnd::Finished);
        let requests = service.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "custom-model");
    }

    #[tokio::test]
    async fn test_interrupt_at_selection_says_goodbye() {
        let service = FakeService::ready_with(vec![mistral_catalog()]);
        let launcher = FakeLauncher::installed();
        let mut input = ScriptedInput::new(&[]);

        let (end, output) = run_session(&service, &launcher, &mut input).await;

        assert_eq!(end, SessionEnd::Interrupted);
        let last_line = output.lines().rev().find(|l| !l.trim().is_empty()).unwrap();
        assert!(last_line.contains("Goodbye!"));
    }

    #[tokio::test]
    async fn test_interrupt_at_download_prompt_says_goodbye() {
        let service = FakeService::ready_with(vec![Catalog::default()]);
        let launcher = FakeLauncher::installed();
        let mut input = ScriptedInput::new(&[]);

        let (end, output) = run_session(&service, &launcher, &mut input).await;

        assert_eq!(end, SessionEnd::Interrupted);
        assert!(output.contains("Goodbye!"));
    }

    #[test]
    fn test_options_from_default_config() {
        let options = SessionOptions::default();
        assert_eq!(options.startup_wait, Duration::from_secs(3));
        assert_eq!(options.startup_attempts, 1);
        assert_eq!(options.generation, GenerationOptions::default());
    }
}
