#![cfg(test)]

//! Test doubles for the session modules

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use simplellm_core::catalog::Catalog;
use simplellm_core::generation::{GenerationOptions, GenerationRequest, GenerationResult};
use simplellm_core::process::{LaunchError, PullError, ServiceLauncher};
use simplellm_core::service::{ModelService, ServiceError};

use crate::cli::session::{Session, SessionEnd, SessionOptions, SessionState};
use crate::cli::shell::{LineReader, ShellInput};

/// Replays fixed lines, then reports an interrupt once they run out.
#[derive(Debug, Default)]
pub struct ScriptedInput {
    lines: VecDeque<String>,
    pub prompts: Vec<String>,
}

impl ScriptedInput {
    pub fn new(lines: &[&str]) -> Self {
        Self {
            lines: lines.iter().map(|s| s.to_string()).collect(),
            prompts: Vec::new(),
        }
    }
}

impl LineReader for ScriptedInput {
    fn read_line(&mut self, prompt: &str) -> Result<ShellInput> {
        self.prompts.push(prompt.to_string());
        Ok(match self.lines.pop_front() {
            Some(line) => ShellInput::Line(line),
            None => ShellInput::Interrupted,
        })
    }
}

/// In-memory service. Catalogs are served in order, the last one repeats.
#[derive(Debug, Default)]
pub struct FakeService {
    pub ready: Arc<AtomicBool>,
    catalogs: Mutex<VecDeque<Catalog>>,
    replies: Mutex<VecDeque<Result<GenerationResult, ServiceError>>>,
    pub probes: AtomicUsize,
    pub lists: AtomicUsize,
    pub requests: Mutex<Vec<GenerationRequest>>,
}

impl FakeService {
    /// A service that is not running yet.
    pub fn with_catalogs(catalogs: Vec<Catalog>) -> Self {
        Self {
            catalogs: Mutex::new(catalogs.into()),
            ..Default::default()
        }
    }

    pub fn ready_with(catalogs: Vec<Catalog>) -> Self {
        let service = Self::with_catalogs(catalogs);
        service.ready.store(true, Ordering::SeqCst);
        service
    }

    /// Queues the result of the next `generate` call.
    pub fn reply(&self, result: Result<GenerationResult, ServiceError>) {
        self.replies.lock().unwrap().push_back(result);
    }
}

#[async_trait]
impl ModelService for FakeService {
    async fn probe_ready(&self) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.ready.load(Ordering::SeqCst)
    }

    async fn list_models(&self) -> Catalog {
        self.lists.fetch_add(1, Ordering::SeqCst);
        let mut catalogs = self.catalogs.lock().unwrap();
        if catalogs.len() > 1 {
            catalogs.pop_front().unwrap_or_default()
        } else {
            catalogs.front().cloned().unwrap_or_default()
        }
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, ServiceError> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(GenerationResult {
                    text: format!("echo: {}", request.prompt),
                })
            })
    }
}

/// Launcher double. Starting can flip a service's readiness flag.
#[derive(Debug, Default)]
pub struct FakeLauncher {
    pub installed: bool,
    pub start_fails: bool,
    pub ready_on_start: Option<Arc<AtomicBool>>,
    pub pull_lines: Vec<String>,
    pub pull_succeeds: bool,
    pub starts: AtomicUsize,
    pub pulls: Mutex<Vec<String>>,
}

impl FakeLauncher {
    pub fn installed() -> Self {
        Self {
            installed: true,
            pull_succeeds: true,
            ..Default::default()
        }
    }

    pub fn not_installed() -> Self {
        Self::default()
    }

    /// Makes `start_background` bring `service` up.
    pub fn starting(mut self, service: &FakeService) -> Self {
        self.ready_on_start = Some(service.ready.clone());
        self
    }
}

#[async_trait]
impl ServiceLauncher for FakeLauncher {
    async fn is_installed(&self) -> bool {
        self.installed
    }

    async fn start_background(&self) -> Result<(), LaunchError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        if self.start_fails {
            return Err(LaunchError::NotFound {
                binary: "ollama".to_string(),
            });
        }
        if let Some(ready) = &self.ready_on_start {
            ready.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn pull_model(
        &self,
        name: &str,
        sink: &mut (dyn Write + Send),
    ) -> Result<(), PullError> {
        self.pulls.lock().unwrap().push(name.to_string());
        for line in &self.pull_lines {
            writeln!(sink, "   {line}").map_err(LaunchError::Io)?;
        }
        if self.pull_succeeds {
            Ok(())
        } else {
            Err(LaunchError::Io(std::io::Error::other("pull exited with status 1")).into())
        }
    }
}

/// Session options that never sleep.
pub fn fast_options() -> SessionOptions {
    SessionOptions {
        startup_wait: Duration::ZERO,
        startup_attempts: 1,
        generation: GenerationOptions::default(),
    }
}

/// Runs a full session against the doubles and returns how it ended plus
/// everything it printed.
pub async fn run_session(
    service: &dyn ModelService,
    launcher: &dyn ServiceLauncher,
    input: &mut ScriptedInput,
) -> (SessionEnd, String) {
    let mut out: Vec<u8> = Vec::new();
    let mut state = SessionState::default();
    let end = Session::new(service, launcher, input, &mut out, fast_options())
        .run(&mut state)
        .await
        .unwrap();
    (end, String::from_utf8(out).unwrap())
}
