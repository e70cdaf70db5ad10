//! Starting and driving the service executable.
use std::io::{self, Write};
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio_stream::wrappers::LinesStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info, instrument, warn};

use crate::config::ServiceConfig;
use crate::service::ModelService;

#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("'{binary}' was not found. Is it installed and on PATH?")]
    NotFound { binary: String },
    #[error("Failed to start '{binary}': {source}")]
    Spawn {
        binary: String,
        #[source]
        source: io::Error,
    },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Error, Debug)]
pub enum PullError {
    #[error(transparent)]
    Launch(#[from] LaunchError),
    #[error("Download failed ({status}): {last_line}")]
    Failed { status: ExitStatus, last_line: String },
    #[error("Download failed ({status}) without any output")]
    NoOutput { status: ExitStatus },
}

/// Process-level operations on the service.
#[async_trait]
pub trait ServiceLauncher: Send + Sync {
    /// True if `<binary> --version` runs and exits successfully.
    async fn is_installed(&self) -> bool;

    /// Spawns `<binary> serve` detached and returns without waiting on it.
    async fn start_background(&self) -> Result<(), LaunchError>;

    /// Runs `<binary> pull <name>`, copying its output to `sink` line by line
    /// as it arrives.
    async fn pull_model(&self, name: &str, sink: &mut (dyn Write + Send))
    -> Result<(), PullError>;
}

type OutputLines = Pin<Box<dyn Stream<Item = io::Result<String>> + Send>>;

/// Output of a running `pull`. Lines from stdout and stderr are interleaved in
/// arrival order. The sequence is consumed once; [`PullOutput::finish`] then
/// waits for the process to exit.
pub struct PullOutput {
    child: Child,
    lines: OutputLines,
    last_line: Option<String>,
}

impl PullOutput {
    /// Next non-empty output line, or `None` once both pipes are closed.
    pub async fn next_line(&mut self) -> Option<String> {
        while let Some(item) = self.lines.next().await {
            match item {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    self.last_line = Some(line.to_string());
                    return Some(line.to_string());
                }
                Err(e) => {
                    // Progress bars can carry invalid UTF-8; skip the line.
                    debug!("Unreadable pull output: {e}");
                }
            }
        }
        None
    }

    /// Drains any unread output and waits for the exit status.
    pub async fn finish(mut self) -> Result<(), PullError> {
        while self.next_line().await.is_some() {}
        let status = self.child.wait().await.map_err(LaunchError::Io)?;
        if status.success() {
            return Ok(());
        }
        match self.last_line {
            Some(last_line) => Err(PullError::Failed { status, last_line }),
            None => Err(PullError::NoOutput { status }),
        }
    }
}

/// Runs the service executable, e.g. `ollama`.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    binary: String,
    base_args: Vec<String>,
}

impl ProcessLauncher {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            base_args: Vec::new(),
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(config.binary.clone()).with_args(config.binary_args.clone())
    }

    /// Arguments inserted before every subcommand.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.base_args = args;
        self
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(&self.base_args).args(args).stdin(Stdio::null());
        cmd
    }

    fn spawn_error(&self, source: io::Error) -> LaunchError {
        if source.kind() == io::ErrorKind::NotFound {
            LaunchError::NotFound {
                binary: self.binary.clone(),
            }
        } else {
            LaunchError::Spawn {
                binary: self.binary.clone(),
                source,
            }
        }
    }

    /// Starts `<binary> pull <name>` with both output pipes captured.
    pub fn spawn_pull(&self, name: &str) -> Result<PullOutput, LaunchError> {
        let mut child = self
            .command(&["pull", name])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("pull stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::other("pull stderr was not captured"))?;

        let lines = LinesStream::new(BufReader::new(stdout).lines())
            .merge(LinesStream::new(BufReader::new(stderr).lines()));

        Ok(PullOutput {
            child,
            lines: Box::pin(lines),
            last_line: None,
        })
    }
}

#[async_trait]
impl ServiceLauncher for ProcessLauncher {
    #[instrument(skip(self), fields(binary = %self.binary))]
    async fn is_installed(&self) -> bool {
        let status = self
            .command(&["--version"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        match status {
            Ok(status) => {
                debug!("Version check exited with {status}");
                status.success()
            }
            Err(e) => {
                debug!("Version check could not run: {e}");
                false
            }
        }
    }

    #[instrument(skip(self), fields(binary = %self.binary))]
    async fn start_background(&self) -> Result<(), LaunchError> {
        let mut cmd = self.command(&["serve"]);
        cmd.stdout(Stdio::null()).stderr(Stdio::null());

        // Keep terminal interrupts aimed at the chat away from the server.
        #[cfg(unix)]
        cmd.process_group(0);

        #[cfg(windows)]
        {
            const CREATE_NO_WINDOW: u32 = 0x08000000;
            const DETACHED_PROCESS: u32 = 0x00000008;
            cmd.creation_flags(CREATE_NO_WINDOW | DETACHED_PROCESS);
        }

        let child = cmd.spawn().map_err(|e| self.spawn_error(e))?;
        info!("Started service in background, pid {:?}", child.id());
        Ok(())
    }

    #[instrument(skip(self, sink), fields(binary = %self.binary))]
    async fn pull_model(
        &self,
        name: &str,
        sink: &mut (dyn Write + Send),
    ) -> Result<(), PullError> {
        let mut output = self.spawn_pull(name)?;
        while let Some(line) = output.next_line().await {
            writeln!(sink, "   {line}").map_err(LaunchError::Io)?;
            sink.flush().map_err(LaunchError::Io)?;
        }
        let result = output.finish().await;
        if let Err(e) = &result {
            warn!("Pull of '{name}' failed: {e}");
        }
        result
    }
}

/// Waits for the service after a background start.
///
/// Each attempt sleeps `wait` and then probes once. An `attempts` of zero is
/// treated as one, so the wait is always bounded and never skipped.
pub async fn wait_for_ready(service: &dyn ModelService, wait: Duration, attempts: u32) -> bool {
    for attempt in 1..=attempts.max(1) {
        tokio::time::sleep(wait).await;
        if service.probe_ready().await {
            debug!("Service ready after {attempt} attempt(s)");
            return true;
        }
        debug!("Service not ready after attempt {attempt}");
    }
    false
}
