//! Test helpers shared by the simplellm-core unit tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::catalog::Catalog;
use crate::generation::{GenerationRequest, GenerationResult};
use crate::process::ProcessLauncher;
use crate::service::{ModelService, ServiceError};

/// A launcher that runs `script` through `sh -c`. The subcommand and its
/// arguments arrive as `$1`, `$2`, ...
pub fn sh_launcher(script: &str) -> ProcessLauncher {
    ProcessLauncher::new("sh").with_args(vec![
        "-c".to_string(),
        script.to_string(),
        "fake-ollama".to_string(),
    ])
}

/// A service that becomes ready on the n-th probe and counts every call.
#[derive(Debug, Default)]
pub struct CountingService {
    ready_on_probe: Option<usize>,
    pub probes: AtomicUsize,
    pub lists: AtomicUsize,
    pub generations: AtomicUsize,
}

impl CountingService {
    pub fn ready_after(probes: usize) -> Self {
        Self {
            ready_on_probe: Some(probes),
            ..Default::default()
        }
    }

    pub fn never_ready() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ModelService for CountingService {
    async fn probe_ready(&self) -> bool {
        let count = self.probes.fetch_add(1, Ordering::SeqCst) + 1;
        self.ready_on_probe.is_some_and(|n| count >= n)
    }

    async fn list_models(&self) -> Catalog {
        self.lists.fetch_add(1, Ordering::SeqCst);
        Catalog::default()
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, ServiceError> {
        self.generations.fetch_add(1, Ordering::SeqCst);
        Ok(GenerationResult {
            text: format!("echo: {}", request.prompt),
        })
    }
}
