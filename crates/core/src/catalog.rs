//! Models known to the service and how a user picks one of them.
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// A single model as reported by the service.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ModelDescriptor {
    pub name: String,
    #[serde(rename = "size", default, deserialize_with = "lenient_size")]
    pub size_bytes: u64,
}

impl ModelDescriptor {
    pub fn new(name: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            name: name.into(),
            size_bytes,
        }
    }

    /// Size in GB rounded to one decimal place.
    pub fn size_gb(&self) -> String {
        format!("{:.1}", self.size_bytes as f64 / BYTES_PER_GB)
    }
}

// Sizes that are missing, negative or not numbers count as zero.
fn lenient_size<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        _ => 0,
    })
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SelectionError {
    #[error("No model selected")]
    Empty,
    #[error("Invalid selection: {choice} is not between 1 and {len}")]
    OutOfRange { choice: String, len: usize },
    #[error("Invalid selection: {choice}. No models are available, enter a model name instead")]
    NoModels { choice: String },
}

/// Snapshot of the models available on the service, in the order the service
/// returned them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    models: Vec<ModelDescriptor>,
}

impl Catalog {
    pub fn new(models: Vec<ModelDescriptor>) -> Self {
        Self { models }
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn models(&self) -> &[ModelDescriptor] {
        &self.models
    }

    /// Numbered display lines, `<index>. <name> (<size> GB)` starting at 1.
    ///
    /// Returns `None` when there is nothing to show so callers can report
    /// "no models" instead of printing an empty list.
    pub fn render(&self) -> Option<Vec<String>> {
        if self.models.is_empty() {
            return None;
        }
        Some(
            self.models
                .iter()
                .enumerate()
                .map(|(i, m)| format!("{}. {} ({} GB)", i + 1, m.name, m.size_gb()))
                .collect(),
        )
    }

    /// Resolves user input to a model name.
    ///
    /// All-digit input picks by 1-based position and must be in range. Anything
    /// else is taken literally as a model name, even if it is not in the catalog.
    pub fn resolve_selection(&self, input: &str) -> Result<String, SelectionError> {
        let choice = input.trim();
        if choice.is_empty() {
            return Err(SelectionError::Empty);
        }

        if !choice.chars().all(|c| c.is_ascii_digit()) {
            return Ok(choice.to_string());
        }

        if self.models.is_empty() {
            return Err(SelectionError::NoModels {
                choice: choice.to_string(),
            });
        }

        let out_of_range = || SelectionError::OutOfRange {
            choice: choice.to_string(),
            len: self.models.len(),
        };
        // Overlong digit strings cannot index anything either.
        let index = choice.parse::<usize>().map_err(|_| out_of_range())?;
        if index == 0 || index > self.models.len() {
            return Err(out_of_range());
        }
        Ok(self.models[index - 1].name.clone())
    }
}
