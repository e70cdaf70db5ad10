use serde::{Deserialize, Serialize};

/// Placeholder used when the service answers without a `response` field.
pub const NO_RESPONSE: &str = "No response";

/// Sampling options sent with every generation turn.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct GenerationOptions {
    pub temperature: f32,
    #[serde(rename = "num_predict")]
    pub max_tokens: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 2048,
        }
    }
}

/// One prompt for one model. Serializes to the body of `POST /api/generate`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
    #[serde(rename = "stream")]
    pub streaming: bool,
    pub options: GenerationOptions,
}

impl GenerationRequest {
    /// A non-streaming request with the given options.
    pub fn new(model: &str, prompt: &str, options: GenerationOptions) -> Self {
        Self {
            model: model.to_string(),
            prompt: prompt.to_string(),
            streaming: false,
            options,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResult {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GenerateResponse {
    #[serde(default)]
    pub response: Option<String>,
}

impl From<GenerateResponse> for GenerationResult {
    fn from(value: GenerateResponse) -> Self {
        Self {
            text: value.response.unwrap_or_else(|| NO_RESPONSE.to_string()),
        }
    }
}
