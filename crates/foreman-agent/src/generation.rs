use foreman_core::{ForemanError, ForemanResult};
use serde::{Deserialize, Serialize};

/// A single generation call.
///
/// The prompt is passed to the provider verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Text sent to the model.
    pub prompt: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Upper bound on generated tokens.
    pub max_output_tokens: u32,
    /// Nucleus sampling cutoff.
    pub top_p: f32,
    /// Preferred model. Providers that serve a fixed local model ignore it.
    #[serde(default)]
    pub model: Option<String>,
}

impl GenerationRequest {
    /// Create a request with the default sampling profile
    /// (temperature 0.7, 1000 tokens, top-p 0.9).
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            temperature: 0.7,
            max_output_tokens: 1000,
            top_p: 0.9,
            model: None,
        }
    }
}

/// Outcome reported by a provider.
///
/// `success == true` carries `result`; otherwise `error` explains why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// Whether generation succeeded.
    pub success: bool,
    /// Generated text on success.
    #[serde(default)]
    pub result: Option<String>,
    /// Failure cause otherwise.
    #[serde(default)]
    pub error: Option<String>,
    /// Provider that produced the response.
    #[serde(default)]
    pub provider: Option<String>,
    /// Model that produced the response.
    #[serde(default)]
    pub model: Option<String>,
}

impl GenerationResponse {
    /// A successful response.
    pub fn ok(result: impl Into<String>) -> Self {
        Self {
            success: true,
            result: Some(result.into()),
            error: None,
            provider: None,
            model: None,
        }
    }

    /// A failed response.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
            provider: None,
            model: None,
        }
    }

    /// Tag with the provider and model that answered.
    pub fn with_source(mut self, provider: impl Into<String>, model: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self.model = Some(model.into());
        self
    }

    /// Collapse the response into the generated text, turning a non-success
    /// response into the same error a thrown failure would produce.
    pub fn into_text(self) -> ForemanResult<String> {
        if !self.success {
            return Err(ForemanError::Generation(
                self.error
                    .unwrap_or_else(|| "generation failed without a reason".to_string()),
            ));
        }
        self.result.ok_or_else(|| {
            ForemanError::Generation("successful response carried no result".to_string())
        })
    }
}
