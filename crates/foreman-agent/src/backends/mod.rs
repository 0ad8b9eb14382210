/// Rule-based responder.
pub mod local;
/// Ollama HTTP backend.
pub mod ollama;
/// OpenAI-compatible chat completions backend.
pub mod openai;

use crate::generation::{GenerationRequest, GenerationResponse};
use async_trait::async_trait;
use foreman_core::ForemanResult;
use serde::{Deserialize, Serialize};

/// Trait for generation provider backends.
///
/// Each provider (Ollama, OpenAI-compatible, local rules, failover chain)
/// implements this trait. Callers must treat `Ok` with `success == false`
/// exactly like `Err`.
///
/// To add a new provider:
/// 1. Create a new module in `backends/`
/// 2. Implement `GenerationBackend` for your struct
/// 3. Add the variant to `BackendKind` in `config.rs`
/// 4. Wire it up in `create_provider()` in `lib.rs`
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Short provider name used in logs and health reports.
    fn name(&self) -> &str;

    /// Run one generation request.
    async fn generate(&self, request: &GenerationRequest) -> ForemanResult<GenerationResponse>;

    /// Report whether the provider can currently serve requests.
    async fn health(&self) -> Vec<BackendHealth>;
}

/// Availability of one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendHealth {
    /// Provider name, e.g. `ollama`.
    pub provider: String,
    /// Model the provider is configured with.
    pub model: String,
    /// Whether the provider answered its health check.
    pub available: bool,
    /// Why the provider is unavailable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl BackendHealth {
    /// A provider that passed its check.
    pub fn available(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            available: true,
            detail: None,
        }
    }

    /// A provider that failed its check, with the reason.
    pub fn unavailable(
        provider: impl Into<String>,
        model: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            available: false,
            detail: Some(detail.into()),
        }
    }
}
