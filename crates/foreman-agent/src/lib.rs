//! The generation capability used by Foreman workers.
//!
//! Natural-language generation is opaque to the rest of the system: a worker
//! sends a [`GenerationRequest`] and gets back a [`GenerationResponse`] that
//! either carries text or reports a failure. Everything behind that contract
//! lives here.
//!
//! # Main types
//!
//! - [`GenerationBackend`]: Trait every provider implements.
//! - [`OllamaBackend`], [`OpenAiBackend`], [`LocalBackend`]: Concrete providers.
//! - [`FailoverBackend`]: Tries providers in order with retry and backoff.
//! - [`BackendConfig`]: Serializable provider chain configuration.

/// Provider backends and the `GenerationBackend` trait.
pub mod backends;
/// Provider chain configuration.
pub mod config;
/// Ordered failover across backends with retries.
pub mod failover;
/// Request/response contract of the generation capability.
pub mod generation;

pub use backends::local::LocalBackend;
pub use backends::ollama::OllamaBackend;
pub use backends::openai::OpenAiBackend;
pub use backends::{BackendHealth, GenerationBackend};
pub use config::{BackendConfig, BackendKind, ProviderConfig};
pub use failover::{FailoverBackend, RetryPolicy};
pub use generation::{GenerationRequest, GenerationResponse};

use foreman_core::{ForemanError, ForemanResult};
use std::sync::Arc;
use tracing::info;

/// Build a single provider backend from its configuration.
pub fn create_provider(config: &ProviderConfig) -> ForemanResult<Box<dyn GenerationBackend>> {
    let backend: Box<dyn GenerationBackend> = match config.kind {
        BackendKind::Ollama => Box::new(OllamaBackend::new(config.clone())?),
        BackendKind::OpenAi => Box::new(OpenAiBackend::new(config.clone())?),
        BackendKind::Local => Box::new(LocalBackend::new()),
    };
    Ok(backend)
}

/// Build the full provider chain described by `config`.
///
/// A single provider is returned as-is; more than one is wrapped in a
/// [`FailoverBackend`] that tries them in the configured order.
pub fn create_backend(config: &BackendConfig) -> ForemanResult<Arc<dyn GenerationBackend>> {
    if config.providers.is_empty() {
        return Err(ForemanError::Config(
            "at least one generation provider must be configured".to_string(),
        ));
    }

    let mut backends = Vec::with_capacity(config.providers.len());
    for provider in &config.providers {
        info!(kind = %provider.kind, model = %provider.model, "Registering generation provider");
        backends.push(create_provider(provider)?);
    }

    if backends.len() == 1 {
        if let Some(only) = backends.pop() {
            return Ok(Arc::from(only));
        }
    }

    Ok(Arc::new(FailoverBackend::new(
        backends,
        config.retry_policy.clone(),
    )?))
}
