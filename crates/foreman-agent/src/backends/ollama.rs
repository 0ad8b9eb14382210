use super::{BackendHealth, GenerationBackend};
use crate::config::ProviderConfig;
use crate::generation::{GenerationRequest, GenerationResponse};
use async_trait::async_trait;
use foreman_core::{ForemanError, ForemanResult};
use tracing::warn;

/// Backend for a local Ollama daemon.
///
/// Always generates with the configured model; the request's model hint is
/// ignored because Ollama can only serve models that are pulled locally.
pub struct OllamaBackend {
    config: ProviderConfig,
    http: reqwest::Client,
}

impl OllamaBackend {
    /// Build the HTTP client for a provider entry.
    pub fn new(config: ProviderConfig) -> ForemanResult<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ForemanError::Http(e.to_string()))?;
        Ok(Self { config, http })
    }

    fn build_body(&self, request: &GenerationRequest) -> serde_json::Value {
        serde_json::json!({
            "model": self.config.model,
            "prompt": request.prompt,
            "stream": false,
            "options": {
                "temperature": request.temperature,
                "top_p": request.top_p,
                "num_predict": request.max_output_tokens,
            },
        })
    }

    async fn list_models(&self) -> ForemanResult<Vec<String>> {
        let url = format!("{}/api/tags", self.config.base_url());
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ForemanError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ForemanError::Http(format!("Ollama tags error {status}")));
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ForemanError::Http(e.to_string()))?;

        Ok(body["models"]
            .as_array()
            .map(|models| {
                models
                    .iter()
                    .filter_map(|m| m["name"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl GenerationBackend for OllamaBackend {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate(&self, request: &GenerationRequest) -> ForemanResult<GenerationResponse> {
        let url = format!("{}/api/generate", self.config.base_url());

        let resp = self
            .http
            .post(&url)
            .json(&self.build_body(request))
            .send()
            .await
            .map_err(|e| ForemanError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let error_body = resp
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(ForemanError::Http(format!(
                "Ollama API error {status}: {error_body}"
            )));
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ForemanError::Http(e.to_string()))?;

        let response = match body["response"].as_str() {
            Some(text) => GenerationResponse::ok(text),
            None => GenerationResponse::failure("Ollama response had no `response` field"),
        };
        Ok(response.with_source("ollama", &self.config.model))
    }

    async fn health(&self) -> Vec<BackendHealth> {
        match self.list_models().await {
            // Tags may be reported with or without the `:latest` suffix.
            Ok(models)
                if models.iter().any(|m| {
                    m == &self.config.model
                        || m.strip_suffix(":latest") == Some(self.config.model.as_str())
                }) =>
            {
                vec![BackendHealth::available("ollama", &self.config.model)]
            }
            Ok(_) => vec![BackendHealth::unavailable(
                "ollama",
                &self.config.model,
                "model not pulled",
            )],
            Err(e) => {
                warn!(error = %e, "Ollama health check failed");
                vec![BackendHealth::unavailable(
                    "ollama",
                    &self.config.model,
                    e.to_string(),
                )]
            }
        }
    }
}
