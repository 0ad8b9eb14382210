use super::{BackendHealth, GenerationBackend};
use crate::config::ProviderConfig;
use crate::generation::{GenerationRequest, GenerationResponse};
use async_trait::async_trait;
use foreman_core::{ForemanError, ForemanResult};

/// OpenAI-compatible API backend.
///
/// Works with OpenAI, OpenRouter, Groq, and any other provider that
/// implements the OpenAI chat completions API. The prompt is sent as a single
/// user message.
pub struct OpenAiBackend {
    config: ProviderConfig,
    http: reqwest::Client,
}

impl OpenAiBackend {
    /// Build the HTTP client for a provider entry.
    pub fn new(config: ProviderConfig) -> ForemanResult<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ForemanError::Http(e.to_string()))?;
        Ok(Self { config, http })
    }

    fn build_body(&self, request: &GenerationRequest) -> serde_json::Value {
        let model = request.model.as_deref().unwrap_or(&self.config.model);
        serde_json::json!({
            "model": model,
            "max_tokens": request.max_output_tokens,
            "temperature": request.temperature,
            "top_p": request.top_p,
            "messages": [{
                "role": "user",
                "content": request.prompt,
            }],
        })
    }
}

#[async_trait]
impl GenerationBackend for OpenAiBackend {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(&self, request: &GenerationRequest) -> ForemanResult<GenerationResponse> {
        let Some(api_key) = self.config.api_key.as_deref() else {
            return Ok(GenerationResponse::failure("OpenAI provider has no API key"));
        };

        let url = format!("{}/v1/chat/completions", self.config.base_url());
        let body = self.build_body(request);

        let resp = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ForemanError::Http(e.to_string()))?;

        let status = resp.status();
        let resp_body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ForemanError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(ForemanError::Http(format!(
                "OpenAI API error {status}: {resp_body}"
            )));
        }

        let model = body["model"].as_str().unwrap_or(&self.config.model).to_string();
        Ok(parse_openai_response(&resp_body).with_source("openai", model))
    }

    async fn health(&self) -> Vec<BackendHealth> {
        if self.config.api_key.as_deref().is_some_and(|k| !k.is_empty()) {
            vec![BackendHealth::available("openai", &self.config.model)]
        } else {
            vec![BackendHealth::unavailable(
                "openai",
                &self.config.model,
                "no API key configured",
            )]
        }
    }
}

/// Extract the first choice's message text from a chat completions body.
pub fn parse_openai_response(body: &serde_json::Value) -> GenerationResponse {
    match body["choices"][0]["message"]["content"].as_str() {
        Some(content) => GenerationResponse::ok(content),
        None => GenerationResponse::failure(format!("response had no message content: {body}")),
    }
}
