use crate::failover::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Supported generation providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Local Ollama daemon (`/api/generate`).
    Ollama,
    /// Any OpenAI-compatible chat completions API.
    OpenAi,
    /// Built-in rule-based responder. Needs no network and is always available.
    Local,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Ollama => write!(f, "ollama"),
            BackendKind::OpenAi => write!(f, "openai"),
            BackendKind::Local => write!(f, "local"),
        }
    }
}

/// One entry of the provider chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Which backend to build.
    pub kind: BackendKind,
    /// Model name passed to the provider.
    #[serde(default = "default_model")]
    pub model: String,
    /// Endpoint override; see [`Self::base_url`] for the defaults.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Bearer token for OpenAI-compatible providers.
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_model() -> String {
    "llama2".to_string()
}

impl ProviderConfig {
    /// The always-available rule-based provider.
    pub fn local() -> Self {
        Self {
            kind: BackendKind::Local,
            model: "local-rule-based".to_string(),
            base_url: None,
            api_key: None,
        }
    }

    /// Configured endpoint without a trailing slash, or the kind's default.
    pub fn base_url(&self) -> &str {
        if let Some(url) = &self.base_url {
            url.trim_end_matches('/')
        } else {
            match self.kind {
                BackendKind::Ollama => "http://localhost:11434",
                BackendKind::OpenAi => "https://api.openai.com",
                BackendKind::Local => "local://rules",
            }
        }
    }
}

/// The ordered provider chain plus the policies shared by all providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Providers in the order they are tried.
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,
    /// Retries per provider before moving on.
    #[serde(default)]
    pub retry_policy: RetryPolicy,
    /// Hard timeout for one generation call, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_providers() -> Vec<ProviderConfig> {
    vec![
        ProviderConfig {
            kind: BackendKind::Ollama,
            model: default_model(),
            base_url: None,
            api_key: None,
        },
        ProviderConfig::local(),
    ]
}

fn default_timeout_secs() -> u64 {
    60
}

impl BackendConfig {
    /// `timeout_secs` as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            providers: default_providers(),
            retry_policy: RetryPolicy::default(),
            timeout_secs: default_timeout_secs(),
        }
    }
}
