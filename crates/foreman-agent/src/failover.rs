use crate::backends::{BackendHealth, GenerationBackend};
use crate::generation::{GenerationRequest, GenerationResponse};
use async_trait::async_trait;
use foreman_core::{ForemanError, ForemanResult};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Configures retry behaviour for failover across generation providers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of retries per provider before moving to the next one.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay in milliseconds for exponential backoff.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Maximum delay in milliseconds (cap for exponential backoff).
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_backoff_max_ms() -> u64 {
    30_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries; each provider gets exactly one attempt.
    pub fn no_retries() -> Self {
        Self {
            max_retries: 0,
            backoff_base_ms: 0,
            backoff_max_ms: 0,
        }
    }
}

/// Determines whether an error is transient and worth retrying.
///
/// Returns `true` for rate-limit (429), timeout, and server errors
/// (500, 502, 503, 504) as well as connection failures. Returns `false` for
/// client errors like 400 which are not expected to succeed on retry, and for
/// provider-reported generation failures.
pub fn is_retryable(err: &ForemanError) -> bool {
    match err {
        ForemanError::Timeout(_) => true,
        ForemanError::Http(msg) => {
            let lower = msg.to_lowercase();
            if lower.contains("400") {
                return false;
            }
            lower.contains("429")
                || lower.contains("timeout")
                || lower.contains("timed out")
                || lower.contains("connection")
                || lower.contains("500")
                || lower.contains("502")
                || lower.contains("503")
                || lower.contains("504")
        }
        _ => false,
    }
}

/// Exponential backoff for `attempt`, capped at `backoff_max_ms`.
pub fn compute_backoff(policy: &RetryPolicy, attempt: u32) -> u64 {
    let delay = policy
        .backoff_base_ms
        .saturating_mul(2u64.saturating_pow(attempt));
    delay.min(policy.backoff_max_ms)
}

/// A `GenerationBackend` that wraps several providers and fails over between
/// them in order.
///
/// Within one provider it retries up to `max_retries` times for transient
/// errors. A non-retryable error, or a response with `success == false`,
/// moves on to the next provider immediately. If every provider fails the
/// last error is returned.
pub struct FailoverBackend {
    backends: Vec<Box<dyn GenerationBackend>>,
    policy: RetryPolicy,
}

impl FailoverBackend {
    /// Create a chain. Fails on an empty list.
    pub fn new(
        backends: Vec<Box<dyn GenerationBackend>>,
        policy: RetryPolicy,
    ) -> ForemanResult<Self> {
        if backends.is_empty() {
            return Err(ForemanError::Config(
                "FailoverBackend requires at least one backend".to_string(),
            ));
        }
        Ok(Self { backends, policy })
    }

    /// Number of providers in the chain.
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Whether the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

#[async_trait]
impl GenerationBackend for FailoverBackend {
    fn name(&self) -> &str {
        "failover"
    }

    async fn generate(&self, request: &GenerationRequest) -> ForemanResult<GenerationResponse> {
        let mut last_err: Option<ForemanError> = None;

        for backend in &self.backends {
            for attempt in 0..=self.policy.max_retries {
                let err = match backend.generate(request).await {
                    Ok(resp) if resp.success => {
                        info!(provider = backend.name(), attempt, "Generation succeeded");
                        return Ok(resp);
                    }
                    Ok(resp) => ForemanError::Generation(
                        resp.error
                            .unwrap_or_else(|| "provider reported failure".to_string()),
                    ),
                    Err(e) => e,
                };

                if !is_retryable(&err) {
                    warn!(
                        provider = backend.name(),
                        attempt,
                        error = %err,
                        "Provider failed, moving to next provider"
                    );
                    last_err = Some(err);
                    break;
                }

                if attempt < self.policy.max_retries {
                    let delay = compute_backoff(&self.policy, attempt);
                    info!(
                        provider = backend.name(),
                        attempt,
                        delay_ms = delay,
                        error = %err,
                        "Retryable error, backing off"
                    );
                    tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
                }
                last_err = Some(err);
            }
        }

        Err(last_err.unwrap_or_else(|| {
            ForemanError::Generation("all generation providers exhausted".into())
        }))
    }

    async fn health(&self) -> Vec<BackendHealth> {
        let mut report = Vec::new();
        for backend in &self.backends {
            report.extend(backend.health().await);
        }
        report
    }
}
