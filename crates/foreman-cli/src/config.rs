use foreman_agent::{BackendConfig, BackendKind};
use foreman_core::{Archetype, ForemanError, ForemanResult};
use foreman_orchestrator::{AnalyzerConfig, ExecutorConfig, PoolConfig, ProfileOverride};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// Environment variable holding the key for OpenAI-compatible providers.
pub const API_KEY_ENV: &str = "FOREMAN_API_KEY";

/// Contents of `foreman.toml`. Every section is optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForemanConfig {
    /// Provider chain.
    #[serde(default)]
    pub backend: BackendConfig,
    /// Pool sizing and eviction.
    #[serde(default)]
    pub pool: PoolConfig,
    /// Concurrency and default priority.
    #[serde(default)]
    pub executor: ExecutorConfig,
    /// Decomposition settings.
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    /// Per-archetype generation overrides, keyed by archetype name.
    #[serde(default)]
    pub profiles: HashMap<String, ProfileOverride>,
    /// Where task and worker records are written.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

impl Default for ForemanConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            pool: PoolConfig::default(),
            executor: ExecutorConfig::default(),
            analyzer: AnalyzerConfig::default(),
            profiles: HashMap::new(),
            data_dir: default_data_dir(),
        }
    }
}

impl ForemanConfig {
    /// Read `path`; a missing file yields the defaults.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => Self::parse(&text).map_err(|e| {
                anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e)
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            )),
        }
    }

    /// Parse TOML text.
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Give `key` to every OpenAI-compatible provider that has none.
    pub fn apply_api_key(&mut self, key: Option<String>) {
        let Some(key) = key.filter(|k| !k.trim().is_empty()) else {
            return;
        };
        for provider in &mut self.backend.providers {
            if provider.kind == BackendKind::OpenAi && provider.api_key.is_none() {
                provider.api_key = Some(key.clone());
            }
        }
    }

    /// Reject configurations the pool or backend cannot run with.
    pub fn validate(&self) -> ForemanResult<()> {
        if self.backend.providers.is_empty() {
            return Err(ForemanError::Config(
                "at least one generation provider must be configured".to_string(),
            ));
        }
        if self.executor.max_concurrent_tasks == 0 {
            return Err(ForemanError::Config(
                "executor.max_concurrent_tasks must be at least 1".to_string(),
            ));
        }
        if self.pool.max_workers == 0 {
            return Err(ForemanError::Config(
                "pool.max_workers must be at least 1".to_string(),
            ));
        }
        let fraction = self.pool.eviction_fraction;
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(ForemanError::Config(format!(
                "pool.eviction_fraction must be in (0, 1], got {fraction}"
            )));
        }
        self.profile_overrides()?;
        Ok(())
    }

    /// The `[profiles.*]` tables keyed by parsed archetype.
    pub fn profile_overrides(&self) -> ForemanResult<HashMap<Archetype, ProfileOverride>> {
        self.profiles
            .iter()
            .map(|(name, o)| Ok((name.parse::<Archetype>()?, o.clone())))
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use foreman_core::Priority;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = ForemanConfig::parse("").unwrap();
        assert_eq!(config.pool.max_workers, 50);
        assert_eq!(config.pool.idle_timeout_secs, 1800);
        assert_eq!(config.executor.max_concurrent_tasks, 10);
        assert_eq!(config.analyzer.decomposition_timeout_secs, 10);
        assert_eq!(config.backend.timeout_secs, 60);
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_full_file() {
        let text = r#"
data_dir = "/var/lib/foreman"

[backend]
timeout_secs = 30

[[backend.providers]]
kind = "openai"
model = "gpt-4o-mini"

[[backend.providers]]
kind = "local"

[backend.retry_policy]
max_retries = 1

[pool]
max_workers = 5
eviction_fraction = 0.5

[executor]
max_concurrent_tasks = 2
default_priority = "high"

[analyzer]
use_backend_decomposition = true

[profiles.code_generator]
temperature = 0.1
max_tokens = 4000
"#;
        let config = ForemanConfig::parse(text).unwrap();
        assert_eq!(config.backend.providers.len(), 2);
        assert_eq!(config.backend.providers[0].kind, BackendKind::OpenAi);
        assert_eq!(config.backend.retry_policy.max_retries, 1);
        assert_eq!(config.backend.timeout_secs, 30);
        assert_eq!(config.pool.max_workers, 5);
        assert_eq!(config.pool.idle_timeout_secs, 1800);
        assert_eq!(config.executor.default_priority, Priority::High);
        assert!(config.analyzer.use_backend_decomposition);
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/foreman"));

        let overrides = config.profile_overrides().unwrap();
        let code = &overrides[&Archetype::CodeGenerator];
        assert_eq!(code.temperature, Some(0.1));
        assert_eq!(code.max_tokens, Some(4000));
        assert!(code.model.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_errors() {
        let mut config = ForemanConfig::default();
        config.backend.providers.clear();
        assert!(matches!(config.validate(), Err(ForemanError::Config(_))));

        let mut config = ForemanConfig::default();
        config.executor.max_concurrent_tasks = 0;
        assert!(config.validate().is_err());

        let mut config = ForemanConfig::default();
        config.pool.max_workers = 0;
        assert!(config.validate().is_err());

        for fraction in [0.0, -0.1, 1.5] {
            let mut config = ForemanConfig::default();
            config.pool.eviction_fraction = fraction;
            assert!(config.validate().is_err());
        }

        let mut config = ForemanConfig::default();
        config
            .profiles
            .insert("astrologer".to_string(), ProfileOverride::default());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_api_key_fills_only_missing_openai_keys() {
        let text = r#"
[[backend.providers]]
kind = "openai"

[[backend.providers]]
kind = "openai"
api_key = "sk-own"

[[backend.providers]]
kind = "ollama"
"#;
        let mut config = ForemanConfig::parse(text).unwrap();
        config.apply_api_key(Some("sk-env".to_string()));
        let keys: Vec<Option<&str>> = config
            .backend
            .providers
            .iter()
            .map(|p| p.api_key.as_deref())
            .collect();
        assert_eq!(keys, vec![Some("sk-env"), Some("sk-own"), None]);

        let mut config = ForemanConfig::parse(text).unwrap();
        config.apply_api_key(Some("  ".to_string()));
        assert!(config.backend.providers[0].api_key.is_none());
    }

    #[tokio::test]
    async fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ForemanConfig::load(&dir.path().join("absent.toml"))
            .await
            .unwrap();
        assert_eq!(config.pool.max_workers, 50);
    }

    #[tokio::test]
    async fn test_load_reports_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foreman.toml");
        tokio::fs::write(&path, "[pool]\nmax_workers = \"many\"\n")
            .await
            .unwrap();
        let err = ForemanConfig::load(&path).await.unwrap_err();
        assert!(err.to_string().contains("foreman.toml"));
    }
}
