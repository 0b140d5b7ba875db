//! Application configuration
//!
//! [`AppConfig`] comes from an optional TOML file with every field
//! defaulted, then `FLYAGENT_*` environment variables override individual
//! values. Secrets (API keys, Amadeus credentials) are never read from the
//! file; the provider and search constructors take them from the
//! environment.

use crate::agent::{AgentConfig, LogLevel};
use crate::error::{AgentError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

pub const CONFIG_PATH_VAR: &str = "FLYAGENT_CONFIG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmBackend {
    #[default]
    OpenAI,
    Anthropic,
}

impl FromStr for LlmBackend {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(LlmBackend::OpenAI),
            "anthropic" | "claude" => Ok(LlmBackend::Anthropic),
            other => Err(AgentError::Configuration(format!(
                "unknown LLM provider '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: LlmBackend,
    /// Provider default when unset
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchBackend {
    /// Built-in deterministic offers, no network
    #[default]
    Static,
    Amadeus,
}

impl FromStr for SearchBackend {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "static" | "offline" => Ok(SearchBackend::Static),
            "amadeus" => Ok(SearchBackend::Amadeus),
            other => Err(AgentError::Configuration(format!(
                "unknown search backend '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub backend: SearchBackend,
    pub max_results: u32,
    pub currency: String,
    pub non_stop: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            backend: SearchBackend::default(),
            max_results: 5,
            currency: "VND".to_string(),
            non_stop: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub redis_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub log_level: LogLevel,
    pub agent: AgentConfig,
    pub llm: LlmConfig,
    pub search: SearchConfig,
    pub server: ServerConfig,
    pub storage: StorageConfig,
}

impl AppConfig {
    /// Load from `path` (or `$FLYAGENT_CONFIG`) and apply environment overrides
    ///
    /// Without a file the defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let from_env = std::env::var_os(CONFIG_PATH_VAR).map(PathBuf::from);
        let path = path.map(Path::to_path_buf).or(from_env);

        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AgentError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        let config = Self::from_toml(&raw).map_err(|e| match e {
            AgentError::Configuration(msg) => {
                AgentError::Configuration(format!("{}: {msg}", path.display()))
            }
            other => other,
        })?;
        debug!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| AgentError::Configuration(format!("parse error: {e}")))
    }

    /// Apply `FLYAGENT_*` overrides read through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(level) = get("FLYAGENT_LOG_LEVEL") {
            self.log_level = level.parse()?;
        }
        if let Some(bind) = get("FLYAGENT_BIND") {
            self.server.bind = bind;
        }
        if let Some(provider) = get("FLYAGENT_LLM_PROVIDER") {
            self.llm.provider = provider.parse()?;
        }
        if let Some(model) = get("FLYAGENT_LLM_MODEL") {
            self.llm.model = Some(model);
        }
        if let Some(backend) = get("FLYAGENT_SEARCH_BACKEND") {
            self.search.backend = backend.parse()?;
        }
        if let Some(url) = get("FLYAGENT_REDIS_URL") {
            self.storage.backend = StorageBackend::Redis;
            self.storage.redis_url = Some(url);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.search.max_results, 5);
        assert_eq!(config.search.currency, "VND");
        assert_eq!(config.server.bind, "127.0.0.1:8000");
    }

    #[test]
    fn test_partial_file() {
        let config = AppConfig::from_toml(
            r#"
            log_level = "debug"

            [agent]
            tool_timeout = 10

            [llm]
            provider = "anthropic"
            model = "claude-3-5-haiku-20241022"

            [search]
            backend = "amadeus"
            non_stop = true
            "#,
        )
        .unwrap();

        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.agent.tool_timeout, Duration::from_secs(10));
        assert_eq!(config.agent.max_steps_per_turn, 8);
        assert_eq!(config.llm.provider, LlmBackend::Anthropic);
        assert_eq!(config.search.backend, SearchBackend::Amadeus);
        assert!(config.search.non_stop);
        assert_eq!(config.search.max_results, 5);
    }

    #[test]
    fn test_invalid_toml_is_a_configuration_error() {
        let err = AppConfig::from_toml("log_level = [").unwrap_err();
        assert!(matches!(err, AgentError::Configuration(_)));
    }

    #[test]
    fn test_environment_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("FLYAGENT_LOG_LEVEL", "warn"),
            ("FLYAGENT_BIND", "0.0.0.0:9000"),
            ("FLYAGENT_LLM_PROVIDER", "claude"),
            ("FLYAGENT_SEARCH_BACKEND", "amadeus"),
            ("FLYAGENT_REDIS_URL", "redis://cache:6379"),
            ("FLYAGENT_LLM_MODEL", "  "),
        ]);
        let mut config = AppConfig::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.log_level, LogLevel::Warn);
        assert_eq!(config.server.bind, "0.0.0.0:9000");
        assert_eq!(config.llm.provider, LlmBackend::Anthropic);
        assert_eq!(config.llm.model, None, "blank values are ignored");
        assert_eq!(config.search.backend, SearchBackend::Amadeus);
        assert_eq!(config.storage.backend, StorageBackend::Redis);
    }

    #[test]
    fn test_bad_override_is_rejected() {
        let mut config = AppConfig::default();
        let err = config
            .apply_overrides(|key| (key == "FLYAGENT_LLM_PROVIDER").then(|| "gemini".to_string()))
            .unwrap_err();
        assert!(matches!(err, AgentError::Configuration(_)));
    }
}
