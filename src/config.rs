use serde::{Deserialize, Serialize};
use std::path::Path;

const DEFAULT_POOL_MULTIPLIER: usize = 3;
const DEFAULT_PARSE_TIMEOUT_SECS: u64 = 10;
const DEFAULT_EMBED_TIMEOUT_SECS: u64 = 10;
const DEFAULT_EXPLAIN_TIMEOUT_SECS: u64 = 15;

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_CHAT_MODEL: &str = "llama3.1";
const DEFAULT_EMBED_MODEL: &str = "nomic-embed-text";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

const DEFAULT_LISTEN: &str = "0.0.0.0:8080";

/// Tunables for the matching pipeline. Ranking weights are deliberately not
/// here: they are build-time policy constants in `pipeline::rank`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Candidate pool size as a multiple of the requested page size.
    #[serde(default = "default_pool_multiplier")]
    pub pool_multiplier: usize,

    /// Timeout for the intent extraction call; on expiry the request
    /// continues with the fallback intent.
    #[serde(default = "default_parse_timeout_secs")]
    pub parse_timeout_secs: u64,

    /// Timeout for the embedding call; on expiry the request continues
    /// without a vector.
    #[serde(default = "default_embed_timeout_secs")]
    pub embed_timeout_secs: u64,

    /// Per-candidate timeout for explanation writing; on expiry that
    /// candidate gets the template explanation.
    #[serde(default = "default_explain_timeout_secs")]
    pub explain_timeout_secs: u64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            pool_multiplier: DEFAULT_POOL_MULTIPLIER,
            parse_timeout_secs: DEFAULT_PARSE_TIMEOUT_SECS,
            embed_timeout_secs: DEFAULT_EMBED_TIMEOUT_SECS,
            explain_timeout_secs: DEFAULT_EXPLAIN_TIMEOUT_SECS,
        }
    }
}

fn default_pool_multiplier() -> usize {
    DEFAULT_POOL_MULTIPLIER
}

fn default_parse_timeout_secs() -> u64 {
    DEFAULT_PARSE_TIMEOUT_SECS
}

fn default_embed_timeout_secs() -> u64 {
    DEFAULT_EMBED_TIMEOUT_SECS
}

fn default_explain_timeout_secs() -> u64 {
    DEFAULT_EXPLAIN_TIMEOUT_SECS
}

/// Model endpoint configuration (any OpenAI-compatible server).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token; omit for local servers.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    #[serde(default = "default_embed_model")]
    pub embed_model: String,

    /// Transport-level timeout for a single model request.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_chat_model() -> String {
    DEFAULT_CHAT_MODEL.to_string()
}

fn default_embed_model() -> String {
    DEFAULT_EMBED_MODEL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub matching: MatchingConfig,

    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default = "default_listen")]
    pub listen: String,

    /// JSON file with candidate profiles for the in-memory store.
    #[serde(default)]
    pub profiles_path: Option<String>,

    /// JSON file with per-user learned preference weights.
    #[serde(default)]
    pub preferences_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            matching: MatchingConfig::default(),
            model: ModelConfig::default(),
            listen: default_listen(),
            profiles_path: None,
            preferences_path: None,
        }
    }
}

fn default_listen() -> String {
    DEFAULT_LISTEN.to_string()
}

impl Config {
    fn validate(&self) {
        if self.matching.pool_multiplier < DEFAULT_POOL_MULTIPLIER {
            panic!(
                "matching.pool_multiplier must be at least {}, got {}",
                DEFAULT_POOL_MULTIPLIER, self.matching.pool_multiplier
            );
        }
        if self.matching.parse_timeout_secs == 0
            || self.matching.embed_timeout_secs == 0
            || self.matching.explain_timeout_secs == 0
        {
            panic!("matching stage timeouts must be greater than 0");
        }
        if self.model.request_timeout_secs == 0 {
            panic!("model.request_timeout_secs must be greater than 0");
        }
        if self.model.base_url.trim().is_empty() {
            panic!("model.base_url must not be empty");
        }
    }

    /// Load the YAML config, creating a default one when missing.
    pub fn load_with(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            std::fs::write(path, serde_yml::to_string(&Self::default())?)?;
        }

        let raw = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yml::from_str(&raw)?;
        if config.listen.trim().is_empty() {
            config.listen = default_listen();
        }
        config.validate();
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate();
        assert_eq!(config.matching.pool_multiplier, 3);
    }

    #[test]
    #[should_panic(expected = "pool_multiplier")]
    fn test_pool_multiplier_below_three_rejected() {
        let mut config = Config::default();
        config.matching.pool_multiplier = 2;
        config.validate();
    }

    #[test]
    #[should_panic(expected = "timeouts")]
    fn test_zero_timeout_rejected() {
        let mut config = Config::default();
        config.matching.parse_timeout_secs = 0;
        config.validate();
    }

    #[test]
    fn test_load_creates_default_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.yaml");

        let config = Config::load_with(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.matching.pool_multiplier, 3);

        // reload parses what was written
        let reloaded = Config::load_with(&path).unwrap();
        assert_eq!(reloaded.listen, config.listen);
    }
}
