use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub embedding: EmbeddingConfig,
    pub index: IndexConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_endpoint")]
    pub endpoint: String,
    pub model: String,
    /// Embedding vector dimensionality (D). Every stored vector has exactly
    /// this length.
    pub dims: usize,
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
    /// Maximum accepted input text length, in characters.
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
    #[serde(default = "default_embedding_api_key_env")]
    pub api_key_env: String,
}

fn default_embedding_endpoint() -> String {
    "https://api.openai.com/v1/embeddings".to_string()
}
fn default_embedding_timeout_secs() -> u64 {
    30
}
fn default_max_input_chars() -> usize {
    8192
}
fn default_embedding_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// Name of the single shared corpus index.
    pub shared: String,
    /// Prefix for per-caller private index names.
    #[serde(default = "default_private_prefix")]
    pub private_prefix: String,
}

fn default_private_prefix() -> String {
    "tenant-".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    /// Vector backend kind: `memory` or `rest`.
    #[serde(default = "default_backend_kind")]
    pub kind: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_backend_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub api_key_env: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: default_backend_kind(),
            base_url: None,
            timeout_secs: default_backend_timeout_secs(),
            api_key_env: None,
        }
    }
}

fn default_backend_kind() -> String {
    "memory".to_string()
}
fn default_backend_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            max_top_k: default_max_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_max_top_k() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt, for retryable failures only.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    200
}
fn default_max_delay_ms() -> u64 {
    5000
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AuthConfig {
    /// Bearer credential → caller id, for the token-map authenticator.
    #[serde(default)]
    pub tokens: BTreeMap<String, String>,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    if config.embedding.max_input_chars == 0 {
        anyhow::bail!("embedding.max_input_chars must be > 0");
    }
    if config.index.shared.trim().is_empty() {
        anyhow::bail!("index.shared must not be empty");
    }
    if config.retrieval.default_top_k < 1 {
        anyhow::bail!("retrieval.default_top_k must be >= 1");
    }
    if config.retrieval.max_top_k < config.retrieval.default_top_k {
        anyhow::bail!("retrieval.max_top_k must be >= retrieval.default_top_k");
    }
    if config.retry.base_delay_ms == 0 {
        anyhow::bail!("retry.base_delay_ms must be > 0");
    }

    match config.backend.kind.as_str() {
        "memory" => {}
        "rest" => {
            if config.backend.base_url.is_none() {
                anyhow::bail!("backend.base_url must be set when backend.kind is 'rest'");
            }
        }
        other => anyhow::bail!("Unknown backend kind: '{}'. Must be memory or rest.", other),
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[embedding]
model = "text-embedding-3-small"
dims = 1536

[index]
shared = "corpus"

[server]
bind = "127.0.0.1:8080"
"#;

    #[test]
    fn test_minimal_config_defaults() {
        let config = parse_config(MINIMAL).unwrap();
        assert_eq!(config.backend.kind, "memory");
        assert_eq!(config.retrieval.default_top_k, 5);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.index.private_prefix, "tenant-");
        assert_eq!(config.embedding.max_input_chars, 8192);
        assert!(config.auth.tokens.is_empty());
    }

    #[test]
    fn test_zero_dims_rejected() {
        let content = MINIMAL.replace("dims = 1536", "dims = 0");
        let err = parse_config(&content).unwrap_err();
        assert!(err.to_string().contains("dims"));
    }

    #[test]
    fn test_rest_backend_requires_base_url() {
        let content = format!("{MINIMAL}\n[backend]\nkind = \"rest\"\n");
        let err = parse_config(&content).unwrap_err();
        assert!(err.to_string().contains("base_url"));
    }

    #[test]
    fn test_unknown_backend_kind_rejected() {
        let content = format!("{MINIMAL}\n[backend]\nkind = \"etcd\"\n");
        let err = parse_config(&content).unwrap_err();
        assert!(err.to_string().contains("Unknown backend kind"));
    }

    #[test]
    fn test_max_top_k_must_cover_default() {
        let content = format!("{MINIMAL}\n[retrieval]\ndefault_top_k = 50\nmax_top_k = 10\n");
        let err = parse_config(&content).unwrap_err();
        assert!(err.to_string().contains("max_top_k"));
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.toml");
        std::fs::write(&path, MINIMAL).unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.embedding.dims, 1536);
        assert_eq!(config.server.bind, "127.0.0.1:8080");
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config(Path::new("/nonexistent/gateway.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_auth_tokens_parsed() {
        let content = format!("{MINIMAL}\n[auth.tokens]\n\"secret-1\" = \"alice@example.com\"\n");
        let config = parse_config(&content).unwrap();
        assert_eq!(
            config.auth.tokens.get("secret-1").map(String::as_str),
            Some("alice@example.com")
        );
    }
}
