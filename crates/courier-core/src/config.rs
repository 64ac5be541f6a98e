use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Default ingress queue capacity (messages buffered between the platform
/// listeners and the pipeline workers).
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;
/// Default cap on concurrently processed messages.
pub const DEFAULT_MAX_WORKERS: usize = 32;
/// Default outbound chunk limit for platforms with a message length ceiling.
pub const DEFAULT_CHUNK_LIMIT: usize = 2048;
/// Agent backend HTTP request timeout.
pub const AGENT_TIMEOUT_SECS: u64 = 120;

/// Top-level config (courier.toml + COURIER_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CourierConfig {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub agents: AgentsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// Chunk limit applied to platforms with a hard message length ceiling.
    /// Zero means the built-in default of 2048 characters.
    #[serde(default)]
    pub chunk_limit: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_workers: DEFAULT_MAX_WORKERS,
            chunk_limit: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AgentsConfig {
    pub dify: Option<DifyConfig>,
    pub coze: Option<CozeConfig>,
}

/// Dify backend: chat-messages endpoint with SSE streaming responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DifyConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    pub api_key: String,
    #[serde(default = "default_dify_base_url")]
    pub api_base: String,
    /// Overrides the per-session `user` field on requests when set.
    pub user_id: Option<String>,
}

/// Coze backend: v3/chat endpoint with batched SSE streaming responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CozeConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    pub api_key: String,
    #[serde(default = "default_coze_base_url")]
    pub api_base: String,
    pub bot_id: String,
    /// Overrides the per-session `user_id` field on requests when set.
    pub user_id: Option<String>,
}

fn bool_true() -> bool {
    true
}
fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}
fn default_max_workers() -> usize {
    DEFAULT_MAX_WORKERS
}
fn default_dify_base_url() -> String {
    "https://api.dify.ai/v1".to_string()
}
fn default_coze_base_url() -> String {
    "https://api.coze.cn".to_string()
}

impl CourierConfig {
    /// Load config from a TOML file with COURIER_* env var overrides
    /// (double underscore nests, e.g. COURIER_AGENTS__DIFY__API_KEY).
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ./courier.toml
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path.unwrap_or("courier.toml");

        let config: CourierConfig = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("COURIER_").split("__"))
            .extract()
            .map_err(|e| crate::error::CourierError::Config(e.to_string()))?;

        Ok(config)
    }
}
