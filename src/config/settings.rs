use anyhow::Result;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub llm: LlmConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Upper bound for a single generation call, retries included
    pub timeout_ms: u64,
    pub max_retries: u32,
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite file for conversations and messages (`:memory:` for a throwaway db)
    pub database_path: String,
    /// Session checkpoints are written here as JSON when set
    #[serde(default)]
    pub checkpoint_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config_env = env::var("CONFIG_ENV").unwrap_or_else(|_| "default".to_string());

        let config = Config::builder()
            .set_default("llm.base_url", "https://api.groq.com/openai/v1")?
            .set_default("llm.model", "meta-llama/llama-4-maverick-17b-128e-instruct")?
            .set_default("llm.max_tokens", 1024_i64)?
            .set_default("llm.temperature", 0.7)?
            .set_default("llm.timeout_ms", 60_000_i64)?
            .set_default("llm.max_retries", 0_i64)?
            .set_default("storage.database_path", "lingualand.db")?
            .set_default("logging.level", "info")?
            .add_source(File::with_name(&format!("config/{}", config_env)).required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    pub fn api_key() -> Result<String> {
        env::var("GROQ_API_KEY")
            .or_else(|_| env::var("LLM_API_KEY"))
            .map_err(|_| {
                anyhow::anyhow!("GROQ_API_KEY (or LLM_API_KEY) environment variable not set")
            })
    }
}
