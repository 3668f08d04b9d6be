use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use anyhow::Result;

use crate::sections::submittals::CategoryOrder;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Target chunk size in characters.
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { chunk_size: 1000, chunk_overlap: 200, top_k: 5 }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct PollConfig {
    pub interval_ms: u64,
    pub max_attempts: usize,
    pub timeout_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self { interval_ms: 500, max_attempts: 240, timeout_secs: 120 }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
    /// Pre-built knowledge-base assistant used by `chat`.
    pub assistant_id: Option<String>,
    /// Default for `extract --category-order`.
    pub category_order: CategoryOrder,
    pub retrieval: RetrievalConfig,
    pub poll: PollConfig,
    /// Never written to disk; comes from the environment.
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            assistant_id: None,
            category_order: CategoryOrder::default(),
            retrieval: RetrievalConfig::default(),
            poll: PollConfig::default(),
            api_key: None,
        }
    }
}

impl Config {
    /// Get the application data directory
    pub fn get_app_data_dir() -> PathBuf {
        let mut path = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("submittals");

        if !path.exists() {
            let _ = std::fs::create_dir_all(&path);
        }
        path
    }

    fn config_path() -> PathBuf {
        Self::get_app_data_dir().join("config.json")
    }

    /// Load the config file (or defaults), then apply environment overrides.
    /// Call once at startup, after `.env` has been loaded.
    pub fn load() -> Config {
        let path = Self::config_path();
        let mut config = if path.exists() {
            match std::fs::read_to_string(&path).map(|c| serde_json::from_str::<Config>(&c)) {
                Ok(Ok(config)) => config,
                Ok(Err(e)) => {
                    tracing::warn!("Ignoring malformed config {:?}: {}", path, e);
                    Config::default()
                }
                Err(e) => {
                    tracing::warn!("Could not read config {:?}: {}", path, e);
                    Config::default()
                }
            }
        } else {
            Config::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(key) = var("OPENAI_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.api_key = Some(key);
        }
        if let Some(url) = var("OPENAI_BASE_URL").filter(|u| !u.trim().is_empty()) {
            self.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(id) = var("SUBMITTALS_ASSISTANT_ID").filter(|i| !i.trim().is_empty()) {
            self.assistant_id = Some(id);
        }
    }

    pub fn save(&self) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(Self::config_path(), contents)?;
        Ok(())
    }

    pub fn require_api_key(&self) -> Result<String> {
        match &self.api_key {
            Some(key) => Ok(key.clone()),
            None => anyhow::bail!("OPENAI_API_KEY is not set (environment or .env)"),
        }
    }

    pub fn save_assistant_id(id: &str) -> Result<()> {
        let mut config = Config::load();
        config.assistant_id = Some(id.to_string());
        config.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn partial_file_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"chat_model":"gpt-4o","category_order":"document","poll":{"interval_ms":250}}"#)
                .unwrap();
        assert_eq!(config.chat_model, "gpt-4o");
        assert_eq!(config.category_order, CategoryOrder::Document);
        assert_eq!(config.poll.interval_ms, 250);
        assert_eq!(config.poll.max_attempts, 240);
        assert_eq!(config.retrieval, RetrievalConfig::default());
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn env_overrides_file_values() {
        let env: HashMap<&str, &str> = [
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_BASE_URL", "http://localhost:1234/v1/"),
            ("SUBMITTALS_ASSISTANT_ID", ""),
        ]
        .into();
        let mut config = Config { assistant_id: Some("asst_file".into()), ..Default::default() };
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.base_url, "http://localhost:1234/v1");
        assert_eq!(config.assistant_id.as_deref(), Some("asst_file"));
    }

    #[test]
    fn api_key_is_never_serialized() {
        let config = Config { api_key: Some("sk-secret".into()), ..Default::default() };
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("sk-secret"));
        assert!(config.require_api_key().is_ok());
        assert!(Config::default().require_api_key().is_err());
    }
}
