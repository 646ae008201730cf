// src/config/chat.rs
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path};

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_base_url() -> String {
    "https://api.openai.com".to_string()
}
fn default_max_history() -> usize {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    pub enabled: bool,
    /// "openai" (case-insensitive); anything else leaves chat disabled
    pub provider: String,
    /// "ENV" means: read from OPENAI_API_KEY
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Prior turns forwarded to the provider (most recent kept).
    #[serde(default = "default_max_history")]
    pub max_history: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: "openai".to_string(),
            api_key: String::new(),
            model: default_model(),
            base_url: default_base_url(),
            max_history: default_max_history(),
        }
    }
}

impl ChatConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)?;
        let mut cfg: ChatConfig = serde_json::from_str(&data)?;

        cfg.provider = cfg.provider.trim().to_lowercase();
        cfg.base_url = cfg.base_url.trim_end_matches('/').to_string();

        // Only an enabled config needs a real key.
        if cfg.enabled && cfg.api_key.trim().eq_ignore_ascii_case("env") {
            cfg.api_key = match cfg.provider.as_str() {
                "openai" => env::var("OPENAI_API_KEY")
                    .map_err(|_| anyhow::anyhow!("Missing OPENAI_API_KEY env var"))?,
                other => anyhow::bail!("Unsupported provider in config: {other}"),
            };
        }
        Ok(cfg)
    }

    /// Missing file means chat is off; a broken file is still an error.
    pub fn load_or_disabled<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        if !path.as_ref().exists() {
            return Ok(Self::default());
        }
        Self::load_from_file(path)
    }
}
