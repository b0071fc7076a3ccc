use anyhow::{Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::error::ConfigError;
use crate::verdicts::Language;

// ── Top-level config ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to config.toml - computed from home, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,
    /// Data directory (SQLite store) - computed from home, not serialized
    #[serde(skip)]
    pub data_dir: PathBuf,

    /// Reply locale when the request does not pick one.
    #[serde(default)]
    pub default_language: Language,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub privacy: PrivacyConfig,
}

// ── LLM backend ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// API key; falls back to TIEKOU_API_KEY / OPENAI_API_KEY / LLM_API_KEY.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Any OpenAI-compatible endpoint (hosted API, OpenRouter, local Ollama).
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Per-request timeout; an overrun counts as a provider failure.
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}

fn default_model() -> String {
    "gpt-4o-mini".into()
}

fn default_llm_timeout_secs() -> u64 {
    30
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

// ── Gateway ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_host")]
    pub host: String,
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    /// Allowed CORS origins; empty means allow any (development).
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_gateway_host() -> String {
    "127.0.0.1".into()
}

fn default_gateway_port() -> u16 {
    8000
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
            cors_origins: Vec::new(),
        }
    }
}

// ── Privacy ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivacyConfig {
    /// Salt mixed into IP hashes before storage.
    #[serde(default = "default_ip_salt")]
    pub ip_salt: String,
}

fn default_ip_salt() -> String {
    "tiekou_salt_v1".into()
}

impl Default for PrivacyConfig {
    fn default() -> Self {
        Self {
            ip_salt: default_ip_salt(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: PathBuf::new(),
            data_dir: PathBuf::new(),
            default_language: Language::default(),
            llm: LlmConfig::default(),
            gateway: GatewayConfig::default(),
            privacy: PrivacyConfig::default(),
        }
    }
}

impl Config {
    pub fn load_or_init() -> Result<Self> {
        let home = UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .context("Could not find home directory")?;
        let tiekou_dir = home.join(".tiekou");
        let config_path = tiekou_dir.join("config.toml");
        let data_dir = tiekou_dir.join("data");

        if !tiekou_dir.exists() {
            fs::create_dir_all(&tiekou_dir).context("Failed to create .tiekou directory")?;
        }
        fs::create_dir_all(&data_dir).context("Failed to create data directory")?;

        let mut config = if config_path.exists() {
            let contents =
                fs::read_to_string(&config_path).context("Failed to read config file")?;
            let mut config: Config =
                toml::from_str(&contents).context("Failed to parse config file")?;
            config.config_path.clone_from(&config_path);
            config.data_dir.clone_from(&data_dir);
            config
        } else {
            let config = Self {
                config_path: config_path.clone(),
                data_dir: data_dir.clone(),
                ..Self::default()
            };
            config.save()?;
            config
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to config.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("TIEKOU_API_KEY") {
            if !key.is_empty() {
                self.llm.api_key = Some(key);
            }
        }

        if let Ok(base_url) = std::env::var("TIEKOU_BASE_URL") {
            if !base_url.is_empty() {
                self.llm.base_url = base_url;
            }
        }

        if let Ok(model) = std::env::var("TIEKOU_MODEL") {
            if !model.is_empty() {
                self.llm.model = model;
            }
        }

        if let Ok(host) = std::env::var("TIEKOU_HOST").or_else(|_| std::env::var("HOST")) {
            if !host.is_empty() {
                self.gateway.host = host;
            }
        }

        if let Ok(port_str) = std::env::var("TIEKOU_PORT").or_else(|_| std::env::var("PORT")) {
            if let Ok(port) = port_str.parse::<u16>() {
                self.gateway.port = port;
            }
        }

        if let Ok(salt) = std::env::var("TIEKOU_IP_SALT") {
            if !salt.is_empty() {
                self.privacy.ip_salt = salt;
            }
        }
    }

    /// Reject a config that cannot serve: the LLM section must name a model.
    /// A missing API key is allowed (local endpoints, degraded mode).
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::Validation("llm.model must not be empty".into()));
        }
        if self.llm.base_url.trim().is_empty() {
            return Err(ConfigError::Validation(
                "llm.base_url must not be empty".into(),
            ));
        }
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&self.config_path, toml_str).context("Failed to write config file")?;
        Ok(())
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("tiekou.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let c = Config::default();
        assert_eq!(c.default_language, Language::Zh);
        assert_eq!(c.gateway.port, 8000);
        assert_eq!(c.llm.timeout_secs, 30);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn empty_model_fails_validation() {
        let mut c = Config::default();
        c.llm.model = "  ".into();
        assert!(c.validate().is_err());
    }

    #[test]
    fn toml_round_trip_preserves_llm_section() {
        let mut c = Config::default();
        c.llm.base_url = "http://localhost:11434/v1".into();
        c.llm.model = "qwen2.5".into();

        let toml_str = toml::to_string_pretty(&c).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.llm.base_url, c.llm.base_url);
        assert_eq!(parsed.llm.model, c.llm.model);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let parsed: Config = toml::from_str("[llm]\nmodel = \"gpt-4o\"\n").unwrap();
        assert_eq!(parsed.llm.model, "gpt-4o");
        assert_eq!(parsed.llm.base_url, default_base_url());
        assert_eq!(parsed.gateway.host, "127.0.0.1");
    }
}
