//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Maximum number of lines retained per conversation
pub const DEFAULT_BUFFER_CAPACITY: usize = 500;

/// Window size used by `/sum` when no count is given
pub const DEFAULT_WINDOW: usize = 5;

/// Environment variables consulted for the backend API key, in order
pub const API_KEY_ENV_VARS: [&str; 2] = ["RECAP_OPENAI_API_KEY", "OPENAI_API_KEY"];

/// Environment variables consulted for the Telegram bot token, in order
pub const BOT_TOKEN_ENV_VARS: [&str; 2] = ["RECAP_TELEGRAM_TOKEN", "TELEGRAM_BOT_TOKEN"];

/// Recap configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub bot: BotConfig,
    pub buffer: BufferConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    #[serde(skip)]
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    pub max_tokens: usize,
    /// Per-request HTTP timeout
    pub timeout_secs: u64,
    /// Upper bound for a whole summarization, retries included
    pub summary_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    #[serde(skip)]
    pub token: Option<String>,
    pub polling_timeout_secs: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    pub capacity: usize,
    pub default_window: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Overrides the default `<config_dir>/recap/recap.db`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            temperature: None,
            max_tokens: 300,
            timeout_secs: 60,
            summary_timeout_secs: 90,
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: None,
            polling_timeout_secs: 30,
        }
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_BUFFER_CAPACITY,
            default_window: DEFAULT_WINDOW,
        }
    }
}

fn first_env(vars: &[&str]) -> Option<String> {
    vars.iter()
        .find_map(|name| env::var(name).ok())
        .filter(|value| !value.trim().is_empty())
}

fn redact(secret: &str) -> String {
    if secret.len() <= 4 {
        "***".to_string()
    } else {
        let suffix = &secret[secret.len() - 4..];
        format!("***{}", suffix)
    }
}

impl LlmConfig {
    pub fn resolved_api_key(&self) -> anyhow::Result<Option<String>> {
        self.enforce_env_only()?;
        Ok(first_env(&API_KEY_ENV_VARS))
    }

    pub fn redacted_api_key(&self) -> anyhow::Result<Option<String>> {
        self.resolved_api_key()
            .map(|opt| opt.map(|key| redact(&key)))
    }

    pub fn enforce_env_only(&self) -> anyhow::Result<()> {
        if self.api_key.is_some() {
            return Err(anyhow!(
                "LLM API keys must be provided via environment variables, not stored in configuration"
            ));
        }
        Ok(())
    }
}

impl BotConfig {
    pub fn resolved_token(&self) -> anyhow::Result<Option<String>> {
        if self.token.is_some() {
            return Err(anyhow!(
                "Bot tokens must be provided via environment variables, not stored in configuration"
            ));
        }
        Ok(first_env(&BOT_TOKEN_ENV_VARS))
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("RECAP_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("recap")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Path of the nickname database
    pub fn database_path(&self) -> anyhow::Result<PathBuf> {
        match &self.storage.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::config_dir()?.join("recap.db")),
        }
    }

    /// Load configuration from file, or use defaults if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to an explicit path
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        self.validate()?;

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).with_context(|| {
                format!("Failed to create config directory: {}", dir.display())
            })?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        self.llm.enforce_env_only()?;
        if self.bot.token.is_some() {
            return Err(anyhow!("Bot token cannot be stored in configuration"));
        }
        if self.buffer.capacity == 0 {
            return Err(anyhow!("buffer.capacity must be at least 1"));
        }
        if self.buffer.default_window == 0 {
            return Err(anyhow!("buffer.default_window must be at least 1"));
        }
        if self.llm.max_tokens == 0 {
            return Err(anyhow!("llm.max_tokens must be at least 1"));
        }
        Ok(())
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            "llm.model" => Ok(self.llm.model.clone()),
            "llm.base_url" => Ok(self.llm.base_url.clone()),
            "llm.temperature" => Ok(self
                .llm
                .temperature
                .map(|t| t.to_string())
                .unwrap_or_else(|| "(backend default)".to_string())),
            "llm.max_tokens" => Ok(self.llm.max_tokens.to_string()),
            "llm.timeout_secs" => Ok(self.llm.timeout_secs.to_string()),
            "llm.summary_timeout_secs" => Ok(self.llm.summary_timeout_secs.to_string()),

            "bot.polling_timeout_secs" => Ok(self.bot.polling_timeout_secs.to_string()),

            "buffer.capacity" => Ok(self.buffer.capacity.to_string()),
            "buffer.default_window" => Ok(self.buffer.default_window.to_string()),

            "storage.database_path" => Ok(self.database_path()?.display().to_string()),

            // Secrets (special handling - show redacted)
            "llm.api_key" | "api_key" => match self.llm.redacted_api_key()? {
                Some(redacted) => Ok(redacted),
                None => Ok("(not set - use RECAP_OPENAI_API_KEY or OPENAI_API_KEY env var)"
                    .to_string()),
            },
            "bot.token" => match self.bot.resolved_token()? {
                Some(token) => Ok(redact(&token)),
                None => Ok("(not set - use RECAP_TELEGRAM_TOKEN or TELEGRAM_BOT_TOKEN env var)"
                    .to_string()),
            },

            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `recap config list` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "llm.model" => {
                if value.trim().is_empty() {
                    return Err(anyhow!("Model identifier cannot be empty"));
                }
                self.llm.model = value.trim().to_string();
            }
            "llm.base_url" => {
                let url = value.trim().trim_end_matches('/');
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(anyhow!("Base URL must start with http:// or https://"));
                }
                self.llm.base_url = url.to_string();
            }
            "llm.temperature" => {
                if value.is_empty() || value.eq_ignore_ascii_case("none") {
                    self.llm.temperature = None;
                } else {
                    let temp: f32 = value
                        .parse()
                        .with_context(|| format!("Invalid temperature value: {}", value))?;
                    if !(0.0..=2.0).contains(&temp) {
                        return Err(anyhow!("Temperature must be between 0.0 and 2.0"));
                    }
                    self.llm.temperature = Some(temp);
                }
            }
            "llm.max_tokens" => {
                let tokens: usize = value
                    .parse()
                    .with_context(|| format!("Invalid max_tokens value: {}", value))?;
                if tokens == 0 {
                    return Err(anyhow!("max_tokens must be at least 1"));
                }
                self.llm.max_tokens = tokens;
            }
            "llm.timeout_secs" => {
                self.llm.timeout_secs = value
                    .parse()
                    .with_context(|| format!("Invalid timeout_secs value: {}", value))?;
            }
            "llm.summary_timeout_secs" => {
                self.llm.summary_timeout_secs = value
                    .parse()
                    .with_context(|| format!("Invalid summary_timeout_secs value: {}", value))?;
            }

            "bot.polling_timeout_secs" => {
                self.bot.polling_timeout_secs = value
                    .parse()
                    .with_context(|| format!("Invalid polling_timeout_secs value: {}", value))?;
            }

            "buffer.capacity" => {
                let capacity: usize = value
                    .parse()
                    .with_context(|| format!("Invalid capacity value: {}", value))?;
                if capacity == 0 {
                    return Err(anyhow!("Buffer capacity must be at least 1"));
                }
                self.buffer.capacity = capacity;
            }
            "buffer.default_window" => {
                let window: usize = value
                    .parse()
                    .with_context(|| format!("Invalid default_window value: {}", value))?;
                if window == 0 {
                    return Err(anyhow!("Default window must be at least 1"));
                }
                self.buffer.default_window = window;
            }

            "storage.database_path" => {
                self.storage.database_path = if value.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }

            "llm.api_key" | "api_key" | "bot.token" => {
                return Err(anyhow!(
                    "Secrets cannot be stored in configuration. \
                     Set OPENAI_API_KEY and TELEGRAM_BOT_TOKEN in the environment or a .env file instead."
                ));
            }

            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `recap config list` to see available keys.",
                    key
                ));
            }
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        let keys = [
            "llm.model",
            "llm.base_url",
            "llm.temperature",
            "llm.max_tokens",
            "llm.timeout_secs",
            "llm.summary_timeout_secs",
            "llm.api_key",
            "bot.polling_timeout_secs",
            "bot.token",
            "buffer.capacity",
            "buffer.default_window",
            "storage.database_path",
        ];

        keys.into_iter()
            .map(|key| {
                let value = self.get(key)?;
                Ok((key.to_string(), value))
            })
            .collect()
    }

    /// Reset configuration to defaults
    pub fn reset() -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.max_tokens, 300);
        assert_eq!(config.llm.temperature, None);
        assert_eq!(config.buffer.capacity, 500);
        assert_eq!(config.buffer.default_window, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_set_and_get() {
        let mut config = Config::default();
        config.set("llm.model", "gpt-4o").unwrap();
        config.set("llm.temperature", "0.4").unwrap();
        config.set("buffer.default_window", "10").unwrap();

        assert_eq!(config.get("llm.model").unwrap(), "gpt-4o");
        assert_eq!(config.get("llm.temperature").unwrap(), "0.4");
        assert_eq!(config.get("buffer.default_window").unwrap(), "10");

        config.set("llm.temperature", "none").unwrap();
        assert_eq!(config.llm.temperature, None);
    }

    #[test]
    fn test_set_rejects_invalid_values() {
        let mut config = Config::default();
        assert!(config.set("llm.temperature", "3.5").is_err());
        assert!(config.set("buffer.capacity", "0").is_err());
        assert!(config.set("buffer.default_window", "abc").is_err());
        assert!(config.set("llm.base_url", "ftp://example.com").is_err());
        assert!(config.set("no.such.key", "1").is_err());
    }

    #[test]
    fn test_secrets_cannot_be_set() {
        let mut config = Config::default();
        assert!(config.set("llm.api_key", "sk-123").is_err());
        assert!(config.set("bot.token", "123:abc").is_err());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let mut config = Config::default();
        config.set("llm.base_url", "http://localhost:8080/v1/").unwrap();
        assert_eq!(config.llm.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn test_validate_rejects_inline_secrets() {
        let mut config = Config::default();
        config.llm.api_key = Some("sk-inline".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.set("llm.model", "gpt-4.1-mini").unwrap();
        config.set("buffer.capacity", "200").unwrap();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.llm.model, "gpt-4.1-mini");
        assert_eq!(loaded.buffer.capacity, 200);
        assert_eq!(loaded.llm.temperature, None);
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.llm.model, "gpt-4o-mini");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[buffer]\ndefault_window = 8\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.buffer.default_window, 8);
        assert_eq!(config.buffer.capacity, DEFAULT_BUFFER_CAPACITY);
        assert_eq!(config.llm.max_tokens, 300);
    }

    #[test]
    fn test_redact() {
        assert_eq!(redact("abc"), "***");
        assert_eq!(redact("sk-abcdef1234"), "***1234");
    }
}
