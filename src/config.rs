use crate::error::ConfigurationError;
use crate::level::Level;
use crate::prompts::{PromptMode, DEFAULT_SUBJECT};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const GOOGLE_API_KEY_ENV: &str = "GOOGLE_API_KEY";
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const OPENWEATHER_API_KEY_ENV: &str = "OPENWEATHER_API_KEY";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model provider: "google" or "openai" (any OpenAI-compatible endpoint)
    pub provider: String,

    /// Model name; provider default when unset
    pub model: Option<String>,

    /// API base URL; provider default when unset
    pub base_url: Option<String>,

    pub temperature: f64,

    /// Cap on reply length; provider default when unset
    pub max_tokens: Option<u32>,

    pub request_timeout_secs: u64,

    /// Subject the tutor sticks to in multi-level mode
    pub subject: String,

    pub default_level: Level,

    pub default_mode: PromptMode,

    pub google_api_key: Option<String>,

    pub openai_api_key: Option<String>,

    pub openweather_api_key: Option<String>,

    /// File name used by `/export` when no path is given
    pub export_file: PathBuf,
}

/// Resolved model provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Google,
    OpenAi,
}

impl ProviderKind {
    pub fn api_key_env(&self) -> &'static str {
        match self {
            ProviderKind::Google => GOOGLE_API_KEY_ENV,
            ProviderKind::OpenAi => OPENAI_API_KEY_ENV,
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Google => "gemini-1.5-pro",
            ProviderKind::OpenAi => "gpt-4o-mini",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::Google => "https://generativelanguage.googleapis.com/v1beta",
            ProviderKind::OpenAi => "https://api.openai.com/v1",
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            provider: "google".to_string(),
            model: None,
            base_url: None,
            temperature: 0.7,
            max_tokens: None,
            request_timeout_secs: 60,
            subject: DEFAULT_SUBJECT.to_string(),
            default_level: Level::default(),
            default_mode: PromptMode::default(),
            google_api_key: None,
            openai_api_key: None,
            openweather_api_key: None,
            export_file: PathBuf::from("chat_history.txt"),
        }
    }
}

impl Config {
    /// Directory holding the config file (`~/.tutorchat`)
    pub fn home_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        Ok(home.join(".tutorchat"))
    }

    pub fn default_path() -> Result<PathBuf> {
        Ok(Self::home_dir()?.join("config.toml"))
    }

    /// Load configuration from the default location, falling back to defaults
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        Ok(Self::load_from(&path)?)
    }

    /// Load configuration from `path`; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self, ConfigurationError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path)?;
        let config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    pub fn provider_kind(&self) -> Result<ProviderKind, ConfigurationError> {
        match self.provider.to_lowercase().as_str() {
            "google" | "gemini" => Ok(ProviderKind::Google),
            "openai" | "openrouter" | "xai" | "mistral" => Ok(ProviderKind::OpenAi),
            _ => Err(ConfigurationError::UnknownProvider(self.provider.clone())),
        }
    }

    pub fn model_name(&self) -> Result<String, ConfigurationError> {
        let kind = self.provider_kind()?;
        Ok(self
            .model
            .clone()
            .unwrap_or_else(|| kind.default_model().to_string()))
    }

    pub fn api_base_url(&self) -> Result<String, ConfigurationError> {
        let kind = self.provider_kind()?;
        let url = self
            .base_url
            .clone()
            .unwrap_or_else(|| kind.default_base_url().to_string());
        Ok(url.trim_end_matches('/').to_string())
    }

    /// API key for the active model provider, from config or environment.
    ///
    /// Chat must not start without it.
    pub fn require_model_api_key(&self) -> Result<String, ConfigurationError> {
        self.require_model_api_key_with(|name| std::env::var(name).ok())
    }

    fn require_model_api_key_with(
        &self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<String, ConfigurationError> {
        let kind = self.provider_kind()?;
        let configured = match kind {
            ProviderKind::Google => &self.google_api_key,
            ProviderKind::OpenAi => &self.openai_api_key,
        };
        resolve_key(configured, kind.api_key_env(), env).ok_or_else(|| {
            ConfigurationError::MissingApiKey {
                provider: self.provider.clone(),
                env_var: kind.api_key_env(),
                config_hint: Self::default_path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|_| "config.toml".to_string()),
            }
        })
    }

    /// Weather key is optional; `None` disables the weather decorator.
    pub fn weather_api_key(&self) -> Option<String> {
        resolve_key(&self.openweather_api_key, OPENWEATHER_API_KEY_ENV, |name| {
            std::env::var(name).ok()
        })
    }
}

fn resolve_key(
    configured: &Option<String>,
    env_var: &str,
    env: impl Fn(&str) -> Option<String>,
) -> Option<String> {
    configured
        .clone()
        .or_else(|| env(env_var))
        .filter(|key| !key.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config.provider, "google");
        assert_eq!(config.model_name().unwrap(), "gemini-1.5-pro");
        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.default_level, Level::Beginner);
        assert_eq!(config.default_mode, PromptMode::MultiLevel);
    }

    #[test]
    fn partial_file_merges_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "provider = \"openai\"\nsubject = \"statistics\"\ndefault_level = \"advanced\"\ndefault_mode = \"single-level\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.provider_kind().unwrap(), ProviderKind::OpenAi);
        assert_eq!(config.model_name().unwrap(), "gpt-4o-mini");
        assert_eq!(config.subject, "statistics");
        assert_eq!(config.default_level, Level::Advanced);
        assert_eq!(config.default_mode, PromptMode::SingleLevel);
        assert_eq!(config.request_timeout_secs, 60);
    }

    #[test]
    fn save_then_load_keeps_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = Config {
            subject: "machine learning".to_string(),
            base_url: Some("http://localhost:8080/".to_string()),
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.subject, "machine learning");
        assert_eq!(loaded.api_base_url().unwrap(), "http://localhost:8080");
    }

    #[test]
    fn saved_defaults_keep_readable_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        Config::default().save_to(&path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("temperature = 0.7\n"), "{written}");
        assert!(!written.contains("max_tokens"));

        std::fs::write(&path, format!("{written}max_tokens = 512\n")).unwrap();
        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.temperature, 0.7);
        assert_eq!(loaded.max_tokens, Some(512));
    }

    #[test]
    fn invalid_toml_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "provider = [").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigurationError::Parse(_))
        ));
    }

    #[test]
    fn missing_model_key_is_fatal() {
        let config = Config::default();
        let err = config.require_model_api_key_with(|_| None).unwrap_err();
        assert!(matches!(err, ConfigurationError::MissingApiKey { .. }));
        assert!(err.to_string().contains(GOOGLE_API_KEY_ENV));
    }

    #[test]
    fn key_comes_from_config_then_environment() {
        let mut config = Config::default();
        let from_env = config
            .require_model_api_key_with(|name| (name == GOOGLE_API_KEY_ENV).then(|| "env-key".to_string()))
            .unwrap();
        assert_eq!(from_env, "env-key");

        config.google_api_key = Some("file-key".to_string());
        let from_file = config
            .require_model_api_key_with(|_| Some("env-key".to_string()))
            .unwrap();
        assert_eq!(from_file, "file-key");
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let config = Config {
            google_api_key: Some("   ".to_string()),
            ..Config::default()
        };
        assert!(config.require_model_api_key_with(|_| None).is_err());
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let config = Config {
            provider: "carrier-pigeon".to_string(),
            ..Config::default()
        };
        assert!(matches!(
            config.provider_kind(),
            Err(ConfigurationError::UnknownProvider(_))
        ));
    }
}
