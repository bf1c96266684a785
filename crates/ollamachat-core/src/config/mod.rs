use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::chat::ControllerOptions;
use crate::constants::{defaults, endpoints, models, paths, providers};
use crate::error::{ChatError, Result};
use crate::llm::ProviderConfig;
use crate::session::SessionSettings;
use crate::storage::StorageConfig;
use crate::validation;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub app: AppSettings,
    pub llm: LlmSettings,
    pub chat: ChatSettings,
    pub storage: StorageSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub name: String,
    pub version: String,
    pub log_level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub provider: String,
    pub available_providers: Vec<String>,
    pub timeout_seconds: u64,
    pub max_tokens: u32,
    pub temperature: f64,
    pub ollama: OllamaSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaSettings {
    pub base_url: String,
    pub default_model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    pub max_context_messages: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub kind: String,
    /// `None` means the platform data directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_path: Option<PathBuf>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: defaults::APP_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            log_level: defaults::LOG_LEVEL.to_string(),
        }
    }
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: providers::DEFAULT_PROVIDER.to_string(),
            available_providers: vec![providers::OLLAMA.to_string()],
            timeout_seconds: defaults::TIMEOUT_SECONDS,
            max_tokens: defaults::MAX_TOKENS,
            temperature: defaults::TEMPERATURE,
            ollama: OllamaSettings::default(),
        }
    }
}

impl Default for OllamaSettings {
    fn default() -> Self {
        Self {
            base_url: endpoints::OLLAMA_BASE_URL.to_string(),
            default_model: models::DEFAULT_MODEL.to_string(),
        }
    }
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            max_context_messages: defaults::MAX_CONTEXT_MESSAGES,
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            kind: defaults::STORAGE_KIND.to_string(),
            base_path: None,
        }
    }
}

impl Settings {
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(paths::CONFIG_DIR)
            .join(paths::CONFIG_FILE)
    }

    /// Load from the default location, falling back to defaults when the file
    /// is missing or unreadable. Never writes.
    pub fn load() -> Self {
        let config_path = Self::config_path();
        if !config_path.exists() {
            return Self::default();
        }
        match Self::load_from(&config_path) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(path = %config_path.display(), error = %e, "Using default settings");
                Self::default()
            }
        }
    }

    /// Load from `path`, writing a default file first when none exists.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            let settings = Self::default();
            settings.save_to(path)?;
            info!(path = %path.display(), "Wrote default configuration");
            return Ok(settings);
        }

        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| ChatError::Config(format!("failed to parse {}: {e}", path.display())))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| ChatError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.app.name.trim().is_empty() {
            return Err(config_error("app.name cannot be empty"));
        }
        if self.app.version.trim().is_empty() {
            return Err(config_error("app.version cannot be empty"));
        }

        let provider = self.llm.provider.trim();
        if provider.is_empty() {
            return Err(config_error("llm.provider cannot be empty"));
        }
        if !providers::KNOWN.contains(&provider) {
            return Err(config_error(format!("unsupported provider: {provider}")));
        }
        if !self.llm.available_providers.iter().any(|p| p == provider) {
            return Err(config_error(format!(
                "current provider '{provider}' not found in available_providers"
            )));
        }
        if provider == providers::OLLAMA {
            if self.llm.ollama.base_url.trim().is_empty() {
                return Err(config_error("llm.ollama.base_url cannot be empty"));
            }
            if self.llm.ollama.default_model.trim().is_empty() {
                return Err(config_error("llm.ollama.default_model cannot be empty"));
            }
        }

        if self.llm.timeout_seconds == 0 {
            return Err(config_error("llm.timeout_seconds must be positive"));
        }
        if self.llm.max_tokens == 0 {
            return Err(config_error("llm.max_tokens must be positive"));
        }
        validation::check_float_in_range(
            self.llm.temperature,
            "llm.temperature",
            defaults::MIN_TEMPERATURE,
            defaults::MAX_TEMPERATURE,
        )
        .map_err(|e| config_error(e.to_string()))?;

        if self.storage.kind.trim().is_empty() {
            return Err(config_error("storage.kind cannot be empty"));
        }
        Ok(())
    }

    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            kind: self.llm.provider.clone(),
            base_url: self.llm.ollama.base_url.clone(),
            timeout_seconds: self.llm.timeout_seconds,
        }
    }

    pub fn storage_config(&self) -> StorageConfig {
        StorageConfig {
            kind: self.storage.kind.clone(),
            base_path: self
                .storage
                .base_path
                .clone()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(StorageConfig::default_base_path),
        }
    }

    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            default_model: self.llm.ollama.default_model.clone(),
            max_tokens: self.llm.max_tokens,
            session_defaults: SessionSettings {
                model: None,
                max_context_messages: self.chat.max_context_messages,
                temperature: self.llm.temperature,
            },
        }
    }
}

fn config_error(message: impl Into<String>) -> ChatError {
    ChatError::Config(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        settings.validate().unwrap();
        assert_eq!(settings.llm.provider, "ollama");
        assert_eq!(settings.llm.ollama.base_url, "http://localhost:11434");
        assert_eq!(settings.llm.ollama.default_model, "llama3.2:latest");
        assert_eq!(settings.llm.timeout_seconds, 30);
        assert_eq!(settings.llm.max_tokens, 2048);
        assert_eq!(settings.chat.max_context_messages, 10);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [llm]
            temperature = 1.1

            [llm.ollama]
            default_model = "mistral"
            "#,
        )
        .unwrap();
        assert_eq!(settings.llm.temperature, 1.1);
        assert_eq!(settings.llm.ollama.default_model, "mistral");
        assert_eq!(settings.llm.ollama.base_url, "http://localhost:11434");
        assert_eq!(settings.app.log_level, "info");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut settings = Settings::default();
        settings.llm.provider = "openai".to_string();
        assert!(matches!(settings.validate(), Err(ChatError::Config(_))));

        let mut settings = Settings::default();
        settings.llm.provider = "bard".to_string();
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.llm.temperature = 3.0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.llm.ollama.base_url.clear();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_controller_options_follow_settings() {
        let mut settings = Settings::default();
        settings.chat.max_context_messages = 4;
        settings.llm.temperature = 0.2;
        let options = settings.controller_options();
        assert_eq!(options.session_defaults.max_context_messages, 4);
        assert_eq!(options.session_defaults.temperature, 0.2);
        assert_eq!(options.default_model, "llama3.2:latest");
    }
}
