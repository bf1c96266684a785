use crate::constants::{defaults, endpoints, providers};
use crate::error::ProviderError;
use crate::llm::ollama::OllamaClient;
use crate::llm::traits::Provider;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Identifies a specific LLM backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Ollama,
    OpenAI,
    Eino,
}

impl ProviderId {
    /// Parse a configuration tag, case-insensitively.
    pub fn parse(tag: &str) -> Result<Self, ProviderError> {
        match tag.trim().to_ascii_lowercase().as_str() {
            providers::OLLAMA => Ok(Self::Ollama),
            providers::OPENAI => Ok(Self::OpenAI),
            providers::EINO => Ok(Self::Eino),
            other => Err(ProviderError::Unsupported(other.to_string())),
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Ollama => providers::OLLAMA,
            Self::OpenAI => providers::OPENAI,
            Self::Eino => providers::EINO,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Ollama => "Ollama (Local)",
            Self::OpenAI => "OpenAI",
            Self::Eino => "Eino",
        }
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Everything needed to construct a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub kind: String,
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: providers::DEFAULT_PROVIDER.to_string(),
            base_url: endpoints::OLLAMA_BASE_URL.to_string(),
            timeout_seconds: defaults::TIMEOUT_SECONDS,
        }
    }
}

/// Build the provider named by `config.kind`.
pub fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let id = ProviderId::parse(&config.kind)?;
    match id {
        ProviderId::Ollama => {
            info!(base_url = %config.base_url, "Creating Ollama provider");
            let client = OllamaClient::new(
                config.base_url.clone(),
                Duration::from_secs(config.timeout_seconds),
            )?;
            Ok(Arc::new(client))
        }
        other => Err(ProviderError::Unsupported(format!(
            "{} is not implemented yet",
            other.name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(ProviderId::parse("Ollama").unwrap(), ProviderId::Ollama);
        assert_eq!(ProviderId::parse(" openai ").unwrap(), ProviderId::OpenAI);
        assert_eq!(ProviderId::parse("EINO").unwrap(), ProviderId::Eino);
    }

    #[test]
    fn test_parse_unknown() {
        assert!(matches!(
            ProviderId::parse("bard"),
            Err(ProviderError::Unsupported(_))
        ));
    }

    #[test]
    fn test_create_ollama() {
        let provider = create_provider(&ProviderConfig::default()).unwrap();
        assert_eq!(provider.name(), "ollama");
    }

    #[test]
    fn test_create_unimplemented() {
        for kind in ["openai", "eino", "mystery"] {
            let config = ProviderConfig {
                kind: kind.to_string(),
                ..ProviderConfig::default()
            };
            assert!(matches!(
                create_provider(&config),
                Err(ProviderError::Unsupported(_))
            ));
        }
    }
}
