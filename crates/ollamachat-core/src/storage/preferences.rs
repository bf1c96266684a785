use serde::{Deserialize, Serialize};

use crate::constants::{defaults, models, providers};

/// Application-wide preferences persisted next to the sessions.
///
/// Every field has a default so records written by older versions load cleanly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppPreferences {
    pub window_width: u32,
    pub window_height: u32,
    /// `light`, `dark` or `auto`.
    pub theme: String,
    pub font_size: u32,
    pub max_history_length: u32,

    pub default_model: String,
    pub default_provider: String,
    pub auto_save_history: bool,
    pub enable_markdown: bool,
    pub show_timestamps: bool,

    pub max_context_length: u32,
    pub enable_tool_calling: bool,
    pub enable_mcp_servers: bool,
    pub enable_agents: bool,
    pub log_level: String,
}

impl Default for AppPreferences {
    fn default() -> Self {
        Self {
            window_width: 600,
            window_height: 700,
            theme: "auto".to_string(),
            font_size: 12,
            max_history_length: 100,
            default_model: models::DEFAULT_MODEL.to_string(),
            default_provider: providers::DEFAULT_PROVIDER.to_string(),
            auto_save_history: true,
            enable_markdown: true,
            show_timestamps: false,
            max_context_length: defaults::MAX_CONTEXT_MESSAGES,
            enable_tool_calling: false,
            enable_mcp_servers: false,
            enable_agents: false,
            log_level: defaults::LOG_LEVEL.to_string(),
        }
    }
}

impl AppPreferences {
    pub fn default_model(&self) -> Option<&str> {
        Some(self.default_model.trim()).filter(|m| !m.is_empty())
    }
}
