/// OllamaChat — centralized constants.
/// Defaults shared by config, preferences and the session model live here.

// ─── Models ───────────────────────────────────────────────────────────────────

pub mod models {
    pub const DEFAULT_MODEL: &str = "llama3.2:latest";
}

// ─── Providers ────────────────────────────────────────────────────────────────

pub mod providers {
    pub const OLLAMA: &str = "ollama";
    pub const OPENAI: &str = "openai";
    pub const EINO: &str = "eino";

    pub const DEFAULT_PROVIDER: &str = OLLAMA;

    /// Every provider tag the factory knows about, implemented or not.
    pub const KNOWN: &[&str] = &[OLLAMA, OPENAI, EINO];
}

// ─── API Endpoints ────────────────────────────────────────────────────────────

pub mod endpoints {
    pub const OLLAMA_BASE_URL: &str = "http://localhost:11434";
    pub const GENERATE_PATH: &str = "/api/generate";
    pub const TAGS_PATH: &str = "/api/tags";
}

// ─── Default Settings ─────────────────────────────────────────────────────────

pub mod defaults {
    pub const TEMPERATURE: f64 = 0.7;
    pub const MIN_TEMPERATURE: f64 = 0.0;
    pub const MAX_TEMPERATURE: f64 = 2.0;
    pub const MAX_CONTEXT_MESSAGES: u32 = 10;
    pub const MAX_TOKENS: u32 = 2048;
    pub const TIMEOUT_SECONDS: u64 = 30;
    pub const LOG_LEVEL: &str = "info";
    pub const APP_NAME: &str = "OllamaChat";
    pub const STORAGE_KIND: &str = "file";
}

// ─── Prompt ───────────────────────────────────────────────────────────────────

pub mod prompt {
    pub const SYSTEM_PREAMBLE: &str = "You are a helpful assistant.\n\n";
}

// ─── Transcript Markers ───────────────────────────────────────────────────────

pub mod markers {
    pub const CANCELED: &str = "**Request canceled**";
    pub const ERROR_PREFIX: &str = "**Error:** ";
}

// ─── Resource Limits ──────────────────────────────────────────────────────────

pub mod limits {
    /// Largest frame accepted from a streaming backend before the line is complete.
    pub const MAX_FRAME_BYTES: usize = 1024 * 1024;
    pub const HEALTH_CHECK_TIMEOUT_SECS: u64 = 3;
}

// ─── Config Paths ─────────────────────────────────────────────────────────────

pub mod paths {
    pub const CONFIG_DIR: &str = "ollamachat";
    pub const CONFIG_FILE: &str = "config.toml";
    pub const DATA_DIR: &str = "ollamachat";
    pub const SESSIONS_DIR: &str = "sessions";
    pub const PREFERENCES_FILE: &str = "preferences.json";
    pub const LEGACY_HISTORY_FILE: &str = "chat_history.json";
    pub const LEGACY_MIGRATED_SUFFIX: &str = "migrated";
    pub const LEGACY_SESSION_ID: &str = "default";
    pub const LEGACY_SESSION_NAME: &str = "Default Session";
}
