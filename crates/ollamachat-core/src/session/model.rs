use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{defaults, providers};
use crate::error::ValidationError;
use crate::validation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    #[serde(alias = "llm")]
    Assistant,
}

impl Sender {
    pub fn as_str(self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: Sender,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(sender: Sender, content: impl Into<String>) -> Self {
        Self {
            sender,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Sender::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Sender::Assistant, content)
    }
}

/// A named conversation with its own model, temperature and context-window overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// `None` means "use the globally configured default model".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_max_context_messages")]
    pub max_context_messages: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

fn default_provider() -> String {
    providers::DEFAULT_PROVIDER.to_string()
}

fn default_max_context_messages() -> u32 {
    defaults::MAX_CONTEXT_MESSAGES
}

fn default_temperature() -> f64 {
    defaults::TEMPERATURE
}

impl ChatSession {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Self::generate_id(),
            name: name.into(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
            model: None,
            provider: default_provider(),
            max_context_messages: defaults::MAX_CONTEXT_MESSAGES,
            temperature: defaults::TEMPERATURE,
        }
    }

    pub fn with_settings(mut self, settings: &SessionSettings) -> Self {
        settings.apply_to(&mut self);
        self
    }

    /// Time-sortable id with a random suffix, e.g. `20250101-093000-1a2b3c4d`.
    pub fn generate_id() -> String {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        format!("{}-{}", Utc::now().format("%Y%m%d-%H%M%S"), &suffix[..8])
    }

    pub fn default_name() -> String {
        format!("Session {}", Local::now().format("%H:%M"))
    }

    /// Ids double as file names, so only `[A-Za-z0-9_-]` is allowed.
    pub fn is_valid_id(id: &str) -> bool {
        !id.is_empty()
            && id.len() <= 128
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }

    /// Refresh `updated_at`, never moving it backwards.
    pub fn touch(&mut self) {
        let now = Utc::now();
        if now > self.updated_at {
            self.updated_at = now;
        }
    }

    pub fn add_message(&mut self, message: ChatMessage) {
        self.messages.push(message);
        self.touch();
    }

    /// Append to the in-flight assistant message. Returns false when the last
    /// message is not an assistant message.
    pub fn append_to_last_assistant(&mut self, chunk: &str) -> bool {
        match self.messages.last_mut() {
            Some(last) if last.sender == Sender::Assistant => {
                last.content.push_str(chunk);
                self.touch();
                true
            }
            _ => false,
        }
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.touch();
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref().filter(|m| !m.trim().is_empty())
    }

    /// Plain-text transcript: a `You:` or `LLM:` label line, the message,
    /// then a blank line, for every message.
    pub fn to_transcript(&self) -> String {
        let mut out = String::new();
        for message in &self.messages {
            let label = match message.sender {
                Sender::User => "You:",
                Sender::Assistant => "LLM:",
            };
            out.push_str(label);
            out.push('\n');
            out.push_str(&message.content);
            out.push_str("\n\n");
        }
        out
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            updated_at: self.updated_at,
            message_count: self.messages.len(),
            model: self.model().map(str::to_string),
        }
    }
}

/// Lightweight view of a session for list displays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub name: String,
    pub updated_at: DateTime<Utc>,
    pub message_count: usize,
    pub model: Option<String>,
}

/// Per-session overrides a caller may change between turns.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub model: Option<String>,
    pub max_context_messages: u32,
    pub temperature: f64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            model: None,
            max_context_messages: defaults::MAX_CONTEXT_MESSAGES,
            temperature: defaults::TEMPERATURE,
        }
    }
}

impl SessionSettings {
    /// Build from raw form input. An empty model clears the session override.
    pub fn parse(
        model: &str,
        max_context_messages: &str,
        temperature: &str,
    ) -> Result<Self, ValidationError> {
        let model = model.trim();
        Ok(Self {
            model: (!model.is_empty()).then(|| model.to_string()),
            max_context_messages: validation::parse_non_negative_int(
                max_context_messages,
                "max context messages",
            )?,
            temperature: validation::parse_float_in_range(
                temperature,
                "temperature",
                defaults::MIN_TEMPERATURE,
                defaults::MAX_TEMPERATURE,
            )?,
        })
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::check_float_in_range(
            self.temperature,
            "temperature",
            defaults::MIN_TEMPERATURE,
            defaults::MAX_TEMPERATURE,
        )?;
        Ok(())
    }

    pub fn from_session(session: &ChatSession) -> Self {
        Self {
            model: session.model().map(str::to_string),
            max_context_messages: session.max_context_messages,
            temperature: session.temperature,
        }
    }

    fn apply_to(&self, session: &mut ChatSession) {
        session.model = self
            .model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string);
        session.max_context_messages = self.max_context_messages;
        session.temperature = self.temperature;
    }

    pub(crate) fn apply(&self, session: &mut ChatSession) {
        self.apply_to(session);
        session.touch();
    }
}
