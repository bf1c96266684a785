use crate::constants::prompt::SYSTEM_PREAMBLE;
use crate::session::{ChatMessage, ChatSession};

/// Builds the outgoing prompt from a preamble, a window of prior messages and the new user text.
///
/// The window is counted in messages, not tokens.
pub struct ContextBuilder {
    preamble: String,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self {
            preamble: SYSTEM_PREAMBLE.to_string(),
        }
    }

    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = preamble.into();
        self
    }

    /// Render the prompt for `new_user_text` using the last
    /// `session.max_context_messages` entries of the session.
    pub fn build_prompt(&self, session: &ChatSession, new_user_text: &str) -> String {
        self.build_from(
            window(&session.messages, session.max_context_messages as usize),
            new_user_text,
        )
    }

    pub fn build_from(&self, history: &[ChatMessage], new_user_text: &str) -> String {
        let mut prompt = String::with_capacity(
            self.preamble.len()
                + new_user_text.len()
                + history.iter().map(|m| m.content.len() + 12).sum::<usize>()
                + 32,
        );

        prompt.push_str(&self.preamble);
        for message in history {
            prompt.push_str(message.sender.as_str());
            prompt.push_str(": ");
            prompt.push_str(&message.content);
            prompt.push('\n');
        }
        prompt.push_str("user: ");
        prompt.push_str(new_user_text);
        prompt.push_str("\nassistant:");
        prompt
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The most recent `max` messages, oldest first.
pub fn window(messages: &[ChatMessage], max: usize) -> &[ChatMessage] {
    let start = messages.len().saturating_sub(max);
    &messages[start..]
}
