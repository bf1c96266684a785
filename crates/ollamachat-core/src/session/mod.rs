mod model;

pub use model::{ChatMessage, ChatSession, Sender, SessionSettings, SessionSummary};
