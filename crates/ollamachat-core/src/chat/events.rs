use crate::session::SessionSummary;

/// Lifecycle of the single in-flight turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    /// Request issued, nothing received yet.
    Sending,
    Streaming,
}

/// How a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStatus {
    Completed,
    Canceled,
    Failed,
}

/// Notifications for whoever renders the conversation.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    Chunk { text: String, is_new_turn: bool },
    TurnFinished {
        status: TurnStatus,
        error: Option<String>,
    },
    SessionListChanged(Vec<SessionSummary>),
}
