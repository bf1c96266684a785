pub mod chat;
pub mod config;
pub mod constants;
pub mod context;
pub mod error;
pub mod llm;
pub mod session;
pub mod storage;
pub mod validation;

// Re-export key types
pub use chat::{ChatController, ChatEvent, ControllerOptions, TurnState, TurnStatus};
pub use config::Settings;
pub use context::ContextBuilder;
pub use error::{ChatError, ProviderError, Result, StorageError, ValidationError};
pub use llm::{
    create_provider, ChunkSink, ModelInfo, OllamaClient, Provider, ProviderConfig, QueryOptions,
    StreamChunk, StreamEnd,
};
pub use session::{ChatMessage, ChatSession, Sender, SessionSettings, SessionSummary};
pub use storage::{create_store, AppPreferences, FileStore, SessionStore, StorageConfig};
