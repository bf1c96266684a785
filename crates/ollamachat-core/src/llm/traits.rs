use crate::constants::defaults;
use crate::error::ProviderError;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// One piece of streamed text.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamChunk {
    pub text: String,
    /// True only for the first fragment of a stream: "start a new turn"
    /// rather than "append to the current one".
    pub is_new_turn: bool,
}

/// How a stream that did not fail came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryOptions {
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            temperature: defaults::TEMPERATURE,
            max_tokens: defaults::MAX_TOKENS,
        }
    }
}

/// A model installed on the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Callback receiving chunks as they arrive.
pub type ChunkSink<'a> = &'a mut (dyn FnMut(StreamChunk) + Send);

/// An LLM backend capable of streaming a single query.
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError>;

    /// Check if the backend is reachable and responsive.
    async fn check_health(&self) -> Result<(), ProviderError> {
        self.list_models().await.map(|_| ())
    }

    /// Stream one completion for `prompt`, pushing every non-empty fragment to
    /// `on_chunk` in arrival order.
    ///
    /// Cancelling `cancel` aborts the request; no chunk is delivered after the
    /// call observes the cancellation and it returns `Ok(StreamEnd::Cancelled)`.
    async fn stream_query(
        &self,
        cancel: CancellationToken,
        model: &str,
        prompt: &str,
        options: QueryOptions,
        on_chunk: ChunkSink<'_>,
    ) -> Result<StreamEnd, ProviderError>;
}
