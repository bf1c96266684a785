use crate::constants::{endpoints, limits};
use crate::error::ProviderError;
use crate::llm::frame::{Frame, FrameDecoder};
use crate::llm::traits::*;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Client for a local Ollama server using the streaming `/api/generate` endpoint.
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let base_url = base_url.into();
        let base_url = if base_url.trim().is_empty() {
            endpoints::OLLAMA_BASE_URL.to_string()
        } else {
            base_url.trim().trim_end_matches('/').to_string()
        };

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Unreachable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, base_url })
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f64,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
}

#[async_trait::async_trait]
impl Provider for OllamaClient {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn check_health(&self) -> Result<(), ProviderError> {
        let url = format!("{}{}", self.base_url, endpoints::TAGS_PATH);
        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(limits::HEALTH_CHECK_TIMEOUT_SECS))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ProviderError::Rejected {
                status: response.status().as_u16(),
                body: String::new(),
            });
        }
        Ok(())
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        info!("Fetching available models");
        let url = format!("{}{}", self.base_url, endpoints::TAGS_PATH);

        let response = self.client.get(&url).send().await.map_err(|e| {
            error!(error = %e, "Failed to fetch models from Ollama");
            ProviderError::from(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "Unexpected status code from Ollama");
            return Err(ProviderError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Protocol(format!("failed to decode model list: {e}")))?;

        let models: Vec<ModelInfo> = tags
            .models
            .into_iter()
            .map(|m| ModelInfo {
                description: Some(format!("Ollama model: {}", m.name)),
                name: m.name,
            })
            .collect();

        info!(count = models.len(), "Fetched models");
        Ok(models)
    }

    async fn stream_query(
        &self,
        cancel: CancellationToken,
        model: &str,
        prompt: &str,
        options: QueryOptions,
        on_chunk: ChunkSink<'_>,
    ) -> Result<StreamEnd, ProviderError> {
        info!(model, prompt_len = prompt.len(), "Sending query to Ollama");

        let url = format!("{}{}", self.base_url, endpoints::GENERATE_PATH);
        let body = GenerateRequest {
            model,
            prompt,
            stream: true,
            options: GenerateOptions {
                temperature: options.temperature,
                num_predict: options.max_tokens,
            },
        };

        let request = self.client.post(&url).json(&body).send();
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Query cancelled before response headers");
                return Ok(StreamEnd::Cancelled);
            }
            result = request => result.map_err(|e| {
                error!(error = %e, "Failed to send request to Ollama");
                ProviderError::from(e)
            })?,
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "Unexpected status code from Ollama");
            return Err(ProviderError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let mut stream = response.bytes_stream();
        let mut decoder = FrameDecoder::new();
        let mut is_new_turn = true;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Query cancelled mid-stream, dropping connection");
                    return Ok(StreamEnd::Cancelled);
                }
                next = stream.next() => next,
            };

            let frames = match next {
                Some(Ok(bytes)) => decoder.push(&bytes)?,
                Some(Err(e)) => {
                    error!(error = %e, "Streaming response interrupted");
                    return Err(e.into());
                }
                None => {
                    let tail = decoder.finish()?;
                    if let Some(end) =
                        deliver(tail.into_iter(), &mut is_new_turn, &cancel, on_chunk)?
                    {
                        return Ok(end);
                    }
                    warn!("Stream closed before completion frame");
                    return Err(ProviderError::Protocol(
                        "stream ended before completion".to_string(),
                    ));
                }
            };

            if let Some(end) = deliver(frames.into_iter(), &mut is_new_turn, &cancel, on_chunk)? {
                if end == StreamEnd::Completed {
                    info!("Completed streaming response");
                }
                return Ok(end);
            }
        }
    }
}

/// Push decoded frames to the sink. Returns `Some` once the stream has ended.
fn deliver<F>(
    frames: impl Iterator<Item = Frame>,
    is_new_turn: &mut bool,
    cancel: &CancellationToken,
    on_chunk: &mut F,
) -> Result<Option<StreamEnd>, ProviderError>
where
    F: FnMut(StreamChunk) + ?Sized,
{
    for frame in frames {
        if cancel.is_cancelled() {
            return Ok(Some(StreamEnd::Cancelled));
        }
        if let Some(message) = frame.error_message() {
            error!(error = message, "Error in Ollama response");
            return Err(ProviderError::Remote(message.to_string()));
        }
        if !frame.response.is_empty() {
            on_chunk(StreamChunk {
                text: frame.response,
                is_new_turn: *is_new_turn,
            });
            *is_new_turn = false;
        }
        if frame.done {
            return Ok(Some(StreamEnd::Completed));
        }
    }
    Ok(None)
}
