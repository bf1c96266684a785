mod frame;
mod ollama;
pub mod provider;
mod traits;

pub use frame::{Frame, FrameDecoder};
pub use ollama::OllamaClient;
pub use provider::{create_provider, ProviderConfig, ProviderId};
pub use traits::*;
