//! Generation and embedding service contracts plus the Ollama adapter.
//!
//! The extraction and retrieval pipelines only ever see these traits; which
//! model runs behind them is the host's business.

pub mod ollama;

pub use ollama::OllamaClient;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::error::Result;

/// An opaque token-emitting generation service.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Run one prompt to completion and return the full response text.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Run one prompt and yield response fragments as they are produced.
    /// Fragment boundaries are arbitrary and carry no meaning.
    async fn generate_stream(&self, prompt: &str)
        -> Result<BoxStream<'static, Result<String>>>;
}

/// Text embedding service.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}
