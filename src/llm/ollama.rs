use async_stream::stream;
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{GraphRagError, Result};
use crate::llm::{Embedder, GenerationService};

/// Request structure for the Ollama generate API
#[derive(Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f64,
}

/// One response object from the Ollama generate API. In streaming mode the
/// API emits these as newline delimited JSON until `done` is true.
#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
}

/// Request structure for the Ollama embeddings API
#[derive(Serialize)]
struct EmbeddingRequest {
    model: String,
    prompt: String,
}

/// Response structure from the Ollama embeddings API
#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// Ollama client serving both generation and embeddings
pub struct OllamaClient {
    client: Client,
    base_url: String,
    generation_model: String,
    embedding_model: String,
    temperature: f64,
}

impl OllamaClient {
    /// Create a new Ollama client
    ///
    /// # Arguments
    ///
    /// * `base_url` - Server base URL, e.g. "http://127.0.0.1:11434"
    /// * `generation_model` - Model used for /api/generate
    /// * `embedding_model` - Model used for /api/embeddings
    /// * `temperature` - Sampling temperature passed with every request
    /// * `timeout_secs` - Per-request timeout
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be created (should not happen in
    /// normal operation)
    pub fn new(
        base_url: String,
        generation_model: String,
        embedding_model: String,
        temperature: f64,
        timeout_secs: u64,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            generation_model,
            embedding_model,
            temperature,
        }
    }

    async fn send_generate(&self, prompt: &str, streaming: bool) -> Result<reqwest::Response> {
        let request = GenerateRequest {
            model: self.generation_model.clone(),
            prompt: prompt.to_string(),
            stream: streaming,
            options: GenerateOptions {
                temperature: self.temperature,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| GraphRagError::Generation(format!("Network error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(GraphRagError::Generation(format!(
                "Ollama API error {}: {}",
                status, body
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl GenerationService for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let start = std::time::Instant::now();
        let response = self.send_generate(prompt, false).await?;

        let result: GenerateResponse = response
            .json()
            .await
            .map_err(|e| GraphRagError::Generation(format!("Failed to parse response: {}", e)))?;

        log::debug!("Generation took {:?}", start.elapsed());
        Ok(result.response)
    }

    async fn generate_stream(
        &self,
        prompt: &str,
    ) -> Result<BoxStream<'static, Result<String>>> {
        let response = self.send_generate(prompt, true).await?;

        let s = stream! {
            let mut bytes = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        yield Err(GraphRagError::Generation(format!("Stream error: {}", e)));
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(pos) = buffer.find('\n') {
                    let line = buffer[..pos].trim().to_string();
                    buffer.drain(..=pos);
                    if line.is_empty() {
                        continue;
                    }

                    match serde_json::from_str::<GenerateResponse>(&line) {
                        Ok(part) => {
                            if !part.response.is_empty() {
                                yield Ok(part.response);
                            }
                            if part.done {
                                return;
                            }
                        }
                        Err(e) => {
                            yield Err(GraphRagError::Generation(format!(
                                "Invalid stream line: {}",
                                e
                            )));
                            return;
                        }
                    }
                }
            }
        };

        Ok(Box::pin(s))
    }
}

#[async_trait]
impl Embedder for OllamaClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let start = std::time::Instant::now();
        let request = EmbeddingRequest {
            model: self.embedding_model.clone(),
            prompt: text.to_string(),
        };

        let response = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| GraphRagError::Embedding(format!("Network error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(GraphRagError::Embedding(format!(
                "Ollama API error {}: {}",
                status, body
            )));
        }

        let result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| GraphRagError::Embedding(format!("Failed to parse response: {}", e)))?;

        log::debug!("Embedding took {:?}", start.elapsed());
        Ok(result.embedding)
    }
}
