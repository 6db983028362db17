//! `Embedder`/`LlmProvider` adapter for a local Ollama instance.
//!
//! Talks Ollama's native HTTP API directly (`/api/chat`, `/api/embeddings`)
//! rather than going through a higher-level client crate, since Ollama's
//! JSON contract is small, stable, and well-documented — a hand-rolled
//! `reqwest` client is more reliably correct here than wrapping a
//! fast-moving third-party SDK. Streaming chat responses are newline-
//! delimited JSON objects; each carries an incremental `message.content`
//! and a `done` flag.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc::Sender;
use tracing::{debug, instrument, warn};

use newsgraph_core::error::CoreError;
use newsgraph_core::traits::{ChatToken, Embedder, LlmProvider};

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_RESOURCE_TIMEOUT_SECS: u64 = 15;

pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
    chat_model: String,
    embedding_model: String,
    embedding_dim: usize,
}

impl OllamaProvider {
    pub fn new(
        base_url: impl Into<String>,
        chat_model: impl Into<String>,
        embedding_model: impl Into<String>,
        embedding_dim: usize,
    ) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
            .timeout(Duration::from_secs(DEFAULT_RESOURCE_TIMEOUT_SECS))
            .build()
            .map_err(|e| CoreError::configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            chat_model: chat_model.into(),
            embedding_model: embedding_model.into(),
            embedding_dim,
        })
    }

    fn map_reqwest_err(&self, e: reqwest::Error) -> CoreError {
        if e.is_timeout() {
            CoreError::Timeout {
                provider: "ollama".into(),
                elapsed_secs: DEFAULT_RESOURCE_TIMEOUT_SECS,
            }
        } else {
            CoreError::Network {
                provider: "ollama".into(),
                message: e.to_string(),
            }
        }
    }
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Deserialize)]
struct ChatChunk {
    message: Option<ChatMessage>,
    #[serde(default)]
    done: bool,
}

#[async_trait]
impl Embedder for OllamaProvider {
    fn dimensions(&self) -> usize {
        self.embedding_dim
    }

    fn model_name(&self) -> &str {
        &self.embedding_model
    }

    #[instrument(skip(self, text), fields(text_len = text.len()))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CoreError> {
        let resp = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&serde_json::json!({ "model": self.embedding_model, "prompt": text }))
            .send()
            .await
            .map_err(|e| self.map_reqwest_err(e))?;

        if !resp.status().is_success() {
            warn!(status = %resp.status(), "ollama embeddings request failed");
            return Err(CoreError::Provider {
                provider: "ollama".into(),
                message: format!("embeddings request failed with status {}", resp.status()),
            });
        }

        let parsed: EmbeddingResponse = resp
            .json()
            .await
            .map_err(|e| CoreError::Malformed {
                message: format!("ollama embedding response: {e}"),
            })?;
        Ok(parsed.embedding)
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    #[instrument(skip(self, system, prompt))]
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, CoreError> {
        let resp = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&serde_json::json!({
                "model": self.chat_model,
                "stream": false,
                "messages": [
                    { "role": "system", "content": system },
                    { "role": "user", "content": prompt },
                ],
            }))
            .send()
            .await
            .map_err(|e| self.map_reqwest_err(e))?;

        if !resp.status().is_success() {
            warn!(status = %resp.status(), "ollama chat request failed");
            return Err(CoreError::Provider {
                provider: "ollama".into(),
                message: format!("chat request failed with status {}", resp.status()),
            });
        }

        let parsed: ChatChunk = resp.json().await.map_err(|e| CoreError::Malformed {
            message: format!("ollama chat response: {e}"),
        })?;
        debug!("ollama chat completion received");
        Ok(parsed.message.map(|m| m.content).unwrap_or_default())
    }

    #[instrument(skip(self, system, prompt, sink))]
    async fn complete_stream(
        &self,
        system: &str,
        prompt: &str,
        sink: Sender<ChatToken>,
    ) -> Result<(), CoreError> {
        let resp = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&serde_json::json!({
                "model": self.chat_model,
                "stream": true,
                "messages": [
                    { "role": "system", "content": system },
                    { "role": "user", "content": prompt },
                ],
            }))
            .send()
            .await
            .map_err(|e| self.map_reqwest_err(e))?;

        if !resp.status().is_success() {
            warn!(status = %resp.status(), "ollama chat stream request failed");
            return Err(CoreError::Provider {
                provider: "ollama".into(),
                message: format!("chat stream request failed with status {}", resp.status()),
            });
        }

        let mut buf = String::new();
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| self.map_reqwest_err(e))?;
            buf.push_str(&String::from_utf8_lossy(&chunk));
            while let Some(pos) = buf.find('\n') {
                let line = buf[..pos].trim().to_string();
                buf.drain(..=pos);
                if line.is_empty() {
                    continue;
                }
                let parsed: ChatChunk = serde_json::from_str(&line).map_err(|e| CoreError::Malformed {
                    message: format!("ollama stream chunk: {e}"),
                })?;
                if let Some(message) = parsed.message {
                    if !message.content.is_empty() {
                        let _ = sink
                            .send(ChatToken {
                                text: message.content,
                                is_final: false,
                            })
                            .await;
                    }
                }
                if parsed.done {
                    debug!("ollama chat stream completed");
                    let _ = sink
                        .send(ChatToken {
                            text: String::new(),
                            is_final: true,
                        })
                        .await;
                    return Ok(());
                }
            }
        }
        // Stream closed without an explicit `done`: terminate defensively.
        warn!("ollama chat stream closed without a done flag");
        let _ = sink
            .send(ChatToken {
                text: String::new(),
                is_final: true,
            })
            .await;
        Ok(())
    }
}
