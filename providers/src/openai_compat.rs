//! `Embedder`/`LlmProvider` adapter for any OpenAI-compatible cloud
//! endpoint (OpenAI itself, or a compatible gateway). Shares no parent
//! type with [`crate::ollama::OllamaProvider`] (spec.md §9's design
//! note: local and cloud providers are independent capability
//! implementations, not subclasses of a common base).

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

pub struct OpenAiCompatProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    chat_model: String,
    embedding_model: String,
    embedding_dim: usize,
}

impl OpenAiCompatProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
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
            api_key: api_key.into(),
            chat_model: chat_model.into(),
            embedding_model: embedding_model.into(),
            embedding_dim,
        })
    }

    fn map_reqwest_err(&self, e: reqwest::Error) -> CoreError {
        if e.is_timeout() {
            CoreError::Timeout {
                provider: "openai-compat".into(),
                elapsed_secs: DEFAULT_RESOURCE_TIMEOUT_SECS,
            }
        } else {
            CoreError::Network {
                provider: "openai-compat".into(),
                message: e.to_string(),
            }
        }
    }

    fn map_status(&self, status: reqwest::StatusCode) -> CoreError {
        if status.as_u16() == 429 {
            CoreError::RateLimited {
                provider: "openai-compat".into(),
            }
        } else {
            CoreError::Provider {
                provider: "openai-compat".into(),
                message: format!("request failed with status {status}"),
            }
        }
    }
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct ChatStreamChunk {
    choices: Vec<ChatStreamChoice>,
}

#[derive(Deserialize)]
struct ChatStreamChoice {
    delta: ChatDelta,
}

#[derive(Deserialize, Default)]
struct ChatDelta {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl Embedder for OpenAiCompatProvider {
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
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "model": self.embedding_model, "input": text }))
            .send()
            .await
            .map_err(|e| self.map_reqwest_err(e))?;

        if !resp.status().is_success() {
            warn!(status = %resp.status(), "openai-compat embeddings request failed");
            return Err(self.map_status(resp.status()));
        }
        let parsed: EmbeddingResponse = resp.json().await.map_err(|e| CoreError::Malformed {
            message: format!("openai-compat embedding response: {e}"),
        })?;
        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| CoreError::Malformed {
                message: "openai-compat embedding response had no data".into(),
            })
    }

    #[instrument(skip(self, texts), fields(batch_size = texts.len()))]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CoreError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let resp = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "model": self.embedding_model, "input": texts }))
            .send()
            .await
            .map_err(|e| self.map_reqwest_err(e))?;

        if !resp.status().is_success() {
            warn!(status = %resp.status(), "openai-compat batch embeddings request failed");
            return Err(self.map_status(resp.status()));
        }
        let parsed: EmbeddingResponse = resp.json().await.map_err(|e| CoreError::Malformed {
            message: format!("openai-compat embedding response: {e}"),
        })?;
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn provider_name(&self) -> &str {
        "openai-compat"
    }

    #[instrument(skip(self, system, prompt))]
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, CoreError> {
        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
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
            warn!(status = %resp.status(), "openai-compat chat request failed");
            return Err(self.map_status(resp.status()));
        }
        let parsed: ChatResponse = resp.json().await.map_err(|e| CoreError::Malformed {
            message: format!("openai-compat chat response: {e}"),
        })?;
        debug!("openai-compat chat completion received");
        Ok(parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default())
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
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
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
            warn!(status = %resp.status(), "openai-compat chat stream request failed");
            return Err(self.map_status(resp.status()));
        }

        let mut buf = String::new();
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| self.map_reqwest_err(e))?;
            buf.push_str(&String::from_utf8_lossy(&chunk));
            while let Some(pos) = buf.find('\n') {
                let line = buf[..pos].trim().to_string();
                buf.drain(..=pos);
                let Some(data) = line.strip_prefix("data:") else {
                    continue;
                };
                let data = data.trim();
                if data.is_empty() {
                    continue;
                }
                if data == "[DONE]" {
                    debug!("openai-compat chat stream completed");
                    let _ = sink
                        .send(ChatToken {
                            text: String::new(),
                            is_final: true,
                        })
                        .await;
                    return Ok(());
                }
                let parsed: ChatStreamChunk = serde_json::from_str(data).map_err(|e| CoreError::Malformed {
                    message: format!("openai-compat stream chunk: {e}"),
                })?;
                if let Some(choice) = parsed.choices.into_iter().next() {
                    if let Some(text) = choice.delta.content {
                        if !text.is_empty() {
                            let _ = sink.send(ChatToken { text, is_final: false }).await;
                        }
                    }
                }
            }
        }
        warn!("openai-compat chat stream closed without a [DONE] marker");
        let _ = sink
            .send(ChatToken {
                text: String::new(),
                is_final: true,
            })
            .await;
        Ok(())
    }
}
