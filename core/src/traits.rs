//! External interfaces the rest of the workspace builds against: embedding
//! and chat providers, feed fetching, and article content extraction.
//!
//! These traits are intentionally thin. Concrete adapters (Ollama, an
//! OpenAI-compatible HTTP backend, RSS/Atom fetchers, readability-style
//! extractors) live in `newsgraph-providers`.

use async_trait::async_trait;

use crate::error::Result;

/// Produces a dense vector embedding for a piece of text.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Dimensionality of vectors this embedder produces.
    fn dimensions(&self) -> usize;

    /// Identifier recorded alongside stored vectors so a later model swap
    /// can be detected instead of silently mixing incompatible spaces.
    fn model_name(&self) -> &str;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Batched form; the default calls `embed` sequentially, but
    /// implementations backed by batching APIs should override it.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

/// One token of a streamed chat completion.
#[derive(Debug, Clone)]
pub struct ChatToken {
    pub text: String,
    pub is_final: bool,
}

/// A chat/completion provider used for keyword extraction, answer
/// generation, and the deep-analysis two-agent workflow.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn provider_name(&self) -> &str;

    /// Non-streaming completion, used for short structured responses like
    /// keyword extraction.
    async fn complete(&self, system: &str, prompt: &str) -> Result<String>;

    /// Streaming completion; tokens are pushed to `sink` as they arrive.
    /// Implementations must push exactly one token with `is_final = true`
    /// to terminate the stream.
    async fn complete_stream(
        &self,
        system: &str,
        prompt: &str,
        sink: tokio::sync::mpsc::Sender<ChatToken>,
    ) -> Result<()>;
}

/// Fetches raw feed entries (RSS/Atom or similar) from a configured source.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, feed_url: &str) -> Result<Vec<crate::domain::FeedItem>>;
}

/// Extracts clean article body text from fetched content (stripping
/// boilerplate, navigation, ads) before chunking.
pub trait ContentExtractor: Send + Sync {
    fn extract(&self, raw_html_or_text: &str) -> Result<String>;
}
