//! Batch article ingest: bounded-parallelism extraction + persistence
//! (spec.md §4.2, §5). Each article is chunked, extracted, and persisted
//! atomically; a failure in one article does not abort the batch.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use newsgraph_core::chunking::chunk_text;
use newsgraph_core::domain::ExtractedHypergraph;
use newsgraph_core::error::CoreError;
use newsgraph_core::traits::{Embedder, LlmProvider};
use newsgraph_storage::{feed_items, hypergraph, Store};

pub const DEFAULT_CONCURRENCY: usize = 4;

/// Extracts a hypergraph from one article's full content. Kept as a
/// trait so ingest can be tested against a mock without a real LLM call.
#[async_trait::async_trait]
pub trait HypergraphExtractor: Send + Sync {
    async fn extract(&self, article_id: &str, full_content: &str) -> Result<ExtractedHypergraph, CoreError>;
}

/// An outcome for a single article in a batch.
#[derive(Debug)]
pub struct ArticleOutcome {
    pub article_id: String,
    pub result: Result<i64, CoreError>,
}

/// Processes every `pending` article, bounded to `concurrency` in flight
/// at once (default 4). Returns the count of articles that completed
/// successfully; per-article failures are recorded on the row and do not
/// abort the batch (spec.md §4.2, §7).
#[instrument(skip(store, extractor, embedder, cancel, progress_cb), fields(concurrency))]
pub async fn process_unprocessed_articles(
    store: Arc<Store>,
    extractor: Arc<dyn HypergraphExtractor>,
    embedder: Arc<dyn Embedder>,
    concurrency: usize,
    cancel: CancellationToken,
    mut progress_cb: impl FnMut(&ArticleOutcome) + Send,
) -> Result<usize, CoreError> {
    let ids = store.read(|conn| feed_items::unprocessed_ids(conn, 10_000))?;
    if ids.is_empty() {
        debug!("no pending articles to process");
        return Ok(0);
    }
    info!(pending = ids.len(), concurrency, "starting batch ingest");

    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut handles = Vec::with_capacity(ids.len());

    for article_id in ids {
        if cancel.is_cancelled() {
            break;
        }
        let store = Arc::clone(&store);
        let extractor = Arc::clone(&extractor);
        let embedder = Arc::clone(&embedder);
        let semaphore = Arc::clone(&semaphore);
        let cancel = cancel.clone();

        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
            if cancel.is_cancelled() {
                return ArticleOutcome {
                    article_id,
                    result: Err(CoreError::Cancelled),
                };
            }
            let result = process_one(&store, extractor.as_ref(), embedder.as_ref(), &article_id).await;
            ArticleOutcome { article_id, result }
        }));
    }

    let mut completed = 0usize;
    for handle in handles {
        let outcome = handle.await.map_err(|e| CoreError::internal(e.to_string()))?;
        match &outcome.result {
            Ok(chunk_count) => debug!(article_id = %outcome.article_id, chunk_count, "article ingested"),
            Err(e) => warn!(article_id = %outcome.article_id, error = %e, "article ingest failed"),
        }
        if outcome.result.is_ok() {
            completed += 1;
        }
        progress_cb(&outcome);
    }

    info!(completed, "batch ingest finished");
    Ok(completed)
}

#[instrument(skip(store, extractor, embedder), fields(article_id))]
async fn process_one(
    store: &Store,
    extractor: &dyn HypergraphExtractor,
    embedder: &dyn Embedder,
    article_id: &str,
) -> Result<i64, CoreError> {
    let full_content = store
        .read(|conn| feed_items::get_full_content(conn, article_id))?
        .ok_or_else(|| CoreError::ArticleNotFound {
            id: article_id.to_string(),
        })?;
    if full_content.trim().is_empty() {
        let err = CoreError::NoContent {
            id: article_id.to_string(),
        };
        let _ = store.write(|tx| hypergraph::mark_article_failed(tx, article_id, &err.to_string()));
        return Err(err);
    }

    let extracted = match extractor.extract(article_id, &full_content).await {
        Ok(e) => e,
        Err(err) => {
            let _ = store.write(|tx| hypergraph::mark_article_failed(tx, article_id, &err.to_string()));
            return Err(err);
        }
    };

    let chunk_texts = chunk_text(&full_content);
    let chunk_embeddings = if chunk_texts.is_empty() {
        Vec::new()
    } else {
        match embedder.embed_batch(&chunk_texts).await {
            Ok(v) => v,
            Err(err) => {
                let _ = store.write(|tx| hypergraph::mark_article_failed(tx, article_id, &err.to_string()));
                return Err(err);
            }
        }
    };

    let article_id_owned = article_id.to_string();
    let embedding_model_owned = embedder.model_name().to_string();
    store.write(move |tx| {
        hypergraph::persist_extraction(
            tx,
            &article_id_owned,
            &full_content,
            &extracted,
            &embedding_model_owned,
            &chunk_embeddings,
        )
    })
}

/// A thin default extractor that calls an `LlmProvider` with a strict
/// JSON-extraction system prompt and an `Embedder` for node labels. Real
/// prompt wording lives in `newsgraph-rag`'s prompt templates; this is the
/// composition point ingest depends on without depending on `rag` itself
/// (avoiding a dependency cycle with `rag`'s use of the path finder).
pub struct LlmHypergraphExtractor {
    pub llm: Arc<dyn LlmProvider>,
    pub embedder: Arc<dyn Embedder>,
}

#[async_trait::async_trait]
impl HypergraphExtractor for LlmHypergraphExtractor {
    async fn extract(&self, _article_id: &str, full_content: &str) -> Result<ExtractedHypergraph, CoreError> {
        const SYSTEM_PROMPT: &str = "Extract a semantic hypergraph from the article. \
            Respond with strict JSON: {\"incidence_dict\": {edge_id: [labels]}, \
            \"metadata\": [{\"edge\": id, \"source\": [...], \"target\": [...], \"chunkID\": \"chunkN\"}]}. \
            No prose, no markdown fences.";

        let raw = self.llm.complete(SYSTEM_PROMPT, full_content).await?;
        let cleaned = strip_code_fences(&raw);
        let mut extracted: ExtractedHypergraph = serde_json::from_str(&cleaned)
            .map_err(|e| CoreError::Malformed {
                message: format!("hypergraph extraction JSON: {e}"),
            })?;

        let labels: Vec<String> = extracted
            .incidence_dict
            .values()
            .flatten()
            .cloned()
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();
        if !labels.is_empty() {
            let vectors = self.embedder.embed_batch(&labels).await?;
            for (label, vector) in labels.into_iter().zip(vectors) {
                extracted.embeddings.insert(label, vector);
            }
        }

        Ok(extracted)
    }
}

fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    if let Some(stripped) = trimmed.strip_prefix("```json") {
        stripped.trim_end_matches("```").trim().to_string()
    } else if let Some(stripped) = trimmed.strip_prefix("```") {
        stripped.trim_end_matches("```").trim().to_string()
    } else {
        trimmed.to_string()
    }
}
