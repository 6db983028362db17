//! The stateless presentation façade (spec.md §6): the single entry point
//! a UI, CLI, or test harness drives the core through. Wires a `Store`
//! plus a configured `Embedder`/`LlmProvider` pair into the ingest,
//! GraphRAG, merge, and clustering subsystems, matching the teacher's
//! pattern of a thin service struct threading a process-scoped handle
//! through to the crates that do the actual work (spec.md §9: "Global
//! mutable state becomes a process-scoped handle created at startup and
//! threaded through services by value").

use std::path::Path;
use std::sync::Arc;

use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use newsgraph_cluster::{ClusteringReport, HdbscanParams};
use newsgraph_core::domain::QueryHistoryEntry;
use newsgraph_core::error::CoreError;
use newsgraph_core::traits::{Embedder, LlmProvider};
use newsgraph_graph::ingest::{self, ArticleOutcome, LlmHypergraphExtractor};
use newsgraph_providers::{OllamaProvider, OpenAiCompatProvider};
use newsgraph_rag::{GraphRagPipeline, PhaseUpdate};
use newsgraph_storage::clusters::ClusterRow;
use newsgraph_storage::hypergraph::{MergeSuggestion, SimilarNode};
use newsgraph_storage::stats::Statistics;
use newsgraph_storage::{clusters, hypergraph, query_history, stats, Store};

use crate::config::{NewsGraphConfig, ProviderConfig};

/// One entry of [`NewsGraphService::search_similar_concepts`].
#[derive(Debug, Clone)]
pub struct ConceptMatch {
    pub node_id: String,
    pub label: String,
    pub distance: f32,
}

/// Stateless façade over every subsystem spec.md §6 names as the exposed
/// surface. Holds the process-wide `Store` handle and a configured
/// provider pair; every method is otherwise a pure function of its
/// arguments plus the store's current contents.
pub struct NewsGraphService {
    store: Arc<Store>,
    llm: Arc<dyn LlmProvider>,
    embedder: Arc<dyn Embedder>,
    config: NewsGraphConfig,
}

fn build_provider(
    provider: &ProviderConfig,
    embedding_dim: usize,
) -> Result<(Arc<dyn LlmProvider>, Arc<dyn Embedder>), CoreError> {
    match provider {
        ProviderConfig::Local {
            base_url,
            chat_model,
            embedding_model,
        } => {
            let shared = Arc::new(OllamaProvider::new(
                base_url.clone(),
                chat_model.clone(),
                embedding_model.clone(),
                embedding_dim,
            )?);
            let llm: Arc<dyn LlmProvider> = shared.clone();
            let embedder: Arc<dyn Embedder> = shared;
            Ok((llm, embedder))
        }
        ProviderConfig::Cloud {
            base_url,
            api_key,
            chat_model,
            embedding_model,
        } => {
            let shared = Arc::new(OpenAiCompatProvider::new(
                base_url.clone(),
                api_key.clone(),
                chat_model.clone(),
                embedding_model.clone(),
                embedding_dim,
            )?);
            let llm: Arc<dyn LlmProvider> = shared.clone();
            let embedder: Arc<dyn Embedder> = shared;
            Ok((llm, embedder))
        }
    }
}

impl NewsGraphService {
    /// Opens (and migrates) the configured database, builds the
    /// configured provider pair, and returns a ready-to-use façade.
    pub fn open(config: NewsGraphConfig) -> Result<Self, CoreError> {
        let store = Arc::new(Store::open(&config.database_path, config.max_connections)?);
        let (llm, embedder) = build_provider(&config.provider, config.embedding_dim)?;
        Ok(Self {
            store,
            llm,
            embedder,
            config,
        })
    }

    /// Test/embedded-use constructor over an in-memory database, reusing
    /// the same provider wiring as [`Self::open`].
    #[cfg(any(test, feature = "test-util"))]
    pub fn open_in_memory(config: NewsGraphConfig) -> Result<Self, CoreError> {
        let store = Arc::new(Store::open_in_memory()?);
        let (llm, embedder) = build_provider(&config.provider, config.embedding_dim)?;
        Ok(Self {
            store,
            llm,
            embedder,
            config,
        })
    }

    pub fn database_path(&self) -> &Path {
        &self.config.database_path
    }

    /// `process_unprocessed_articles(progress_cb) -> count` (spec.md §6):
    /// runs the LLM-backed extractor over every `pending` article with
    /// the configured bounded parallelism.
    pub async fn process_unprocessed_articles(
        &self,
        progress_cb: impl FnMut(&ArticleOutcome) + Send,
    ) -> Result<usize, CoreError> {
        let extractor = Arc::new(LlmHypergraphExtractor {
            llm: Arc::clone(&self.llm),
            embedder: Arc::clone(&self.embedder),
        });
        ingest::process_unprocessed_articles(
            Arc::clone(&self.store),
            extractor,
            Arc::clone(&self.embedder),
            self.config.ingest_concurrency,
            CancellationToken::new(),
            progress_cb,
        )
        .await
    }

    /// `query_stream(question, role_prompt?) -> AsyncStream<PhaseUpdate>`
    /// (spec.md §4.8, §6). The returned stream stops emitting as soon as
    /// the caller drops it (spec.md §5's consumer-lifetime cancellation).
    pub fn query_stream(&self, question: String, role_prompt: Option<String>) -> ReceiverStream<PhaseUpdate> {
        let pipeline = Arc::new(GraphRagPipeline {
            store: Arc::clone(&self.store),
            llm: Arc::clone(&self.llm),
            embedder: Arc::clone(&self.embedder),
            config: self.config.graph_rag.clone().into(),
        });
        pipeline.query_stream(question, role_prompt, CancellationToken::new())
    }

    /// `run_full_clustering(status_cb, progress_cb) -> void` (spec.md
    /// §4.7, §6).
    pub async fn run_full_clustering(
        &self,
        status_cb: impl FnMut(&str),
        progress_cb: impl FnMut(usize, usize),
    ) -> Result<ClusteringReport, CoreError> {
        let params: HdbscanParams = self.config.hdbscan.clone().into();
        newsgraph_cluster::run_full_pipeline(
            &self.store,
            Some(self.llm.as_ref()),
            self.config.embedding_dim,
            params,
            status_cb,
            progress_cb,
        )
        .await
    }

    /// Lists the clusters of a completed build, largest first — not named
    /// explicitly in spec.md §6's bullet list but needed to report a
    /// `run_full_clustering` build's results back to a caller.
    pub fn list_clusters(&self, build_id: &str) -> Result<Vec<ClusterRow>, CoreError> {
        let build_id = build_id.to_string();
        self.store.read(move |conn| clusters::list_clusters(conn, &build_id))
    }

    /// `search_similar_concepts(query, limit) -> [(node_id,label,distance)]`
    /// (spec.md §6): embeds `query` and returns the closest nodes by
    /// cosine distance, unfiltered by threshold (a plain top-k search,
    /// unlike the `>= 0.85` merge-suggestion threshold or GraphRAG's
    /// `< 0.5` retrieval cutoff).
    pub async fn search_similar_concepts(&self, query: &str, limit: usize) -> Result<Vec<ConceptMatch>, CoreError> {
        let vector = self.embedder.embed(query).await?;
        let matches = self
            .store
            .read(move |conn| newsgraph_storage::embeddings::search_similar_nodes(conn, &vector, f32::MAX, limit))?;
        Ok(matches
            .into_iter()
            .map(|n| ConceptMatch {
                node_id: n.node_id,
                label: n.label,
                distance: n.distance,
            })
            .collect())
    }

    /// `find_similar_nodes(node_id, threshold, limit)` (spec.md §4.3).
    pub fn find_similar_nodes(&self, node_id: &str, threshold: f64, limit: usize) -> Result<Vec<SimilarNode>, CoreError> {
        let node_id = node_id.to_string();
        self.store
            .read(move |conn| hypergraph::find_similar_nodes(conn, &node_id, threshold, limit))
    }

    /// `get_merge_suggestions(threshold, limit)` (spec.md §4.3, §6).
    pub fn get_merge_suggestions(&self, threshold: f64, limit: usize) -> Result<Vec<MergeSuggestion>, CoreError> {
        self.store.read(move |conn| hypergraph::get_merge_suggestions(conn, threshold, limit))
    }

    /// `merge_nodes(src, dst, sim)` (spec.md §4.3, §6).
    pub fn merge_nodes(&self, source_id: &str, target_id: &str, similarity: f64) -> Result<(), CoreError> {
        let source_id = source_id.to_string();
        let target_id = target_id.to_string();
        self.store
            .write(move |tx| hypergraph::merge_nodes(tx, &source_id, &target_id, similarity))
    }

    /// `get_statistics() -> { node_count, edge_count, processed_articles,
    /// embedding_count }` (spec.md §6).
    pub fn get_statistics(&self) -> Result<Statistics, CoreError> {
        self.store.read(stats::get_statistics)
    }

    /// Query-history CRUD (spec.md §6).
    pub fn get_query_history(&self, id: &str) -> Result<Option<QueryHistoryEntry>, CoreError> {
        let id = id.to_string();
        self.store.read(move |conn| query_history::get(conn, &id))
    }

    pub fn list_query_history(&self, limit: usize) -> Result<Vec<QueryHistoryEntry>, CoreError> {
        self.store.read(move |conn| query_history::list_recent(conn, limit))
    }

    pub fn delete_query_history(&self, id: &str) -> Result<(), CoreError> {
        let id = id.to_string();
        self.store.write(move |tx| query_history::delete(tx, &id))
    }

    /// Runs the two-agent deep-analysis workflow (spec.md §4.9) over a
    /// previously persisted `query_history` row.
    pub async fn run_deep_analysis(&self, query_history_id: &str) -> Result<newsgraph_rag::deep_analysis::DeepAnalysisResult, CoreError> {
        let entry = self
            .get_query_history(query_history_id)?
            .ok_or_else(|| CoreError::DataConsistency {
                message: format!("query_history row {query_history_id} not found"),
            })?;
        let response = entry_to_response(&entry)?;
        newsgraph_rag::deep_analysis::run(&self.store, self.llm.as_ref(), query_history_id, &response).await
    }
}

/// Reassembles a [`newsgraph_rag::GraphRagResponse`] from a persisted
/// `query_history` row's JSON columns, for feeding back into deep
/// analysis (spec.md §8's round-trip law: encoding then decoding a
/// `query_history` row reproduces the original response's four
/// serialized arrays).
fn entry_to_response(entry: &QueryHistoryEntry) -> Result<newsgraph_rag::GraphRagResponse, CoreError> {
    fn parse<T: serde::de::DeserializeOwned + Default>(json: &Option<String>) -> Result<T, CoreError> {
        match json {
            Some(s) => serde_json::from_str(s).map_err(|e| CoreError::Malformed {
                message: format!("query_history json column: {e}"),
            }),
            None => Ok(T::default()),
        }
    }
    Ok(newsgraph_rag::GraphRagResponse {
        query: entry.query.clone(),
        answer: entry.answer.clone().unwrap_or_default(),
        keywords: Vec::new(),
        related_nodes: parse(&entry.related_nodes_json)?,
        reasoning_paths: parse(&entry.reasoning_paths_json)?,
        graph_paths: parse(&entry.graph_paths_json)?,
        source_articles: parse(&entry.source_articles_json)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GraphRagSettings, HdbscanSettings};

    fn local_config() -> NewsGraphConfig {
        NewsGraphConfig {
            database_path: "unused.sqlite".into(),
            max_connections: 4,
            embedding_dim: 4,
            provider: ProviderConfig::Local {
                base_url: "http://localhost:11434".into(),
                chat_model: "llama3.1".into(),
                embedding_model: "nomic-embed-text".into(),
            },
            ingest_concurrency: 2,
            hdbscan: HdbscanSettings::default(),
            graph_rag: GraphRagSettings::default(),
        }
    }

    #[test]
    fn open_in_memory_reports_empty_statistics() {
        let service = NewsGraphService::open_in_memory(local_config()).unwrap();
        let stats = service.get_statistics().unwrap();
        assert_eq!(stats.node_count, 0);
        assert_eq!(stats.edge_count, 0);
        assert_eq!(stats.processed_articles, 0);
        assert_eq!(stats.embedding_count, 0);
    }

    #[test]
    fn list_query_history_starts_empty() {
        let service = NewsGraphService::open_in_memory(local_config()).unwrap();
        assert!(service.list_query_history(10).unwrap().is_empty());
    }
}
