//! The GraphRAG pipeline (spec.md §4.8): a lazy sequence of typed phase
//! updates from keyword extraction through answer generation and
//! finalization.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use newsgraph_core::domain::new_id;
use newsgraph_core::edge_id::display_relation;
use newsgraph_core::error::CoreError;
use newsgraph_core::traits::{ChatToken, Embedder, LlmProvider};
use newsgraph_graph::path::{PathIndex, DEFAULT_DEPTH_CAP, DEFAULT_MAX_PATHS};
use newsgraph_storage::{embeddings, feed_items, hypergraph, query_history, Store};

use crate::context::assemble_context;
use crate::keywords::extract_keywords;
use crate::prompts::ANSWER_GENERATION_SYSTEM;
use crate::types::{GraphPathEdge, GraphRagResponse, PhaseUpdate, ReasoningPath, RelatedNode, SourceArticle};

const DIRECT_EDGES_LIMIT: usize = 50;
const PER_KEYWORD_NODE_LIMIT: usize = 20;

/// Tunables for one pipeline run, defaulting to spec.md's bit-exact
/// constants (§6).
#[derive(Debug, Clone)]
pub struct GraphRagConfig {
    pub node_distance_threshold: f32,
    pub chunk_distance_threshold: f32,
    pub max_chunks: usize,
    pub s: usize,
    pub depth_cap: usize,
    pub max_paths: usize,
}

impl Default for GraphRagConfig {
    fn default() -> Self {
        Self {
            node_distance_threshold: 0.5,
            chunk_distance_threshold: 0.5,
            max_chunks: 5,
            s: 1,
            depth_cap: DEFAULT_DEPTH_CAP,
            max_paths: DEFAULT_MAX_PATHS,
        }
    }
}

/// Orchestrates one GraphRAG query end to end, emitting [`PhaseUpdate`]s
/// as it goes.
pub struct GraphRagPipeline {
    pub store: Arc<Store>,
    pub llm: Arc<dyn LlmProvider>,
    pub embedder: Arc<dyn Embedder>,
    pub config: GraphRagConfig,
}

impl GraphRagPipeline {
    pub fn new(store: Arc<Store>, llm: Arc<dyn LlmProvider>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            store,
            llm,
            embedder,
            config: GraphRagConfig::default(),
        }
    }

    /// Runs the pipeline for `question`, returning a stream of phase
    /// updates. The background task stops as soon as the returned stream
    /// is dropped (spec.md §5's cancellation-by-consumer-lifetime rule),
    /// or earlier if `cancel` is triggered.
    #[instrument(skip(self, cancel), fields(question_len = question.len()))]
    pub fn query_stream(
        self: Arc<Self>,
        question: String,
        role_prompt: Option<String>,
        cancel: CancellationToken,
    ) -> ReceiverStream<PhaseUpdate> {
        let (tx, rx) = mpsc::channel(32);
        info!("starting graphrag query");
        tokio::spawn(async move {
            self.run(question, role_prompt, cancel, tx).await;
        });
        ReceiverStream::new(rx)
    }

    #[instrument(skip(self, role_prompt, cancel, tx), fields(question_len = question.len()))]
    async fn run(
        &self,
        question: String,
        role_prompt: Option<String>,
        cancel: CancellationToken,
        tx: mpsc::Sender<PhaseUpdate>,
    ) {
        macro_rules! emit {
            ($update:expr) => {
                if tx.send($update).await.is_err() {
                    return;
                }
            };
        }

        if cancel.is_cancelled() {
            emit!(PhaseUpdate::Failed {
                message: CoreError::Cancelled.to_string()
            });
            return;
        }

        emit!(PhaseUpdate::Status {
            message: "extracting keywords".into()
        });
        let keywords = extract_keywords(self.llm.as_ref(), &question).await;
        emit!(PhaseUpdate::Keywords {
            keywords: keywords.clone()
        });

        if cancel.is_cancelled() {
            emit!(PhaseUpdate::Failed {
                message: CoreError::Cancelled.to_string()
            });
            return;
        }

        emit!(PhaseUpdate::Status {
            message: "retrieving related concepts".into()
        });
        let related_nodes = match self.related_nodes(&keywords).await {
            Ok(nodes) => nodes,
            Err(e) => {
                emit!(PhaseUpdate::Failed { message: e.to_string() });
                return;
            }
        };
        debug!(count = related_nodes.len(), "related nodes retrieved");
        emit!(PhaseUpdate::RelatedNodes {
            nodes: related_nodes.clone()
        });

        if cancel.is_cancelled() {
            emit!(PhaseUpdate::Failed {
                message: CoreError::Cancelled.to_string()
            });
            return;
        }

        emit!(PhaseUpdate::Status {
            message: "retrieving source passages".into()
        });
        let chunks = match self.related_chunks(&question, &related_nodes).await {
            Ok(chunks) => chunks,
            Err(e) => {
                emit!(PhaseUpdate::Failed { message: e.to_string() });
                return;
            }
        };

        emit!(PhaseUpdate::Status {
            message: "gathering reasoning paths".into()
        });
        let (reasoning_paths, graph_paths) = match self.gather_paths(&related_nodes) {
            Ok(v) => v,
            Err(e) => {
                emit!(PhaseUpdate::Failed { message: e.to_string() });
                return;
            }
        };
        debug!(
            reasoning_paths = reasoning_paths.len(),
            graph_edges = graph_paths.len(),
            "reasoning paths gathered"
        );
        emit!(PhaseUpdate::ReasoningPaths {
            paths: reasoning_paths.clone()
        });
        emit!(PhaseUpdate::GraphPaths {
            edges: graph_paths.clone()
        });

        if cancel.is_cancelled() {
            emit!(PhaseUpdate::Failed {
                message: CoreError::Cancelled.to_string()
            });
            return;
        }

        let context = assemble_context(&related_nodes, &reasoning_paths, &graph_paths, &chunks);
        let system_prompt = match &role_prompt {
            Some(role) => format!("{ANSWER_GENERATION_SYSTEM}\n\n{role}"),
            None => ANSWER_GENERATION_SYSTEM.to_string(),
        };
        let user_prompt = format!("{context}\n\n## Question\n\n{question}");

        emit!(PhaseUpdate::Status {
            message: "generating answer".into()
        });
        let (token_tx, mut token_rx) = mpsc::channel::<ChatToken>(32);
        let llm = Arc::clone(&self.llm);
        let answer_task = tokio::spawn(async move { llm.complete_stream(&system_prompt, &user_prompt, token_tx).await });

        let mut answer = String::new();
        while let Some(token) = token_rx.recv().await {
            if cancel.is_cancelled() {
                break;
            }
            if !token.text.is_empty() {
                answer.push_str(&token.text);
                emit!(PhaseUpdate::AnswerToken { text: token.text });
            }
            if token.is_final {
                break;
            }
        }
        match answer_task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                emit!(PhaseUpdate::Failed { message: e.to_string() });
                return;
            }
            Err(e) => {
                emit!(PhaseUpdate::Failed {
                    message: format!("answer generation task panicked: {e}")
                });
                return;
            }
        }

        if cancel.is_cancelled() && answer.is_empty() {
            emit!(PhaseUpdate::Failed {
                message: CoreError::Cancelled.to_string()
            });
            return;
        }

        let source_articles = match self.source_articles(&chunks) {
            Ok(v) => v,
            Err(e) => {
                emit!(PhaseUpdate::Failed { message: e.to_string() });
                return;
            }
        };
        emit!(PhaseUpdate::SourceArticles {
            articles: source_articles.clone()
        });

        let deduped_paths = dedup_reasoning_paths(reasoning_paths);

        let response = GraphRagResponse {
            query: question.clone(),
            answer,
            keywords,
            related_nodes,
            reasoning_paths: deduped_paths,
            graph_paths,
            source_articles,
        };

        if let Err(e) = self.persist(&response) {
            emit!(PhaseUpdate::Failed { message: e.to_string() });
            return;
        }

        info!(answer_len = response.answer.len(), "graphrag query completed");
        emit!(PhaseUpdate::Completed { response });
    }

    async fn related_nodes(&self, keywords: &[String]) -> Result<Vec<RelatedNode>, CoreError> {
        if keywords.is_empty() {
            return Ok(Vec::new());
        }
        let vectors = self.embedder.embed_batch(keywords).await?;

        let mut best: HashMap<String, RelatedNode> = HashMap::new();
        for vector in vectors {
            let scored = self.store.read(|conn| {
                embeddings::search_similar_nodes(
                    conn,
                    &vector,
                    self.config.node_distance_threshold,
                    PER_KEYWORD_NODE_LIMIT,
                )
            })?;
            for node in scored {
                best.entry(node.node_id.clone())
                    .and_modify(|existing| {
                        if node.distance < existing.distance {
                            existing.distance = node.distance;
                        }
                    })
                    .or_insert(RelatedNode {
                        node_id: node.node_id,
                        label: node.label,
                        distance: node.distance,
                    });
            }
        }
        let mut out: Vec<RelatedNode> = best.into_values().collect();
        out.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap());
        Ok(out)
    }

    async fn related_chunks(
        &self,
        question: &str,
        related_nodes: &[RelatedNode],
    ) -> Result<Vec<embeddings::ScoredChunk>, CoreError> {
        let question_vector = self.embedder.embed(question).await?;
        let chunks = self.store.read(|conn| {
            embeddings::search_similar_chunks(
                conn,
                &question_vector,
                self.config.chunk_distance_threshold,
                self.config.max_chunks,
            )
        })?;
        if !chunks.is_empty() {
            return Ok(chunks);
        }
        let node_ids: Vec<String> = related_nodes.iter().map(|n| n.node_id.clone()).collect();
        self.store
            .read(|conn| embeddings::chunks_via_provenance(conn, &node_ids, self.config.max_chunks))
    }

    fn gather_paths(
        &self,
        related_nodes: &[RelatedNode],
    ) -> Result<(Vec<ReasoningPath>, Vec<GraphPathEdge>), CoreError> {
        let node_ids: Vec<String> = related_nodes.iter().map(|n| n.node_id.clone()).collect();
        let node_labels: HashMap<String, String> = related_nodes
            .iter()
            .map(|n| (n.node_id.clone(), n.label.clone()))
            .collect();

        let index = self.store.read(|conn| PathIndex::build(conn, self.config.s))?;

        let mut reasoning_paths = Vec::new();
        let mut path_edge_ids: BTreeSet<String> = BTreeSet::new();
        for i in 0..node_ids.len() {
            for j in (i + 1)..node_ids.len() {
                let pair = [node_ids[i].clone(), node_ids[j].clone()];
                for result in index.find_paths(&pair, self.config.depth_cap, self.config.max_paths) {
                    path_edge_ids.extend(result.edge_ids.iter().cloned());
                    reasoning_paths.push(ReasoningPath {
                        source: node_labels[&node_ids[i]].clone(),
                        target: node_labels[&node_ids[j]].clone(),
                        edge_ids: result.edge_ids,
                        hop_intersections: result.hop_intersections,
                    });
                }
            }
        }

        let direct_edge_ids = self
            .store
            .read(|conn| hypergraph::edges_touching_nodes(conn, &node_ids, DIRECT_EDGES_LIMIT))?;

        let mut combined: BTreeSet<String> = path_edge_ids.clone();
        combined.extend(direct_edge_ids);
        let combined: Vec<String> = combined.into_iter().collect();

        let details = self.store.read(|conn| hypergraph::load_edge_details(conn, &combined))?;
        let graph_paths = details
            .into_iter()
            .map(|d| GraphPathEdge {
                relation: display_relation(&d.edge_id).to_string(),
                edge_id: d.edge_id,
                sources: d.sources,
                targets: d.targets,
                article_id: d.article_id,
            })
            .collect();

        Ok((reasoning_paths, graph_paths))
    }

    fn source_articles(&self, chunks: &[embeddings::ScoredChunk]) -> Result<Vec<SourceArticle>, CoreError> {
        let mut by_article: HashMap<String, Vec<i64>> = HashMap::new();
        for chunk in chunks {
            by_article.entry(chunk.article_id.clone()).or_default().push(chunk.chunk_index);
        }
        let mut out = Vec::with_capacity(by_article.len());
        for (article_id, chunk_indices) in by_article {
            let meta = self.store.read(|conn| feed_items::get_metadata(conn, &article_id))?;
            let Some(meta) = meta else { continue };
            out.push(SourceArticle {
                article_id: meta.id,
                title: meta.title,
                link: meta.link,
                chunk_indices,
            });
        }
        out.sort_by(|a, b| a.article_id.cmp(&b.article_id));
        Ok(out)
    }

    fn persist(&self, response: &GraphRagResponse) -> Result<(), CoreError> {
        let id = new_id();
        let related_nodes_json = serde_json::to_string(&response.related_nodes).map_err(|e| CoreError::Malformed {
            message: format!("related nodes json: {e}"),
        })?;
        let reasoning_paths_json =
            serde_json::to_string(&response.reasoning_paths).map_err(|e| CoreError::Malformed {
                message: format!("reasoning paths json: {e}"),
            })?;
        let graph_paths_json = serde_json::to_string(&response.graph_paths).map_err(|e| CoreError::Malformed {
            message: format!("graph paths json: {e}"),
        })?;
        let source_articles_json =
            serde_json::to_string(&response.source_articles).map_err(|e| CoreError::Malformed {
                message: format!("source articles json: {e}"),
            })?;

        self.store.write(|tx| {
            query_history::insert(
                tx,
                &query_history::NewQueryHistory {
                    id: &id,
                    query: &response.query,
                    answer: Some(&response.answer),
                    related_nodes_json: &related_nodes_json,
                    reasoning_paths_json: &reasoning_paths_json,
                    graph_paths_json: &graph_paths_json,
                    source_articles_json: &source_articles_json,
                },
            )
        })
    }
}

/// Deduplicates reasoning paths by `(source, target)`, keeping the first
/// occurrence of each pair (spec.md §4.8 step 6).
fn dedup_reasoning_paths(paths: Vec<ReasoningPath>) -> Vec<ReasoningPath> {
    let mut seen: BTreeSet<(String, String)> = BTreeSet::new();
    let mut out = Vec::new();
    for path in paths {
        let key = (path.source.clone(), path.target.clone());
        if seen.insert(key) {
            out.push(path);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ReasoningPath;

    #[test]
    fn dedup_reasoning_paths_keeps_first_per_pair() {
        let paths = vec![
            ReasoningPath {
                source: "A".into(),
                target: "B".into(),
                edge_ids: vec!["e1".into()],
                hop_intersections: vec![],
            },
            ReasoningPath {
                source: "A".into(),
                target: "B".into(),
                edge_ids: vec!["e2".into()],
                hop_intersections: vec![],
            },
            ReasoningPath {
                source: "A".into(),
                target: "C".into(),
                edge_ids: vec!["e3".into()],
                hop_intersections: vec![],
            },
        ];
        let deduped = dedup_reasoning_paths(paths);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].edge_ids, vec!["e1".to_string()]);
    }

    mod phase_order {
        use std::sync::Arc;

        use newsgraph_core::domain::{ExtractedEdgeMetadata, ExtractedHypergraph};
        use newsgraph_core::traits::{ChatToken, Embedder, LlmProvider};
        use newsgraph_storage::{feed_items, hypergraph, Store};
        use tokio_stream::StreamExt;
        use tokio_util::sync::CancellationToken;

        use super::super::*;

        mockall::mock! {
            pub Llm {}

            #[async_trait::async_trait]
            impl LlmProvider for Llm {
                fn provider_name(&self) -> &str;
                async fn complete(&self, system: &str, prompt: &str) -> Result<String, CoreError>;
                async fn complete_stream(
                    &self,
                    system: &str,
                    prompt: &str,
                    sink: tokio::sync::mpsc::Sender<ChatToken>,
                ) -> Result<(), CoreError>;
            }
        }

        mockall::mock! {
            pub Embed {}

            #[async_trait::async_trait]
            impl Embedder for Embed {
                fn dimensions(&self) -> usize;
                fn model_name(&self) -> &str;
                async fn embed(&self, text: &str) -> Result<Vec<f32>, CoreError>;
                async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CoreError>;
            }
        }

        /// Seeds one article with a single hyperedge `Acme -- partnered_with
        /// --> Widgets Inc`, grounded in one chunk, with node embeddings that
        /// exactly match the keyword vectors the mocked embedder will return
        /// (so keyword-driven node retrieval finds both), and a chunk
        /// embedding deliberately far from the mocked question vector (so
        /// direct chunk search comes up empty and retrieval falls back to
        /// provenance, as spec.md §4.8 step 3 requires).
        fn seed_store(store: &Store) {
            let mut extracted = ExtractedHypergraph::default();
            extracted.incidence_dict.insert(
                "partnered_with_chunk0_1".to_string(),
                vec!["Acme".to_string(), "Widgets Inc".to_string()],
            );
            extracted.metadata.push(ExtractedEdgeMetadata {
                edge: "partnered_with_chunk0_1".to_string(),
                source: vec!["Acme".to_string()],
                target: vec!["Widgets Inc".to_string()],
                chunk_id: "chunk0".to_string(),
            });
            extracted.embeddings.insert("Acme".to_string(), vec![1.0, 0.0, 0.0]);
            extracted.embeddings.insert("Widgets Inc".to_string(), vec![0.0, 1.0, 0.0]);

            let full_content = "Acme announced a new partnership with Widgets Inc today.";
            let chunk_embeddings = vec![vec![0.0, 0.0, 1.0]];

            store
                .write(|tx| {
                    feed_items::upsert(
                        tx,
                        &feed_items::NewFeedItem {
                            id: "article-1",
                            source_id: "feed-1",
                            guid: "guid-1",
                            title: "Acme partners with Widgets Inc",
                            link: Some("https://example.com/article-1"),
                            pub_date: None,
                            description: None,
                            full_content: Some(full_content),
                            author: None,
                        },
                    )?;
                    hypergraph::persist_extraction(tx, "article-1", full_content, &extracted, "mock-model", &chunk_embeddings)?;
                    Ok(())
                })
                .unwrap();
        }

        /// Asserts the pipeline emits `PhaseUpdate`s in the exact order
        /// spec.md §4.8/§8 require: status updates interleaved with
        /// keywords, related nodes, reasoning paths, graph paths, answer
        /// tokens, source articles, and finally completed — with no
        /// `Failed` anywhere in a successful run.
        #[tokio::test]
        async fn query_stream_emits_phase_updates_in_order() {
            let store = Arc::new(Store::open_in_memory().unwrap());
            seed_store(&store);

            let mut llm = MockLlm::new();
            llm.expect_complete()
                .times(1)
                .returning(|_system, _prompt| Ok(r#"{"keywords": ["acme", "widgets"]}"#.to_string()));
            llm.expect_complete_stream().times(1).returning(|_system, _prompt, sink| {
                let _ = sink.try_send(ChatToken {
                    text: "a".to_string(),
                    is_final: false,
                });
                let _ = sink.try_send(ChatToken {
                    text: " b".to_string(),
                    is_final: false,
                });
                let _ = sink.try_send(ChatToken {
                    text: " c".to_string(),
                    is_final: false,
                });
                let _ = sink.try_send(ChatToken {
                    text: String::new(),
                    is_final: true,
                });
                Ok(())
            });

            let mut embedder = MockEmbed::new();
            embedder.expect_embed_batch().times(1).returning(|_texts| {
                Ok(vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]])
            });
            embedder.expect_embed().times(1).returning(|_text| Ok(vec![1.0, 0.0, 0.0]));

            let pipeline = Arc::new(GraphRagPipeline {
                store,
                llm: Arc::new(llm),
                embedder: Arc::new(embedder),
                config: GraphRagConfig::default(),
            });

            let mut stream = pipeline.query_stream(
                "How is Acme connected to Widgets Inc?".to_string(),
                None,
                CancellationToken::new(),
            );

            let mut updates = Vec::new();
            while let Some(update) = stream.next().await {
                updates.push(update);
            }

            let phase_names: Vec<&str> = updates
                .iter()
                .map(|u| match u {
                    PhaseUpdate::Status { .. } => "status",
                    PhaseUpdate::Keywords { .. } => "keywords",
                    PhaseUpdate::RelatedNodes { .. } => "related_nodes",
                    PhaseUpdate::ReasoningPaths { .. } => "reasoning_paths",
                    PhaseUpdate::GraphPaths { .. } => "graph_paths",
                    PhaseUpdate::AnswerToken { .. } => "answer_token",
                    PhaseUpdate::SourceArticles { .. } => "source_articles",
                    PhaseUpdate::Completed { .. } => "completed",
                    PhaseUpdate::Failed { .. } => "failed",
                })
                .collect();

            assert!(!phase_names.contains(&"failed"), "pipeline failed: {phase_names:?}");
            assert_eq!(phase_names.last(), Some(&"completed"));

            let keywords_pos = phase_names.iter().position(|&p| p == "keywords").unwrap();
            let related_nodes_pos = phase_names.iter().position(|&p| p == "related_nodes").unwrap();
            let reasoning_paths_pos = phase_names.iter().position(|&p| p == "reasoning_paths").unwrap();
            let graph_paths_pos = phase_names.iter().position(|&p| p == "graph_paths").unwrap();
            let first_answer_token_pos = phase_names.iter().position(|&p| p == "answer_token").unwrap();
            let source_articles_pos = phase_names.iter().position(|&p| p == "source_articles").unwrap();
            let completed_pos = phase_names.iter().position(|&p| p == "completed").unwrap();

            assert!(keywords_pos < related_nodes_pos);
            assert!(related_nodes_pos < reasoning_paths_pos);
            assert!(reasoning_paths_pos < graph_paths_pos);
            assert!(graph_paths_pos < first_answer_token_pos);
            assert!(first_answer_token_pos < source_articles_pos);
            assert!(source_articles_pos < completed_pos);

            let PhaseUpdate::Keywords { keywords } = &updates[keywords_pos] else {
                panic!("expected keywords update");
            };
            assert_eq!(keywords, &vec!["acme".to_string(), "widgets".to_string()]);

            let PhaseUpdate::RelatedNodes { nodes } = &updates[related_nodes_pos] else {
                panic!("expected related_nodes update");
            };
            assert_eq!(nodes.len(), 2);

            let PhaseUpdate::GraphPaths { edges } = &updates[graph_paths_pos] else {
                panic!("expected graph_paths update");
            };
            assert!(!edges.is_empty(), "expected the direct edge to surface as a graph path");

            let PhaseUpdate::SourceArticles { articles } = &updates[source_articles_pos] else {
                panic!("expected source_articles update");
            };
            assert_eq!(articles.len(), 1);
            assert_eq!(articles[0].article_id, "article-1");

            let PhaseUpdate::Completed { response } = &updates[completed_pos] else {
                panic!("expected completed update");
            };
            assert_eq!(response.answer, "a b c");
        }
    }
}
