//! The pipeline's JSON-serializable output types (spec.md §3/§4.8): these
//! are exactly the shapes persisted into `query_history`'s `_json` columns,
//! so `GraphRagResponse`'s fields round-trip through storage unchanged.

use serde::{Deserialize, Serialize};

/// A node surfaced by keyword-driven retrieval (spec.md §4.8 step 2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedNode {
    pub node_id: String,
    pub label: String,
    pub distance: f32,
}

/// One s-connected path between two related nodes (spec.md §4.4/§4.8 step 4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningPath {
    pub source: String,
    pub target: String,
    pub edge_ids: Vec<String>,
    pub hop_intersections: Vec<Vec<String>>,
}

/// One edge surfaced for display, with the relation parsed from its edge
/// id (spec.md §4.8 step 4 — never the stored `label` column).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphPathEdge {
    pub edge_id: String,
    pub relation: String,
    pub sources: Vec<String>,
    pub targets: Vec<String>,
    pub article_id: Option<String>,
}

/// A source article cited in the assembled context (spec.md §4.8 step 6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceArticle {
    pub article_id: String,
    pub title: String,
    pub link: Option<String>,
    pub chunk_indices: Vec<i64>,
}

/// The finalized output of one GraphRAG query (spec.md §4.8 step 6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphRagResponse {
    pub query: String,
    pub answer: String,
    pub keywords: Vec<String>,
    pub related_nodes: Vec<RelatedNode>,
    pub reasoning_paths: Vec<ReasoningPath>,
    pub graph_paths: Vec<GraphPathEdge>,
    pub source_articles: Vec<SourceArticle>,
}

/// One typed update in the GraphRAG pipeline's progressive stream
/// (spec.md §4.8): `status | keywords | related_nodes | reasoning_paths |
/// graph_paths | answer_token | source_articles | completed | failed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum PhaseUpdate {
    Status { message: String },
    Keywords { keywords: Vec<String> },
    RelatedNodes { nodes: Vec<RelatedNode> },
    ReasoningPaths { paths: Vec<ReasoningPath> },
    GraphPaths { edges: Vec<GraphPathEdge> },
    AnswerToken { text: String },
    SourceArticles { articles: Vec<SourceArticle> },
    Completed { response: GraphRagResponse },
    Failed { message: String },
}
