//! Domain types for the knowledge-graph core: feed items, chunks, hypergraph
//! nodes/edges, embeddings, clusters, and the bookkeeping tables that tie
//! them together.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A raw article as pulled from a feed, before chunking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedItem {
    pub id: String,
    pub feed_url: String,
    pub title: String,
    pub full_content: String,
    pub published_at: Option<DateTime<Utc>>,
    pub fetched_at: DateTime<Utc>,
    pub processed: bool,
}

/// A deterministic, immutable slice of an article's `full_content`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleChunk {
    pub id: String,
    pub article_id: String,
    pub chunk_index: i64,
    pub text: String,
}

/// The role a node plays within a hyperedge's ordered participant list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidenceRole {
    Source,
    Target,
    Member,
}

/// An entity or concept in the hypergraph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HypergraphNode {
    pub id: String,
    pub label: String,
    pub node_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An n-ary relation grounded in one or more source chunks: a verb plus an
/// ordered list of source and target participants, reconstructed from the
/// incidence table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hyperedge {
    pub id: String,
    pub relation: String,
    pub article_id: String,
    pub chunk_index: i64,
    pub created_at: DateTime<Utc>,
}

impl Hyperedge {
    /// The display-source-of-truth id, e.g. `"located_in_chunk3_1"`.
    ///
    /// Callers must parse the relation out of this id rather than trust the
    /// `relation` column, which can go stale after a node merge rewrites
    /// incidences without touching the edge row itself.
    pub fn display_id(relation: &str, chunk_index: i64, ordinal: u32) -> String {
        format!("{relation}_chunk{chunk_index}_{ordinal}")
    }
}

/// One row of the incidence table: a node's participation in an edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incidence {
    pub edge_id: String,
    pub node_id: String,
    pub role: IncidenceRole,
    pub position: i64,
}

/// Links a hyperedge back to the chunk it was extracted from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleEdgeProvenance {
    pub edge_id: String,
    pub chunk_id: String,
}

/// Embedding vector for a node label, stored separately from the node row so
/// that re-embedding doesn't require rewriting graph structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeEmbedding {
    pub node_id: String,
    pub vector: Vec<f32>,
    pub model: String,
}

/// Embedding vector for a chunk, used for retrieval in the GraphRAG pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkEmbedding {
    pub chunk_id: String,
    pub vector: Vec<f32>,
    pub model: String,
}

/// Feature vector built from a single hyperedge for clustering: the
/// IDF-weighted mean-pooled source/target embeddings, their normalized
/// difference, and a one-hot relation family.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventVector {
    pub edge_id: String,
    pub vector: Vec<f32>,
}

/// One discovered event cluster from an HDBSCAN run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    pub id: String,
    pub run_id: String,
    pub label: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Membership of an edge (event) in a cluster, with HDBSCAN's soft score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterMember {
    pub cluster_id: String,
    pub edge_id: String,
    pub membership_score: f64,
}

/// A representative edge chosen to stand in for a cluster in summaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterExemplar {
    pub cluster_id: String,
    pub edge_id: String,
    pub rank: i64,
}

/// An audit row recording that `source_node` was merged into `target_node`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeMergeHistory {
    pub id: String,
    pub source_node_id: String,
    pub target_node_id: String,
    pub similarity: f64,
    pub merged_at: DateTime<Utc>,
}

/// A record of a GraphRAG query, kept for the query-history CRUD surface.
///
/// The four `_json` fields carry the serialized arrays from a
/// `GraphRagResponse` (spec.md §4.8/§8's round-trip law); `synthesized_analysis`
/// and `hypotheses` are filled in only after the deep-analysis workflow
/// (§4.9) has run against this entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryHistoryEntry {
    pub id: String,
    pub query: String,
    pub answer: Option<String>,
    pub related_nodes_json: Option<String>,
    pub reasoning_paths_json: Option<String>,
    pub graph_paths_json: Option<String>,
    pub source_articles_json: Option<String>,
    pub synthesized_analysis: Option<String>,
    pub hypotheses: Option<String>,
    pub analyzed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// One row of an extraction's `metadata` list: which labels played the
/// source/target role in a given edge, and which chunk it was grounded in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedEdgeMetadata {
    pub edge: String,
    #[serde(default)]
    pub source: Vec<String>,
    #[serde(default)]
    pub target: Vec<String>,
    #[serde(rename = "chunkID")]
    pub chunk_id: String,
}

/// The LLM's hypergraph extraction for one article, prior to persistence.
///
/// `incidence_dict` maps each edge id to its ordered participant labels;
/// `metadata` disambiguates which of those labels are sources vs targets
/// and which chunk grounds the edge; `embeddings` carries one vector per
/// distinct node label seen across the extraction.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExtractedHypergraph {
    pub incidence_dict: std::collections::BTreeMap<String, Vec<String>>,
    pub metadata: Vec<ExtractedEdgeMetadata>,
    pub embeddings: std::collections::BTreeMap<String, Vec<f32>>,
}

/// Generates a fresh random identifier for a new domain row.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_id_embeds_relation_and_chunk() {
        let id = Hyperedge::display_id("located_in", 3, 1);
        assert_eq!(id, "located_in_chunk3_1");
    }

    #[test]
    fn new_id_produces_distinct_values() {
        assert_ne!(new_id(), new_id());
    }
}
