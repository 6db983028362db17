//! GraphRAG retrieval and the deep-analysis two-agent workflow.
//!
//! The pipeline answers a question by pulling keyword-relevant nodes and
//! question-relevant chunks out of the hypergraph, walking s-connected
//! paths between the nodes it found, and grounding an LLM call in the
//! assembled context. It streams a typed [`types::PhaseUpdate`] per step
//! rather than returning a single future, so a caller can show retrieval
//! progress before the answer itself starts streaming.

pub mod context;
pub mod deep_analysis;
pub mod keywords;
pub mod pipeline;
pub mod prompts;
pub mod types;

pub use pipeline::{GraphRagConfig, GraphRagPipeline};
pub use types::{GraphPathEdge, GraphRagResponse, PhaseUpdate, ReasoningPath, RelatedNode, SourceArticle};
