//! The deep-analysis two-agent workflow (spec.md §4.9): an Engineer agent
//! synthesizes a cited answer from the sources that backed a prior
//! GraphRAG query, then a Hypothesizer agent proposes follow-up lines of
//! inquiry the evidence doesn't yet settle. Both calls run serially — the
//! Hypothesizer is grounded in the Engineer's own output, not the raw
//! context again.

use std::sync::Arc;

use newsgraph_core::error::CoreError;
use newsgraph_core::traits::LlmProvider;
use newsgraph_storage::Store;

use crate::prompts::{engineer_user_prompt, hypothesizer_user_prompt, ENGINEER_SYSTEM, HYPOTHESIZER_SYSTEM};
use crate::types::{GraphRagResponse, SourceArticle};

/// The persisted output of one deep-analysis run.
#[derive(Debug, Clone)]
pub struct DeepAnalysisResult {
    pub synthesized_analysis: String,
    pub hypotheses: String,
}

/// Runs the Engineer then Hypothesizer agents over a previously completed
/// [`GraphRagResponse`], then persists both onto its `query_history` row.
pub async fn run(
    store: &Store,
    llm: &dyn LlmProvider,
    query_history_id: &str,
    response: &GraphRagResponse,
) -> Result<DeepAnalysisResult, CoreError> {
    let numbered_sources = number_sources(&response.source_articles);

    let synthesized_analysis = llm
        .complete(
            ENGINEER_SYSTEM,
            &engineer_user_prompt(&response.query, &response.answer, &numbered_sources),
        )
        .await?;

    let hypotheses = llm
        .complete(
            HYPOTHESIZER_SYSTEM,
            &hypothesizer_user_prompt(&response.query, &synthesized_analysis),
        )
        .await?;

    let id = query_history_id.to_string();
    let synthesized = synthesized_analysis.clone();
    let hyps = hypotheses.clone();
    store.write(move |tx| newsgraph_storage::query_history::record_deep_analysis(tx, &id, &synthesized, &hyps))?;

    Ok(DeepAnalysisResult {
        synthesized_analysis,
        hypotheses,
    })
}

/// Runs deep analysis against a response the caller already has in hand,
/// using a shared provider handle (helper for callers that hold an
/// `Arc<dyn LlmProvider>` rather than a borrowed one).
pub async fn run_with_shared_llm(
    store: &Store,
    llm: Arc<dyn LlmProvider>,
    query_history_id: &str,
    response: &GraphRagResponse,
) -> Result<DeepAnalysisResult, CoreError> {
    run(store, llm.as_ref(), query_history_id, response).await
}

fn number_sources(sources: &[SourceArticle]) -> String {
    sources
        .iter()
        .enumerate()
        .map(|(i, s)| format!("[{}] {} ({})", i + 1, s.title, s.link.as_deref().unwrap_or("no link")))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_sources_formats_one_indexed_citations() {
        let sources = vec![
            SourceArticle {
                article_id: "a1".into(),
                title: "Acme Buys Widgets".into(),
                link: Some("https://example.com/a1".into()),
                chunk_indices: vec![0],
            },
            SourceArticle {
                article_id: "a2".into(),
                title: "Widgets Inc Expands".into(),
                link: None,
                chunk_indices: vec![1, 2],
            },
        ];
        let numbered = number_sources(&sources);
        assert!(numbered.contains("[1] Acme Buys Widgets"));
        assert!(numbered.contains("[2] Widgets Inc Expands (no link)"));
    }
}
