//! Keyword extraction for the GraphRAG pipeline's first phase (spec.md
//! §4.8 step 1): an LLM call demanding strict JSON, falling back to
//! heuristic tokenization on provider error or parse failure.

use std::collections::HashSet;

use tracing::warn;

use newsgraph_core::error::CoreError;
use newsgraph_core::traits::LlmProvider;

use crate::prompts::KEYWORD_EXTRACTION_SYSTEM;

const MAX_KEYWORDS: usize = 5;
const MIN_TOKEN_LEN: usize = 3;

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "can", "had", "her", "was", "one",
    "our", "out", "day", "get", "has", "him", "his", "how", "man", "new", "now", "old", "see",
    "two", "way", "who", "boy", "did", "its", "let", "put", "say", "she", "too", "use", "what",
    "when", "where", "which", "with", "this", "that", "have", "from", "they", "will", "would",
    "there", "their", "about", "into", "than", "then", "them", "these", "those", "were", "been",
    "being", "does", "doing", "each", "more", "most", "other", "some", "such", "only", "over",
    "same", "very", "just",
];

#[derive(Debug, Clone, serde::Deserialize)]
struct KeywordsResponse {
    keywords: Vec<String>,
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

/// Lowercase-tokenizes `question`, drops stop words and short tokens,
/// dedupes, and caps at [`MAX_KEYWORDS`] — the fallback path spec.md §4.8
/// step 1 and §7 both call for on provider error or malformed JSON.
pub fn heuristic_keywords(question: &str) -> Vec<String> {
    let stop_words: HashSet<&str> = STOP_WORDS.iter().copied().collect();
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for token in question.split(|c: char| !c.is_alphanumeric()) {
        let token = token.to_lowercase();
        if token.len() <= MIN_TOKEN_LEN - 1 || stop_words.contains(token.as_str()) {
            continue;
        }
        if seen.insert(token.clone()) {
            out.push(token);
            if out.len() >= MAX_KEYWORDS {
                break;
            }
        }
    }
    out
}

/// Extracts keywords from `question` via the LLM, falling back to
/// [`heuristic_keywords`] on a provider error or unparseable response.
pub async fn extract_keywords(llm: &dyn LlmProvider, question: &str) -> Vec<String> {
    match try_llm_keywords(llm, question).await {
        Ok(keywords) if !keywords.is_empty() => keywords,
        Ok(_) => {
            warn!("llm returned no keywords, falling back to heuristic extraction");
            heuristic_keywords(question)
        }
        Err(e) => {
            warn!(error = %e, "keyword extraction failed, falling back to heuristic extraction");
            heuristic_keywords(question)
        }
    }
}

async fn try_llm_keywords(llm: &dyn LlmProvider, question: &str) -> Result<Vec<String>, CoreError> {
    let raw = llm.complete(KEYWORD_EXTRACTION_SYSTEM, question).await?;
    let cleaned = strip_code_fences(&raw);
    let parsed: KeywordsResponse = serde_json::from_str(&cleaned).map_err(|e| CoreError::Malformed {
        message: format!("keyword extraction JSON: {e}"),
    })?;
    Ok(parsed.keywords.into_iter().take(MAX_KEYWORDS).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heuristic_keywords_drops_stop_words_and_short_tokens() {
        let kws = heuristic_keywords("What is the relationship between Acme and Widgets Inc?");
        assert!(kws.contains(&"acme".to_string()));
        assert!(kws.contains(&"widgets".to_string()));
        assert!(!kws.contains(&"what".to_string()));
        assert!(!kws.contains(&"the".to_string()));
    }

    #[test]
    fn heuristic_keywords_caps_at_five_and_dedupes() {
        let kws = heuristic_keywords("alpha alpha beta gamma delta epsilon zeta eta theta");
        assert_eq!(kws.len(), MAX_KEYWORDS);
        assert_eq!(kws.iter().collect::<HashSet<_>>().len(), kws.len());
    }

    #[test]
    fn heuristic_keywords_handles_empty_input() {
        assert!(heuristic_keywords("").is_empty());
        assert!(heuristic_keywords("the and for").is_empty());
    }

    struct FailingLlm;

    #[async_trait::async_trait]
    impl newsgraph_core::traits::LlmProvider for FailingLlm {
        fn provider_name(&self) -> &str {
            "failing"
        }

        async fn complete(&self, _system: &str, _prompt: &str) -> Result<String, CoreError> {
            Err(CoreError::Malformed {
                message: "not json".into(),
            })
        }

        async fn complete_stream(
            &self,
            _system: &str,
            _prompt: &str,
            _sink: tokio::sync::mpsc::Sender<newsgraph_core::traits::ChatToken>,
        ) -> Result<(), CoreError> {
            unimplemented!("not exercised by this test")
        }
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn extract_keywords_warns_and_falls_back_on_llm_error() {
        let llm = FailingLlm;
        let kws = extract_keywords(&llm, "What is the relationship between Acme and Widgets Inc?").await;
        assert!(kws.contains(&"acme".to_string()));
        assert!(tracing_test::logs_contain("keyword extraction failed, falling back to heuristic extraction"));
    }
}
