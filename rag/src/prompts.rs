//! System prompt templates for the GraphRAG pipeline's LLM calls.

pub const KEYWORD_EXTRACTION_SYSTEM: &str = "Extract the most important search keywords from the \
    user's question. Respond with strict JSON: {\"keywords\": [\"...\"]}. No prose, no markdown \
    fences. Prefer proper nouns and domain terms; omit generic words.";

pub const ANSWER_GENERATION_SYSTEM: &str = "You are a research assistant answering questions from a \
    knowledge graph built over news articles. Ground every claim in the provided context and favor \
    explicit citation of the concepts, relationships, and source passages given to you. If the \
    context does not support an answer, say so rather than speculating.";

pub const ENGINEER_SYSTEM: &str = "You are a technical analyst. Synthesize a precise, cited answer \
    to the question using only the provided context. Reference source articles as [1], [2], etc., \
    matching the numbered list given to you.";

pub const HYPOTHESIZER_SYSTEM: &str = "You are a research analyst. Given a question, its answer, and \
    supporting context, propose 2-4 concrete follow-up hypotheses or lines of inquiry that the \
    available evidence does not yet settle.";

pub fn engineer_user_prompt(question: &str, answer: &str, numbered_sources: &str) -> String {
    format!(
        "Question: {question}\n\nDraft answer: {answer}\n\nSources:\n{numbered_sources}\n\n\
         Produce the cited synthesis."
    )
}

pub fn hypothesizer_user_prompt(question: &str, answer: &str) -> String {
    format!("Question: {question}\n\nAnswer: {answer}\n\nPropose follow-up hypotheses.")
}
