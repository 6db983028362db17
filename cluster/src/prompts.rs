//! System prompt for the optional LLM cluster-labeling pass (spec.md §4.7
//! step 6).

pub const CLUSTER_LABELING_SYSTEM: &str = "You are labeling a cluster of related news events for a \
    knowledge graph browser. Given the cluster's top entities, top relation families, and a sample \
    of representative subject-verb-object sentences, respond with strict JSON: \
    {\"title\": \"...\", \"summary\": \"...\"}. The title should be a short, specific headline (under \
    10 words); the summary 1-2 sentences. No prose, no markdown fences.";

pub fn cluster_labeling_prompt(top_entities: &[String], top_families: &[String], exemplar_sentences: &[String]) -> String {
    let entities = top_entities.join(", ");
    let families = top_families.join(", ");
    let sentences = exemplar_sentences
        .iter()
        .map(|s| format!("- {s}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Top entities: {entities}\nTop relation families: {families}\n\nRepresentative events:\n{sentences}"
    )
}
