//! Markdown context assembly for answer generation (spec.md §4.8 step 5):
//! Relevant Concepts, Reasoning Paths, Relationships, Source Content.

use newsgraph_storage::embeddings::ScoredChunk;

use crate::types::{GraphPathEdge, ReasoningPath, RelatedNode};

/// Assembles the four-section Markdown context the answer-generation LLM
/// call is grounded in.
pub fn assemble_context(
    related_nodes: &[RelatedNode],
    reasoning_paths: &[ReasoningPath],
    graph_paths: &[GraphPathEdge],
    chunks: &[ScoredChunk],
) -> String {
    let mut out = String::new();

    out.push_str("## Relevant Concepts\n\n");
    if related_nodes.is_empty() {
        out.push_str("(none found)\n\n");
    } else {
        for node in related_nodes {
            out.push_str(&format!("- {}\n", node.label));
        }
        out.push('\n');
    }

    out.push_str("## Reasoning Paths\n\n");
    if reasoning_paths.is_empty() {
        out.push_str("(none found)\n\n");
    } else {
        for path in reasoning_paths {
            let hops = path
                .hop_intersections
                .iter()
                .map(|hop| hop.join(", "))
                .collect::<Vec<_>>()
                .join(" -> ");
            out.push_str(&format!("- {} to {} via {}\n", path.source, path.target, hops));
        }
        out.push('\n');
    }

    out.push_str("## Relationships\n\n");
    if graph_paths.is_empty() {
        out.push_str("(none found)\n\n");
    } else {
        for edge in graph_paths {
            out.push_str(&format!(
                "- {}: {} -> {}\n",
                edge.relation,
                edge.sources.join(", "),
                edge.targets.join(", "),
            ));
        }
        out.push('\n');
    }

    out.push_str("## Source Content\n\n");
    if chunks.is_empty() {
        out.push_str("(none found)\n");
    } else {
        for chunk in chunks {
            out.push_str(&format!("> {}\n\n", chunk.content.trim()));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembles_all_four_sections_in_order() {
        let ctx = assemble_context(
            &[RelatedNode {
                node_id: "n1".into(),
                label: "Acme".into(),
                distance: 0.1,
            }],
            &[],
            &[],
            &[],
        );
        let concepts_pos = ctx.find("## Relevant Concepts").unwrap();
        let paths_pos = ctx.find("## Reasoning Paths").unwrap();
        let rel_pos = ctx.find("## Relationships").unwrap();
        let source_pos = ctx.find("## Source Content").unwrap();
        assert!(concepts_pos < paths_pos && paths_pos < rel_pos && rel_pos < source_pos);
        assert!(ctx.contains("Acme"));
    }

    #[test]
    fn empty_sections_render_placeholder() {
        let ctx = assemble_context(&[], &[], &[], &[]);
        assert!(ctx.contains("(none found)"));
    }
}
