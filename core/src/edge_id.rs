//! Parsing helpers for the `"<relation>_chunk<N>_<k>"` edge-id wire format.
//!
//! There are two call sites that read a relation out of an edge id, and
//! spec.md describes them slightly differently:
//!
//! - At ingest time (persisting a freshly extracted hyperedge), the
//!   relation is taken as the suffix after the edge id's first `_`,
//!   falling back to the whole id if there is no `_`. This is what gets
//!   written into the `label` column.
//! - At read time (GraphRAG path display, §4.8/§9), the edge id is the
//!   *source of truth* for the relation — the `label` column may be stale
//!   — and is parsed by stripping the trailing `_chunk<N>_<k>` suffix,
//!   which is robust to relations that themselves contain underscores
//!   (e.g. `partnered_with`).
//!
//! [`ingest_relation`] and [`display_relation`] implement these two rules
//! separately rather than unifying them, since for a relation with an
//! underscore in it the two genuinely disagree and spec.md does not
//! reconcile them — see DESIGN.md.

/// Ingest-time relation extraction: suffix after the first `_`.
pub fn ingest_relation(edge_id: &str) -> String {
    match edge_id.split_once('_') {
        Some((_, rest)) if !rest.is_empty() => rest.to_string(),
        _ => edge_id.to_string(),
    }
}

/// Read-time relation extraction: strip the trailing `_chunk<N>_<k>` (or
/// `_chunk<N>`) suffix. Falls back to the whole id if the suffix isn't
/// found, matching spec.md's "fall back to the column only when parsing
/// fails" guidance applied at the id level.
pub fn display_relation(edge_id: &str) -> &str {
    match edge_id.rfind("_chunk") {
        Some(idx) => {
            let candidate = &edge_id[..idx];
            if candidate.is_empty() {
                edge_id
            } else {
                candidate
            }
        }
        None => edge_id,
    }
}

/// Parses the zero-based chunk index and disambiguating ordinal out of an
/// edge id of the form `"<relation>_chunk<N>_<k>"`. Returns `None` if the
/// id doesn't match that shape (e.g. it has no ordinal suffix).
pub fn parse_chunk_and_ordinal(edge_id: &str) -> Option<(i64, i64)> {
    let idx = edge_id.rfind("_chunk")?;
    let rest = &edge_id[idx + "_chunk".len()..];
    let (chunk_part, ordinal_part) = rest.split_once('_')?;
    let chunk_index: i64 = chunk_part.parse().ok()?;
    let ordinal: i64 = ordinal_part.parse().ok()?;
    Some((chunk_index, ordinal))
}

/// Parses the trailing integer out of a `chunkID` metadata field of the
/// form `"chunkNNN"`.
pub fn parse_chunk_id_field(chunk_id: &str) -> Option<i64> {
    chunk_id.strip_prefix("chunk")?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingest_relation_takes_suffix_after_first_underscore() {
        assert_eq!(ingest_relation("acquired_chunk0_0"), "chunk0_0");
        assert_eq!(ingest_relation("noseparator"), "noseparator");
    }

    #[test]
    fn display_relation_strips_trailing_chunk_suffix() {
        assert_eq!(display_relation("partnered_with_chunk3_1"), "partnered_with");
        assert_eq!(display_relation("acquired_chunk0_0"), "acquired");
        assert_eq!(display_relation("no_chunk_marker_here"), "no");
    }

    #[test]
    fn parse_chunk_and_ordinal_extracts_both_integers() {
        assert_eq!(parse_chunk_and_ordinal("partnered_with_chunk3_1"), Some((3, 1)));
        assert_eq!(parse_chunk_and_ordinal("no_chunk_marker"), None);
    }

    #[test]
    fn parse_chunk_id_field_extracts_trailing_integer() {
        assert_eq!(parse_chunk_id_field("chunk42"), Some(42));
        assert_eq!(parse_chunk_id_field("notachunk"), None);
    }
}
