//! Deterministic article chunking.
//!
//! Splits `full_content` into an ordered list of chunks targeting
//! `TARGET_CHUNK_CHARS` characters each, falling back through
//! paragraph → line → sentence → word boundaries when a single unit is
//! larger than the target, and force-splitting any residue that is still
//! over budget after every boundary-aware strategy has been tried.
//!
//! Chunking is pure and deterministic: the same input always produces the
//! same ordered output, which is what lets re-chunking replace content at
//! a stable index rather than renumbering everything downstream.

use tracing::trace;

pub const TARGET_CHUNK_CHARS: usize = 800;

/// Splits `text` into ordered chunk strings targeting [`TARGET_CHUNK_CHARS`].
pub fn chunk_text(text: &str) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let paragraphs: Vec<&str> = split_on(text, "\n\n");
    let mut chunks = Vec::new();
    let mut buffer = String::new();

    for paragraph in paragraphs {
        if paragraph.trim().is_empty() {
            continue;
        }
        if buffer.len() + paragraph.len() + 2 <= TARGET_CHUNK_CHARS {
            if !buffer.is_empty() {
                buffer.push_str("\n\n");
            }
            buffer.push_str(paragraph);
            continue;
        }

        if !buffer.is_empty() {
            chunks.push(std::mem::take(&mut buffer));
        }

        if paragraph.len() <= TARGET_CHUNK_CHARS {
            buffer = paragraph.to_string();
        } else {
            for piece in split_oversized(paragraph) {
                chunks.push(piece);
            }
        }
    }

    if !buffer.is_empty() {
        chunks.push(buffer);
    }

    trace!(chars = text.len(), chunk_count = chunks.len(), "chunked article text");
    chunks
}

/// Splits a single unit too large for one chunk via line → sentence →
/// word-boundary fallback, force-splitting any leftover residue.
fn split_oversized(text: &str) -> Vec<String> {
    let lines = split_on(text, "\n");
    if lines.len() > 1 {
        return pack_units(lines.into_iter(), "\n");
    }

    let sentences = split_sentences(text);
    if sentences.len() > 1 {
        return pack_units(sentences.into_iter(), " ");
    }

    let words = split_on(text, " ");
    if words.len() > 1 {
        return pack_units(words.into_iter(), " ");
    }

    force_split(text)
}

/// Greedily packs boundary-delimited units into chunks near the target
/// size, recursing into [`split_oversized`] for any unit that alone
/// exceeds the target (e.g. one run-on sentence longer than 800 chars).
fn pack_units<'a>(units: impl Iterator<Item = &'a str>, joiner: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut buffer = String::new();

    for unit in units {
        if unit.trim().is_empty() {
            continue;
        }
        if unit.len() > TARGET_CHUNK_CHARS {
            if !buffer.is_empty() {
                chunks.push(std::mem::take(&mut buffer));
            }
            chunks.extend(split_oversized(unit));
            continue;
        }
        if buffer.len() + unit.len() + joiner.len() <= TARGET_CHUNK_CHARS {
            if !buffer.is_empty() {
                buffer.push_str(joiner);
            }
            buffer.push_str(unit);
        } else {
            chunks.push(std::mem::take(&mut buffer));
            buffer = unit.to_string();
        }
    }
    if !buffer.is_empty() {
        chunks.push(buffer);
    }
    chunks
}

/// Last-resort split of text with no usable boundary: cut every
/// `TARGET_CHUNK_CHARS` characters on a char boundary.
fn force_split(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let chars: Vec<char> = text.chars().collect();
    for piece in chars.chunks(TARGET_CHUNK_CHARS) {
        chunks.push(piece.iter().collect());
    }
    chunks
}

fn split_on<'a>(text: &'a str, sep: &str) -> Vec<&'a str> {
    text.split(sep).filter(|s| !s.is_empty()).collect()
}

/// Naive sentence splitter: break after `.`, `!`, `?` followed by
/// whitespace. Good enough for chunk-boundary purposes; not a full NLP
/// sentence segmenter.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let bytes = text.as_bytes();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if (c == b'.' || c == b'!' || c == b'?')
            && i + 1 < bytes.len()
            && bytes[i + 1].is_ascii_whitespace()
        {
            sentences.push(text[start..=i].trim());
            start = i + 1;
        }
        i += 1;
    }
    if start < text.len() {
        let rest = text[start..].trim();
        if !rest.is_empty() {
            sentences.push(rest);
        }
    }
    sentences.into_iter().filter(|s| !s.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(chunk_text("").is_empty());
        assert!(chunk_text("   \n  ").is_empty());
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let text = "A short article about nothing in particular.";
        let chunks = chunk_text(text);
        assert_eq!(chunks, vec![text.to_string()]);
    }

    #[test]
    fn paragraphs_are_packed_near_target_size() {
        let para = "x".repeat(400);
        let text = format!("{para}\n\n{para}\n\n{para}");
        let chunks = chunk_text(&text);
        for chunk in &chunks {
            assert!(chunk.len() <= TARGET_CHUNK_CHARS + 2);
        }
        assert!(chunks.len() >= 2);
    }

    #[test]
    fn oversized_paragraph_falls_back_to_sentences() {
        let sentence = "This is one sentence of moderate length. ".repeat(30);
        let chunks = chunk_text(&sentence);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.len() <= TARGET_CHUNK_CHARS + 50);
        }
    }

    #[test]
    fn pathological_single_token_force_splits() {
        let text = "a".repeat(5000);
        let chunks = chunk_text(&text);
        assert!(chunks.len() >= 6);
        assert_eq!(chunks.concat().len(), 5000);
    }

    #[test]
    fn rechunking_same_input_is_deterministic() {
        let text = "Paragraph one.\n\nParagraph two is a bit longer than the first one.\n\nAnd a third.";
        assert_eq!(chunk_text(text), chunk_text(text));
    }
}
