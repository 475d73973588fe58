pub const DEFAULT_CHUNK_CHARS: usize = 1000;

/// Collapse every whitespace run (spaces, tabs, newlines, NBSP) to a single
/// space and trim the ends. Chunk boundaries are therefore insensitive to the
/// PDF extractor's line breaking.
pub fn normalize_whitespace(text: &str) -> String {
    text.replace('\u{a0}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split `text` into ordered, non-overlapping chunks of at most `max_chars`
/// characters each, after whitespace normalization. Concatenating the output
/// reproduces the normalized input exactly; a chunk may split mid-word.
/// Empty or whitespace-only input yields no chunks.
///
/// Character-counted rather than byte-counted so multi-byte text never
/// splits inside a UTF-8 sequence.
pub fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let normalized = normalize_whitespace(text);
    if normalized.is_empty() || max_chars == 0 {
        return Vec::new();
    }

    let chars: Vec<char> = normalized.chars().collect();
    chars
        .chunks(max_chars)
        .map(|piece| piece.iter().collect())
        .collect()
}
