use crate::errors::ApiError;

/// Splits `text` into overlapping windows of up to `size` characters, each
/// consecutive pair sharing `overlap` characters.
///
/// Windows are measured in characters, not bytes, so multi-byte UTF-8 never
/// splits mid-scalar. The final window may be shorter than `size`; empty
/// input yields no windows.
///
/// `size == 0` or `overlap >= size` would keep the window from ever
/// advancing, so those inputs are rejected instead of looping forever.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Result<Vec<String>, ApiError> {
    if size == 0 {
        return Err(ApiError::BadRequest("chunk size must be positive".to_string()));
    }
    if overlap >= size {
        return Err(ApiError::BadRequest(format!(
            "chunk overlap ({}) must be smaller than chunk size ({})",
            overlap, size
        )));
    }

    // Byte offset of every char boundary, plus the end of the string, so
    // char-indexed windows can slice directly.
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(offset, _)| offset)
        .chain(std::iter::once(text.len()))
        .collect();
    let total = boundaries.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0usize;
    while start < total {
        let end = (start + size).min(total);
        chunks.push(text[boundaries[start]..boundaries[end]].to_string());
        if end == total {
            break;
        }
        start = end - overlap;
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(chunk_text("", 10, 2).unwrap().is_empty());
    }

    #[test]
    fn short_input_is_a_single_chunk() {
        let chunks = chunk_text("hello", 10, 2).unwrap();
        assert_eq!(chunks, vec!["hello"]);
    }

    #[test]
    fn windows_advance_with_configured_overlap() {
        let text = "abcdefghij";
        let chunks = chunk_text(text, 4, 2).unwrap();
        assert_eq!(chunks, vec!["abcd", "cdef", "efgh", "ghij"]);
    }

    #[test]
    fn consecutive_chunks_share_the_overlap_substring() {
        let text: String = ('a'..='z').cycle().take(530).collect();
        let size = 100;
        let overlap = 17;
        let chunks = chunk_text(&text, size, overlap).unwrap();

        for pair in chunks.windows(2) {
            let tail: String = pair[0].chars().skip(pair[0].chars().count() - overlap).collect();
            let head: String = pair[1].chars().take(overlap).collect();
            assert_eq!(tail, head);
        }
    }

    #[test]
    fn chunks_cover_the_full_text() {
        let text: String = ('0'..='9').cycle().take(347).collect();
        let chunks = chunk_text(&text, 50, 10).unwrap();

        // Drop each chunk's leading overlap (except the first) and the
        // concatenation must reproduce the input.
        let mut rebuilt = chunks[0].clone();
        for chunk in &chunks[1..] {
            rebuilt.extend(chunk.chars().skip(10));
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn multibyte_text_never_splits_a_scalar() {
        let text = "日本語のテキストを分割する".repeat(20);
        let chunks = chunk_text(&text, 16, 4).unwrap();
        let total_chars: usize = text.chars().count();
        assert!(chunks.iter().all(|c| c.chars().count() <= 16));
        // Coverage check via the same tail-trim reconstruction.
        let rebuilt: usize = chunks[0].chars().count()
            + chunks[1..]
                .iter()
                .map(|c| c.chars().count() - 4)
                .sum::<usize>();
        assert_eq!(rebuilt, total_chars);
    }

    #[test]
    fn degenerate_parameters_are_rejected() {
        assert!(chunk_text("abc", 0, 0).is_err());
        assert!(chunk_text("abc", 4, 4).is_err());
        assert!(chunk_text("abc", 4, 9).is_err());
    }
}
