/// Chunk limit used when the caller supplies zero.
pub const DEFAULT_CHUNK_LIMIT: usize = 2048;

/// Characters a chunk prefers to end on.
const BREAK_CHARS: [char; 7] = ['\n', '。', '！', '？', '.', '!', '?'];

/// Split text into ordered chunks of at most `max_len` characters for
/// platforms with a hard message length ceiling.
///
/// Every non-final window is cut at the nearest sentence-or-line boundary
/// found searching backward from the window's right edge to its midpoint;
/// when no boundary exists in that range the cut falls at the raw edge.
/// Concatenating the returned chunks reproduces the input exactly. Operates
/// on `char` boundaries, so multi-byte text is never split mid-scalar.
pub fn split_long_text(text: &str, max_len: usize) -> Vec<String> {
    let max_len = if max_len == 0 { DEFAULT_CHUNK_LIMIT } else { max_len };

    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let mut end = (start + max_len).min(chars.len());

        if end < chars.len() {
            // Search back from the window edge, but never past the midpoint:
            // a cut earlier than that wastes too much of the window.
            let floor = start + max_len / 2;
            for i in (floor + 1..=end).rev() {
                if BREAK_CHARS.contains(&chars[i - 1]) {
                    end = i;
                    break;
                }
            }
        }

        chunks.push(chars[start..end].iter().collect());
        start = end;
    }

    chunks
}
