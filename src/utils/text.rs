// Text helpers for summaries and similarity checks

use std::collections::HashSet;

/// Truncate to at most `max_chars` characters, never splitting a char
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Lowercased alphanumeric word set
pub fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

/// Shared tokens divided by the size of the smaller token set.
/// Returns 0.0 when either side has no tokens.
pub fn token_overlap_ratio(a: &str, b: &str) -> f64 {
    let left = tokenize(a);
    let right = tokenize(b);
    let smaller = left.len().min(right.len());
    if smaller == 0 {
        return 0.0;
    }
    let shared = left.intersection(&right).count();
    shared as f64 / smaller as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo wörld", 5), "héllo");
        assert_eq!(truncate_chars("short", 50), "short");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn test_token_overlap_ratio() {
        let ratio = token_overlap_ratio(
            "AI applications in healthcare",
            "AI applications in health care industry",
        );
        assert!((ratio - 0.75).abs() < 1e-9);
        assert_eq!(token_overlap_ratio("rust", "RUST!"), 1.0);
        assert_eq!(token_overlap_ratio("", "anything"), 0.0);
        assert_eq!(token_overlap_ratio("tokio runtime", "python asyncio"), 0.0);
    }
}
