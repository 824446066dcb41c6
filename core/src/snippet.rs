use crate::tokenizer::Normalizer;
use std::collections::HashSet;

const ELLIPSIS: &str = "...";

/// Excerpt of at most `max_chars` characters (ellipses excluded) centered on
/// the first word of `text` that normalizes to one of `query_terms`. Falls
/// back to the beginning of the text when nothing matches.
pub fn extract_snippet(text: &str, query_terms: &[String], normalizer: &Normalizer, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }
    if max_chars == 0 {
        return ELLIPSIS.to_string();
    }

    let terms: HashSet<&str> = query_terms.iter().map(String::as_str).collect();
    let anchor = first_match(text, &terms, normalizer).unwrap_or(0);
    let start = anchor.saturating_sub(max_chars / 2).min(total - max_chars);
    let end = start + max_chars;

    let excerpt: String = text.chars().skip(start).take(max_chars).collect();
    let mut snippet = String::with_capacity(excerpt.len() + 2 * ELLIPSIS.len());
    if start > 0 {
        snippet.push_str(ELLIPSIS);
    }
    snippet.push_str(&excerpt);
    if end < total {
        snippet.push_str(ELLIPSIS);
    }
    snippet
}

/// Char offset of the first raw word matching any of `terms`.
fn first_match(text: &str, terms: &HashSet<&str>, normalizer: &Normalizer) -> Option<usize> {
    if terms.is_empty() {
        return None;
    }
    let matches = |word: &str| normalizer.normalize(word).iter().any(|t| terms.contains(t.term.as_str()));

    let mut word_start: Option<(usize, usize)> = None;
    for (char_idx, (byte_idx, c)) in text.char_indices().enumerate() {
        if normalizer.is_boundary(c) {
            if let Some((b, ch)) = word_start.take() {
                if matches(&text[b..byte_idx]) {
                    return Some(ch);
                }
            }
        } else if word_start.is_none() {
            word_start = Some((byte_idx, char_idx));
        }
    }
    match word_start {
        Some((b, ch)) if matches(&text[b..]) => Some(ch),
        _ => None,
    }
}
