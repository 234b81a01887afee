//! Rule-based sentence splitting.
//!
//! Whitespace runs collapse to a single space, then a boundary falls after
//! every `.`, `!` or `?` that is directly followed by a space. Abbreviations
//! such as "e.g. this" are split too; callers that need linguistic accuracy
//! should plug in a real tokenizer before chunking.

fn is_terminator(c: char) -> bool { matches!(c, '.' | '!' | '?') }

/// Splits `text` into trimmed, non-empty sentences in original order.
pub fn split_sentences(text: &str) -> Vec<String> {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let bytes = normalized.as_bytes();
    let mut sentences = Vec::new();
    let mut start = 0;
    for (i, c) in normalized.char_indices() {
        if is_terminator(c) && bytes.get(i + 1) == Some(&b' ') {
            push_trimmed(&mut sentences, &normalized[start..=i]);
            start = i + 2;
        }
    }
    if start < normalized.len() {
        push_trimmed(&mut sentences, &normalized[start..]);
    }
    sentences
}

fn push_trimmed(out: &mut Vec<String>, fragment: &str) {
    let fragment = fragment.trim();
    if !fragment.is_empty() { out.push(fragment.to_string()); }
}
