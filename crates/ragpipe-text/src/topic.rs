use std::collections::HashMap;

const STOPWORDS: &[&str] = &["the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "is", "are", "was", "were"];

pub const GENERAL_TOPIC: &str = "general";

/// Most frequent word longer than 3 chars across `sentences`.
///
/// Words are lowercased and stripped of surrounding `.,!?`. Ties go to the
/// word seen first; returns [`GENERAL_TOPIC`] when nothing qualifies.
pub fn extract_topic<S: AsRef<str>>(sentences: &[S]) -> String {
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();
    for sentence in sentences {
        for word in sentence.as_ref().to_lowercase().split_whitespace() {
            let word = word.trim_matches(|c| matches!(c, '.' | ',' | '!' | '?'));
            if word.chars().count() <= 3 || STOPWORDS.contains(&word) { continue; }
            let count = counts.entry(word.to_string()).or_insert(0);
            if *count == 0 { order.push(word.to_string()); }
            *count += 1;
        }
    }
    let mut best: Option<(&str, usize)> = None;
    for word in &order {
        let count = counts.get(word).copied().unwrap_or(0);
        if best.map_or(true, |(_, c)| count > c) { best = Some((word, count)); }
    }
    best.map_or_else(|| GENERAL_TOPIC.to_string(), |(w, _)| w.to_string())
}
