use std::collections::{HashMap, HashSet};

const MIN_WORD_LEN: usize = 3;

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "any", "can", "had", "her", "was",
    "one", "our", "out", "has", "him", "his", "how", "its", "may", "new", "now", "old", "see",
    "two", "who", "did", "get", "let", "she", "too", "use", "that", "with", "have", "this",
    "will", "your", "from", "they", "been", "were", "what", "when", "which", "their", "there",
    "would", "about", "into", "than", "them", "then", "some", "could", "should", "just", "also",
    "very", "like", "does", "over", "such",
];

pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= MIN_WORD_LEN)
        .map(|w| w.to_lowercase())
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// Fraction of distinct query keywords present in `text`.
pub fn relevance(query_terms: &HashSet<String>, text: &str) -> f64 {
    if query_terms.is_empty() {
        return 0.0;
    }
    let terms: HashSet<String> = tokenize(text).into_iter().collect();
    let hits = query_terms.iter().filter(|t| terms.contains(*t)).count();
    hits as f64 / query_terms.len() as f64
}

/// Highest-weighted keywords across `(text, weight)` pairs, ties broken alphabetically.
pub fn top_keywords<'a>(
    texts: impl IntoIterator<Item = (&'a str, f64)>,
    limit: usize,
) -> Vec<String> {
    let mut weights: HashMap<String, f64> = HashMap::new();
    for (text, weight) in texts {
        let distinct: HashSet<String> = tokenize(text).into_iter().collect();
        for word in distinct {
            *weights.entry(word).or_insert(0.0) += weight;
        }
    }

    let mut ranked: Vec<(String, f64)> = weights.into_iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(limit).map(|(w, _)| w).collect()
}
