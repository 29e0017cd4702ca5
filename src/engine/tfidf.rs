//! Sparse term weighting for overview text.
//!
//! Term-frequency/inverse-document-frequency with a capped vocabulary and
//! English stop-word removal. Rows are l2-normalized; a document with no
//! surviving terms stays an all-zero row.

use std::collections::{HashMap, HashSet};

use ndarray::Array2;

/// Common English words excluded from the vocabulary
const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "cannot", "could", "did", "do", "does", "doing", "down", "during", "each",
    "few", "for", "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers",
    "herself", "him", "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its",
    "itself", "just", "me", "more", "most", "must", "my", "myself", "no", "nor", "not", "now",
    "of", "off", "on", "once", "only", "or", "other", "our", "ours", "ourselves", "out", "over",
    "own", "same", "she", "should", "so", "some", "such", "than", "that", "the", "their",
    "theirs", "them", "themselves", "then", "there", "these", "they", "this", "those", "through",
    "to", "too", "under", "until", "up", "upon", "very", "was", "we", "were", "what", "when",
    "where", "which", "while", "who", "whom", "why", "will", "with", "would", "you", "your",
    "yours", "yourself", "yourselves",
];

/// tf-idf vectorizer over a fixed document set.
///
/// Fit and transform happen in one pass per build; the vocabulary is
/// per-build, capped at `max_features` terms ranked by corpus frequency.
pub struct TfidfVectorizer {
    max_features: usize,
}

impl TfidfVectorizer {
    pub fn new(max_features: usize) -> Self {
        Self { max_features }
    }

    /// Build the vocabulary from `documents` and return the weighted matrix,
    /// one row per document.
    pub fn fit_transform(&self, documents: &[String]) -> Array2<f64> {
        let stop_words: HashSet<&str> = ENGLISH_STOP_WORDS.iter().copied().collect();

        let tokenized: Vec<Vec<String>> = documents
            .iter()
            .map(|doc| tokenize(doc, &stop_words))
            .collect();

        // Corpus-wide term frequency and document frequency
        let mut term_freq: HashMap<String, usize> = HashMap::new();
        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        for tokens in &tokenized {
            let mut seen: HashSet<&str> = HashSet::new();
            for token in tokens {
                *term_freq.entry(token.clone()).or_insert(0) += 1;
                if seen.insert(token) {
                    *doc_freq.entry(token.clone()).or_insert(0) += 1;
                }
            }
        }

        // Rank by frequency (ties alphabetical), cap, then index alphabetically
        // so the column order is deterministic within a build.
        let mut ranked: Vec<(String, usize)> = term_freq.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(self.max_features);

        let mut terms: Vec<String> = ranked.into_iter().map(|(term, _)| term).collect();
        terms.sort();
        let vocabulary: HashMap<&str, usize> = terms
            .iter()
            .enumerate()
            .map(|(idx, term)| (term.as_str(), idx))
            .collect();

        let n_docs = documents.len();
        let vocab_size = vocabulary.len();
        let mut matrix = Array2::<f64>::zeros((n_docs, vocab_size));

        for (row, tokens) in tokenized.iter().enumerate() {
            for token in tokens {
                if let Some(&col) = vocabulary.get(token.as_str()) {
                    matrix[[row, col]] += 1.0;
                }
            }
        }

        // Smoothed idf, then l2 row normalization. Zero rows stay zero.
        for (term, &col) in &vocabulary {
            let df = doc_freq.get(*term).copied().unwrap_or(0);
            let idf = ((1.0 + n_docs as f64) / (1.0 + df as f64)).ln() + 1.0;
            for row in 0..n_docs {
                matrix[[row, col]] *= idf;
            }
        }
        for mut row in matrix.rows_mut() {
            let norm = row.iter().map(|v| v * v).sum::<f64>().sqrt();
            if norm > 0.0 {
                row.mapv_inplace(|v| v / norm);
            }
        }

        matrix
    }
}

fn tokenize(text: &str, stop_words: &HashSet<&str>) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.chars().count() >= 2)
        .filter(|token| !stop_words.contains(token))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_one_row_per_document() {
        let vectorizer = TfidfVectorizer::new(2000);
        let matrix = vectorizer.fit_transform(&docs(&[
            "a thief steals corporate secrets",
            "a detective hunts a killer",
            "",
        ]));
        assert_eq!(matrix.nrows(), 3);
    }

    #[test]
    fn test_stop_words_removed() {
        let vectorizer = TfidfVectorizer::new(2000);
        let matrix = vectorizer.fit_transform(&docs(&["the and of is", "heist crew"]));
        // Only "heist" and "crew" survive
        assert_eq!(matrix.ncols(), 2);
        // The stop-word-only document is an all-zero row
        assert!(matrix.row(0).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_empty_document_is_zero_row() {
        let vectorizer = TfidfVectorizer::new(2000);
        let matrix = vectorizer.fit_transform(&docs(&["", "dream within dream"]));
        assert!(matrix.row(0).iter().all(|v| *v == 0.0));
        assert!(matrix.row(1).iter().any(|v| *v > 0.0));
    }

    #[test]
    fn test_vocabulary_cap() {
        let vectorizer = TfidfVectorizer::new(3);
        let matrix = vectorizer.fit_transform(&docs(&[
            "alpha alpha alpha beta beta gamma delta epsilon",
        ]));
        assert_eq!(matrix.ncols(), 3);
    }

    #[test]
    fn test_rows_are_l2_normalized() {
        let vectorizer = TfidfVectorizer::new(2000);
        let matrix = vectorizer.fit_transform(&docs(&[
            "dream heist inside dreams",
            "heist crew plans job",
        ]));
        for row in matrix.rows() {
            let norm = row.iter().map(|v| v * v).sum::<f64>().sqrt();
            assert!((norm - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_short_tokens_dropped() {
        let vectorizer = TfidfVectorizer::new(2000);
        let matrix = vectorizer.fit_transform(&docs(&["x y z heist"]));
        assert_eq!(matrix.ncols(), 1);
    }

    #[test]
    fn test_deterministic_across_runs() {
        let documents = docs(&[
            "a thief steals corporate secrets through dream sharing",
            "a detective hunts a serial killer in the rain",
            "two astronauts drift through deep space",
        ]);
        let a = TfidfVectorizer::new(2000).fit_transform(&documents);
        let b = TfidfVectorizer::new(2000).fit_transform(&documents);
        assert_eq!(a, b);
    }
}
