use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;

/// English stopwords, checked against the raw token before stemming.
/// Apostrophes never survive normalization, so only plain forms appear here.
const STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
    "by", "can", "cannot", "could", "did", "do", "does", "doing", "down", "during", "each",
    "few", "for", "from", "further", "had", "has", "have", "having", "he", "her", "here",
    "hers", "herself", "him", "himself", "his", "how", "i", "if", "in", "into", "is", "it",
    "its", "itself", "me", "more", "most", "my", "myself", "no", "nor", "not", "of", "off",
    "on", "once", "only", "or", "other", "ought", "our", "ours", "ourselves", "out", "over",
    "own", "same", "she", "should", "so", "some", "such", "than", "that", "the", "their",
    "theirs", "them", "themselves", "then", "there", "these", "they", "this", "those",
    "through", "to", "too", "under", "until", "up", "very", "was", "we", "were", "what",
    "when", "where", "which", "while", "who", "whom", "why", "with", "would", "you", "your",
    "yours", "yourself", "yourselves",
];

/// Shortest token length kept by the normalizer. Anything at or below
/// this many characters is dropped.
const MIN_TOKEN_LEN: usize = 2;

/// Turns free text into index terms. Owns its compiled regex, stemmer,
/// and stopword set so indexes can carry their own analyzer instead of
/// sharing process-global state.
pub struct Tokenizer {
    strip: Regex,
    stemmer: Stemmer,
    stopwords: HashSet<&'static str>,
}

impl Tokenizer {
    pub fn new() -> Self {
        Self {
            strip: Regex::new(r"[^a-z\s]").expect("valid regex"),
            stemmer: Stemmer::create(Algorithm::English),
            stopwords: STOPWORDS.iter().copied().collect(),
        }
    }

    /// Lowercase, strip everything that is not an ASCII letter or whitespace,
    /// split on whitespace, drop short tokens and stopwords, then stem.
    ///
    /// Stripped characters are deleted outright rather than replaced with a
    /// separator, so "win32api" collapses to a single term. Stopwords are
    /// matched on the raw token; the stemmer only runs on what survives.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        let stripped = self.strip.replace_all(&lowered, "");
        stripped
            .split_whitespace()
            .filter(|token| token.len() > MIN_TOKEN_LEN && !self.stopwords.contains(token))
            .map(|token| self.stemmer.stem(token).to_string())
            .collect()
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}
