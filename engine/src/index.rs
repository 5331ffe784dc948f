use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::tokenizer::Tokenizer;

/// Characters of body text kept in a stored snippet.
const SNIPPET_CHARS: usize = 200;

/// BM25 term-frequency saturation and length-normalization parameters.
const BM25_K1: f32 = 1.5;
const BM25_B: f32 = 0.75;

/// Blend weights for the final score: BM25 carries most of the signal,
/// raw term frequency keeps heavily repeated terms from being flattened
/// by saturation.
const BM25_WEIGHT: f32 = 0.7;
const TF_WEIGHT: f32 = 0.3;

/// A stored document. `tokens` is the normalized term sequence for the
/// title and body combined; `snippet` is a display excerpt of the body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub tokens: Vec<String>,
}

/// One ranked search result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
    pub title: String,
    pub snippet: String,
    pub url: String,
}

/// In-memory inverted index with BM25 ranking.
///
/// Owns its documents, postings, and analyzer as one aggregate, so a
/// caller that wants concurrent access wraps the whole thing in a single
/// lock and every read sees a consistent corpus.
pub struct SearchIndex {
    tokenizer: Tokenizer,
    pub(crate) docs: HashMap<String, Document>,
    pub(crate) inverted: HashMap<String, HashMap<String, u32>>,
    total_docs: usize,
    avg_doc_length: f32,
}

impl SearchIndex {
    pub fn new() -> Self {
        Self {
            tokenizer: Tokenizer::new(),
            docs: HashMap::new(),
            inverted: HashMap::new(),
            total_docs: 0,
            avg_doc_length: 0.0,
        }
    }

    /// Rebuild an index from persisted parts. Corpus statistics are always
    /// recomputed from the documents rather than trusted from disk.
    pub(crate) fn from_parts(
        docs: HashMap<String, Document>,
        inverted: HashMap<String, HashMap<String, u32>>,
    ) -> Self {
        let mut index = Self {
            tokenizer: Tokenizer::new(),
            docs,
            inverted,
            total_docs: 0,
            avg_doc_length: 0.0,
        };
        index.recompute_stats();
        index
    }

    /// Index a document under `id`. The title and body are concatenated for
    /// tokenization; the snippet is taken from the body alone.
    ///
    /// Re-using an id replaces the previous document: its postings are
    /// retracted before the new ones are written, so stale counts never
    /// linger in the term map.
    pub fn add_document(&mut self, id: &str, title: &str, body: &str, url: &str) {
        let tokens = self.tokenizer.tokenize(&format!("{} {}", title, body));

        if let Some(prev) = self.docs.remove(id) {
            self.retract(&prev);
        }

        let mut counts: HashMap<&str, u32> = HashMap::new();
        for term in &tokens {
            *counts.entry(term.as_str()).or_insert(0) += 1;
        }
        for (term, count) in counts {
            self.inverted
                .entry(term.to_string())
                .or_default()
                .insert(id.to_string(), count);
        }

        tracing::debug!(id, terms = tokens.len(), "indexed document");
        self.docs.insert(
            id.to_string(),
            Document {
                id: id.to_string(),
                title: title.to_string(),
                url: url.to_string(),
                snippet: make_snippet(body),
                tokens,
            },
        );
        self.recompute_stats();
    }

    /// Remove a document's postings, dropping any term whose posting list
    /// becomes empty.
    fn retract(&mut self, doc: &Document) {
        for term in &doc.tokens {
            if let Some(postings) = self.inverted.get_mut(term) {
                postings.remove(&doc.id);
                if postings.is_empty() {
                    self.inverted.remove(term);
                }
            }
        }
    }

    fn recompute_stats(&mut self) {
        self.total_docs = self.docs.len();
        if self.total_docs == 0 {
            self.avg_doc_length = 0.0;
            return;
        }
        let total_terms: usize = self.docs.values().map(|d| d.tokens.len()).sum();
        self.avg_doc_length = total_terms as f32 / self.total_docs as f32;
    }

    /// Rank documents for `query` and return at most `top_k` hits.
    ///
    /// The query goes through the same normalization as documents, each
    /// query term occurrence contributes independently, and candidates are
    /// scored as `0.7 * BM25 + 0.3 * summed term frequency`. Ties are
    /// broken by ascending document id so results are fully deterministic.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<SearchHit> {
        if self.total_docs == 0 || top_k == 0 {
            return Vec::new();
        }
        let query_terms = self.tokenizer.tokenize(query);
        if query_terms.is_empty() {
            return Vec::new();
        }

        let n = self.total_docs as f32;
        // doc id -> (bm25 sum, raw term-frequency sum)
        let mut accum: HashMap<&str, (f32, u32)> = HashMap::new();
        for term in &query_terms {
            let Some(postings) = self.inverted.get(term.as_str()) else {
                continue;
            };
            let df = postings.len() as f32;
            let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
            for (doc_id, &count) in postings {
                let Some(doc) = self.docs.get(doc_id) else {
                    continue;
                };
                let tf = count as f32;
                let dl = doc.tokens.len() as f32;
                let norm = tf + BM25_K1 * (1.0 - BM25_B + BM25_B * (dl / self.avg_doc_length));
                let entry = accum.entry(doc_id.as_str()).or_insert((0.0, 0));
                entry.0 += idf * (tf * (BM25_K1 + 1.0)) / norm;
                entry.1 += count;
            }
        }

        let mut ranked: Vec<(&str, f32)> = accum
            .into_iter()
            .map(|(doc_id, (bm25, tf))| (doc_id, BM25_WEIGHT * bm25 + TF_WEIGHT * tf as f32))
            .filter(|&(_, score)| score > 0.0)
            .collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });
        ranked.truncate(top_k);

        ranked
            .into_iter()
            .filter_map(|(doc_id, score)| {
                self.docs.get(doc_id).map(|doc| SearchHit {
                    id: doc.id.clone(),
                    score,
                    title: doc.title.clone(),
                    snippet: doc.snippet.clone(),
                    url: doc.url.clone(),
                })
            })
            .collect()
    }

    pub fn document(&self, id: &str) -> Option<&Document> {
        self.docs.get(id)
    }

    pub fn total_docs(&self) -> usize {
        self.total_docs
    }

    /// Number of distinct terms in the index.
    pub fn num_terms(&self) -> usize {
        self.inverted.len()
    }

    pub fn avg_doc_length(&self) -> f32 {
        self.avg_doc_length
    }
}

impl Default for SearchIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn make_snippet(body: &str) -> String {
    match body.char_indices().nth(SNIPPET_CHARS) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_marks_truncation_only_when_truncated() {
        let mut index = SearchIndex::new();
        let long_body = "word ".repeat(60);
        index.add_document("long", "Title", &long_body, "");
        index.add_document("short", "Title", "tiny body", "");

        let long_doc = index.document("long").unwrap();
        assert!(long_doc.snippet.ends_with("..."));
        assert_eq!(long_doc.snippet.chars().count(), SNIPPET_CHARS + 3);
        assert_eq!(index.document("short").unwrap().snippet, "tiny body");
    }

    #[test]
    fn empty_documents_count_but_never_match() {
        let mut index = SearchIndex::new();
        index.add_document("empty", "", "", "");
        assert_eq!(index.total_docs(), 1);
        assert_eq!(index.num_terms(), 0);
        assert_eq!(index.avg_doc_length(), 0.0);
        assert!(index.search("anything", 5).is_empty());
    }
}
