use crate::tokenizer::{term_counts, tokenize};
use crate::{DocId, Metadata};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    /// Original text, returned verbatim to callers.
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IndexStats {
    pub documents: usize,
    pub terms: usize,
    pub avg_doc_length: f64,
}

/// Append-only BM25 index over short text documents.
///
/// `documents`, `doc_length`, `term_frequency`, `document_frequency` and
/// `avg_doc_length` are the persisted state. `postings` and `positions` are
/// rebuilt from them and only exist to avoid full scans at query time.
#[derive(Debug, Default, Clone)]
pub struct Bm25Index {
    pub(crate) documents: Vec<Document>,
    pub(crate) doc_length: HashMap<DocId, u32>,
    pub(crate) term_frequency: HashMap<DocId, HashMap<String, u32>>,
    pub(crate) document_frequency: HashMap<String, u32>,
    pub(crate) avg_doc_length: f64,
    pub(crate) postings: HashMap<String, BTreeMap<DocId, u32>>, // term -> doc_id -> tf
    pub(crate) positions: HashMap<DocId, usize>,
    total_length: u64,
}

impl Bm25Index {
    pub fn new() -> Self { Self::default() }

    /// Index one document.
    ///
    /// Returns `false` and leaves the index untouched if `id` is already present.
    pub fn add_document(
        &mut self,
        id: DocId,
        content: impl Into<String>,
        metadata: Metadata,
    ) -> bool {
        if self.positions.contains_key(&id) {
            tracing::warn!(doc_id = id, "document id already indexed, skipping");
            return false;
        }
        let content = content.into();
        let tokens = tokenize(&content);
        let len = tokens.len() as u32;
        let counts = term_counts(&tokens);

        // each document adds at most 1 to a term's df
        for (term, &tf) in &counts {
            *self.document_frequency.entry(term.clone()).or_insert(0) += 1;
            self.postings.entry(term.clone()).or_default().insert(id, tf);
        }

        self.positions.insert(id, self.documents.len());
        self.documents.push(Document { id, content, metadata });
        self.doc_length.insert(id, len);
        self.term_frequency.insert(id, counts);
        self.total_length += u64::from(len);
        self.avg_doc_length = self.total_length as f64 / self.documents.len() as f64;
        true
    }

    /// Reassemble an index from its persisted fields, rebuilding the derived lookups.
    pub(crate) fn from_parts(
        documents: Vec<Document>,
        doc_length: HashMap<DocId, u32>,
        term_frequency: HashMap<DocId, HashMap<String, u32>>,
        document_frequency: HashMap<String, u32>,
        avg_doc_length: f64,
    ) -> Self {
        let positions = documents.iter().enumerate().map(|(pos, d)| (d.id, pos)).collect();
        let mut postings: HashMap<String, BTreeMap<DocId, u32>> = HashMap::new();
        for (&doc_id, terms) in &term_frequency {
            for (term, &tf) in terms {
                if tf > 0 {
                    postings.entry(term.clone()).or_default().insert(doc_id, tf);
                }
            }
        }
        let total_length = doc_length.values().map(|&l| u64::from(l)).sum();
        Self {
            documents,
            doc_length,
            term_frequency,
            document_frequency,
            avg_doc_length,
            postings,
            positions,
            total_length,
        }
    }

    pub fn documents(&self) -> &[Document] { &self.documents }

    pub fn document(&self, id: DocId) -> Option<&Document> {
        self.positions.get(&id).map(|&pos| &self.documents[pos])
    }

    pub fn document_count(&self) -> usize { self.documents.len() }

    pub fn is_empty(&self) -> bool { self.documents.is_empty() }

    pub fn doc_length(&self, id: DocId) -> Option<u32> { self.doc_length.get(&id).copied() }

    pub fn term_frequency(&self, id: DocId, term: &str) -> u32 {
        self.term_frequency.get(&id).and_then(|t| t.get(term)).copied().unwrap_or(0)
    }

    pub fn document_frequency(&self, term: &str) -> u32 {
        self.document_frequency.get(term).copied().unwrap_or(0)
    }

    /// Mean document length in tokens, `None` for an empty index.
    pub fn avg_doc_length(&self) -> Option<f64> {
        if self.is_empty() { None } else { Some(self.avg_doc_length) }
    }

    pub fn vocabulary_size(&self) -> usize { self.document_frequency.len() }

    pub(crate) fn postings(&self, term: &str) -> Option<&BTreeMap<DocId, u32>> {
        self.postings.get(term)
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            documents: self.document_count(),
            terms: self.vocabulary_size(),
            avg_doc_length: self.avg_doc_length().unwrap_or(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_freq_by_scan(index: &Bm25Index, term: &str) -> u32 {
        index.documents().iter().filter(|d| index.term_frequency(d.id, term) > 0).count() as u32
    }

    #[test]
    fn tracks_lengths_and_frequencies() {
        let mut index = Bm25Index::new();
        assert!(index.add_document(1, "deploy deploy cloud", Metadata::new()));
        assert!(index.add_document(2, "cloud run", Metadata::new()));

        assert_eq!(index.document_count(), 2);
        assert_eq!(index.doc_length(1), Some(3));
        assert_eq!(index.term_frequency(1, "deploy"), 2);
        assert_eq!(index.document_frequency("deploy"), 1);
        assert_eq!(index.document_frequency("cloud"), 2);
        assert_eq!(index.avg_doc_length(), Some(2.5));
    }

    #[test]
    fn averages_and_df_hold_after_every_insert() {
        let texts = ["alpha beta", "", "beta beta gamma 42", "Gamma; delta! alpha", "z"];
        let mut index = Bm25Index::new();
        for (i, text) in texts.iter().enumerate() {
            index.add_document(i as DocId + 1, *text, Metadata::new());
            let lengths: Vec<f64> =
                index.documents().iter().map(|d| index.doc_length(d.id).unwrap() as f64).collect();
            let mean = lengths.iter().sum::<f64>() / lengths.len() as f64;
            assert!((index.avg_doc_length().unwrap() - mean).abs() < 1e-12);
            for term in ["alpha", "beta", "gamma", "delta", "z"] {
                let expected = doc_freq_by_scan(&index, term);
                assert_eq!(index.document_frequency(term), expected, "term {term}");
            }
        }
    }

    #[test]
    fn empty_content_still_counts() {
        let mut index = Bm25Index::new();
        index.add_document(1, "one two", Metadata::new());
        index.add_document(2, "", Metadata::new());
        assert_eq!(index.document_count(), 2);
        assert_eq!(index.doc_length(2), Some(0));
        assert_eq!(index.avg_doc_length(), Some(1.0));
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let mut index = Bm25Index::new();
        assert!(index.add_document(7, "first", Metadata::new()));
        assert!(!index.add_document(7, "second first", Metadata::new()));
        assert_eq!(index.document_count(), 1);
        assert_eq!(index.document(7).unwrap().content, "first");
        assert_eq!(index.document_frequency("first"), 1);
    }

    #[test]
    fn empty_index_has_no_average() {
        let index = Bm25Index::new();
        assert!(index.is_empty());
        assert_eq!(index.avg_doc_length(), None);
        assert_eq!(index.stats().avg_doc_length, 0.0);
    }
}
