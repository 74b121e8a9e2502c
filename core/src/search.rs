use crate::index::Bm25Index;
use crate::tokenizer::tokenize;
use crate::{DocId, Metadata};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Term-frequency saturation.
pub const K1: f64 = 1.2;
/// Length-normalization strength.
pub const B: f64 = 0.75;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub score: f64,
    pub text: String,
    pub metadata: Metadata,
}

/// `ln(1 + (n - df + 0.5) / (df + 0.5))`, always positive.
pub fn idf(n: usize, df: u32) -> f64 {
    let n = n as f64;
    let df = f64::from(df);
    (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
}

/// BM25 contribution of one term occurring `tf` times in a document of `doc_len` tokens.
pub fn term_score(idf: f64, tf: u32, doc_len: u32, avg_doc_len: f64) -> f64 {
    let tf = f64::from(tf);
    let norm = 1.0 - B + B * (f64::from(doc_len) / avg_doc_len);
    idf * (tf * (K1 + 1.0)) / (tf + K1 * norm)
}

impl Bm25Index {
    /// Rank documents against a free-text query.
    ///
    /// Repeated query terms count once per occurrence. Terms never seen in the
    /// corpus are ignored. Hits are ordered by score descending, then by
    /// ascending document id. `None` or `Some(0)` returns every hit.
    pub fn search(&self, query: &str, limit: Option<usize>) -> Vec<SearchHit> {
        let terms = tokenize(query);
        if terms.is_empty() || self.is_empty() {
            return Vec::new();
        }

        let n = self.document_count();
        let mut scores: HashMap<DocId, f64> = HashMap::new();
        for term in &terms {
            let Some(postings) = self.postings(term) else { continue };
            let term_idf = idf(n, self.document_frequency(term));
            for (&doc_id, &tf) in postings {
                let doc_len = self.doc_length(doc_id).unwrap_or(0);
                let contribution = term_score(term_idf, tf, doc_len, self.avg_doc_length);
                *scores.entry(doc_id).or_insert(0.0) += contribution;
            }
        }

        let mut scored: Vec<(DocId, f64)> = scores.into_iter().filter(|(_, s)| *s != 0.0).collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal).then(a.0.cmp(&b.0)));
        if let Some(k) = limit.filter(|&k| k > 0) {
            scored.truncate(k);
        }
        tracing::debug!(query, terms = terms.len(), hits = scored.len(), "bm25 search");

        scored
            .into_iter()
            .filter_map(|(doc_id, score)| {
                self.document(doc_id).map(|doc| SearchHit {
                    doc_id,
                    score,
                    text: doc.content.clone(),
                    metadata: doc.metadata.clone(),
                })
            })
            .collect()
    }
}
