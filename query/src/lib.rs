use kb_core::{load_from_path, Bm25Index, IndexPaths, Metadata, SearchHit, SharedIndex};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// One ranked match as handed to tool callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    pub relevance_score: f64,
}

impl From<SearchHit> for QueryResult {
    fn from(hit: SearchHit) -> Self {
        let metadata = if hit.metadata.is_empty() { None } else { Some(hit.metadata) };
        Self { content: hit.text, metadata, relevance_score: hit.score }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corpus {
    Patterns,
    Knowledge,
}

impl fmt::Display for Corpus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Corpus::Patterns => f.write_str("patterns"),
            Corpus::Knowledge => f.write_str("knowledge"),
        }
    }
}

impl FromStr for Corpus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "patterns" | "pattern" => Ok(Corpus::Patterns),
            "knowledge" => Ok(Corpus::Knowledge),
            other => Err(format!("unknown corpus {other:?}, expected patterns or knowledge")),
        }
    }
}

/// The two read-mostly indices behind `query_patterns` and `query_knowledge`.
///
/// Both are constructed by the caller at start-up and handed in; cloning the
/// knowledge base shares the same indices.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    patterns: SharedIndex,
    knowledge: SharedIndex,
}

impl KnowledgeBase {
    pub fn new(patterns: impl Into<SharedIndex>, knowledge: impl Into<SharedIndex>) -> Self {
        Self { patterns: patterns.into(), knowledge: knowledge.into() }
    }

    /// Load both persisted indices, failing if either cannot be read.
    pub fn open(paths: &IndexPaths) -> kb_core::Result<Self> {
        let patterns = load_from_path(paths.patterns())?;
        let knowledge = load_from_path(paths.knowledge())?;
        tracing::info!(
            patterns = patterns.document_count(),
            knowledge = knowledge.document_count(),
            "indices loaded"
        );
        Ok(Self::new(patterns, knowledge))
    }

    /// Like [`KnowledgeBase::open`], but an index that is missing or corrupt
    /// is replaced by an empty one.
    pub fn open_or_empty(paths: &IndexPaths) -> Self {
        Self::new(load_or_empty(&paths.patterns()), load_or_empty(&paths.knowledge()))
    }

    pub fn index(&self, corpus: Corpus) -> &SharedIndex {
        match corpus {
            Corpus::Patterns => &self.patterns,
            Corpus::Knowledge => &self.knowledge,
        }
    }

    /// Ranked results for `text`; `limit` of `None` or `Some(0)` returns every match.
    pub fn search(&self, corpus: Corpus, text: &str, limit: Option<usize>) -> Vec<QueryResult> {
        let hits = self.index(corpus).search(text, limit);
        tracing::debug!(%corpus, query = text, hits = hits.len(), "query");
        hits.into_iter().map(QueryResult::from).collect()
    }

    pub fn query_patterns(&self, text: &str) -> Vec<QueryResult> {
        self.search(Corpus::Patterns, text, None)
    }

    pub fn query_knowledge(&self, text: &str) -> Vec<QueryResult> {
        self.search(Corpus::Knowledge, text, None)
    }

    /// Replace one corpus' index; queries against the other corpus are not blocked.
    pub fn reload(&self, corpus: Corpus, index: Bm25Index) {
        let documents = index.document_count();
        self.index(corpus).replace(index);
        tracing::info!(%corpus, documents, "index reloaded");
    }
}

fn load_or_empty(path: &Path) -> Bm25Index {
    match load_from_path(path) {
        Ok(index) => index,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "falling back to empty index");
            Bm25Index::new()
        }
    }
}
