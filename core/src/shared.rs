use crate::index::{Bm25Index, IndexStats};
use crate::search::SearchHit;
use parking_lot::RwLock;
use std::sync::Arc;

/// Cloneable handle to an index that may be swapped while it is being queried.
///
/// `replace` takes the lock exclusively; any number of searches run concurrently.
#[derive(Debug, Clone, Default)]
pub struct SharedIndex {
    inner: Arc<RwLock<Bm25Index>>,
}

impl SharedIndex {
    pub fn new(index: Bm25Index) -> Self {
        Self { inner: Arc::new(RwLock::new(index)) }
    }

    pub fn search(&self, query: &str, limit: Option<usize>) -> Vec<SearchHit> {
        self.inner.read().search(query, limit)
    }

    /// Swap in a freshly built or loaded index, returning the previous one.
    pub fn replace(&self, index: Bm25Index) -> Bm25Index {
        std::mem::replace(&mut *self.inner.write(), index)
    }

    pub fn stats(&self) -> IndexStats {
        self.inner.read().stats()
    }

    /// Run `f` against the index under the read lock.
    pub fn with_index<R>(&self, f: impl FnOnce(&Bm25Index) -> R) -> R {
        f(&self.inner.read())
    }
}

impl From<Bm25Index> for SharedIndex {
    fn from(index: Bm25Index) -> Self { Self::new(index) }
}
