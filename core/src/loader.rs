use crate::index::Bm25Index;
use crate::{DocId, Error, Metadata, Result, SOURCE_KEY};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Ids handed out by the loader start here in every index.
pub const FIRST_DOC_ID: DocId = 1;

/// Where the two corpora live on disk.
#[derive(Debug, Clone)]
pub struct CorpusLayout {
    pub patterns_dir: PathBuf,
    pub knowledge_dir: PathBuf,
    /// Extra knowledge files chained after `knowledge_dir`; skipped when absent.
    pub supplementary_dir: Option<PathBuf>,
}

impl Default for CorpusLayout {
    fn default() -> Self {
        Self {
            patterns_dir: PathBuf::from("./patterns"),
            knowledge_dir: PathBuf::from("./knowledge"),
            supplementary_dir: None,
        }
    }
}

/// The two independently built indices.
#[derive(Debug, Default)]
pub struct Corpora {
    pub patterns: Bm25Index,
    pub knowledge: Bm25Index,
}

fn source_metadata(source: String) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert(SOURCE_KEY.to_string(), source);
    metadata
}

/// Index every regular file below `root`, one document per file, in file-name order.
///
/// Returns the next unused id so several directories can be chained into one
/// index. Files and entries that cannot be read are logged and skipped. An
/// unreadable `root` is an error, and so is a file that would need an id past
/// `DocId::MAX`; files indexed before that point stay in the index.
pub fn load_directory(
    index: &mut Bm25Index,
    root: impl AsRef<Path>,
    start_id: DocId,
) -> Result<DocId> {
    let root = root.as_ref();
    let meta = fs::metadata(root).map_err(|e| Error::io(root, e))?;
    if !meta.is_dir() {
        return Err(Error::io(root, io::Error::new(io::ErrorKind::InvalidInput, "not a directory")));
    }

    let mut next_id = start_id;
    let mut loaded = 0usize;
    let mut skipped = 0usize;
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(root = %root.display(), error = %err, "skipping unreadable entry");
                skipped += 1;
                continue;
            }
        };
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "skipping unreadable file");
                skipped += 1;
                continue;
            }
        };
        let after = advance(next_id)?;
        let content = String::from_utf8_lossy(&bytes).into_owned();
        tracing::debug!(doc_id = next_id, path = %path.display(), "indexing file");
        if index.add_document(next_id, content, source_metadata(path.display().to_string())) {
            loaded += 1;
        }
        next_id = after;
    }

    tracing::info!(root = %root.display(), loaded, skipped, next_id, "loaded directory");
    Ok(next_id)
}

/// Index an embedded resource set given as `(relative path, content)` pairs.
///
/// Each entry is addressed by its full relative path, so nested resources keep
/// distinct sources. Returns the next unused id, or an error once ids run out.
pub fn load_bundle<I, P, C>(index: &mut Bm25Index, entries: I, start_id: DocId) -> Result<DocId>
where
    I: IntoIterator<Item = (P, C)>,
    P: AsRef<str>,
    C: AsRef<str>,
{
    let mut next_id = start_id;
    for (path, content) in entries {
        let after = advance(next_id)?;
        let metadata = source_metadata(path.as_ref().to_string());
        index.add_document(next_id, content.as_ref(), metadata);
        next_id = after;
    }
    Ok(next_id)
}

/// Id following `id`; the last id is never handed out so a successor always exists.
fn advance(id: DocId) -> Result<DocId> {
    id.checked_add(1).ok_or(Error::IdsExhausted { last: id })
}

/// Build the `patterns` and `knowledge` indices described by `layout`.
pub fn build_corpora(layout: &CorpusLayout) -> Result<Corpora> {
    let mut patterns = Bm25Index::new();
    load_directory(&mut patterns, &layout.patterns_dir, FIRST_DOC_ID)?;

    let mut knowledge = Bm25Index::new();
    let next_id = load_directory(&mut knowledge, &layout.knowledge_dir, FIRST_DOC_ID)?;
    if let Some(extra) = &layout.supplementary_dir {
        if extra.is_dir() {
            load_directory(&mut knowledge, extra, next_id)?;
        } else {
            tracing::warn!(
                path = %extra.display(),
                "supplementary knowledge directory not found, skipping"
            );
        }
    }

    tracing::info!(
        patterns = patterns.document_count(),
        knowledge = knowledge.document_count(),
        "corpora built"
    );
    Ok(Corpora { patterns, knowledge })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundle_entries_keep_nested_paths() {
        let mut index = Bm25Index::new();
        let next = load_bundle(
            &mut index,
            [("knowledge/gke.md", "GKE autopilot"), ("knowledge/ci/cache.md", "cache layers")],
            FIRST_DOC_ID,
        )
        .unwrap();
        assert_eq!(next, 3);
        assert_eq!(index.document(2).unwrap().metadata[SOURCE_KEY], "knowledge/ci/cache.md");
    }

    #[test]
    fn missing_root_is_an_io_error() {
        let mut index = Bm25Index::new();
        let err = load_directory(&mut index, "/definitely/not/here", FIRST_DOC_ID).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
        assert!(index.is_empty());
    }

    #[test]
    fn bundle_stops_when_ids_run_out() {
        let mut index = Bm25Index::new();
        let next = load_bundle(&mut index, [("a.md", "almost")], DocId::MAX - 1).unwrap();
        assert_eq!(next, DocId::MAX);
        assert_eq!(index.document_count(), 1);

        let err = load_bundle(&mut index, [("b.md", "last")], DocId::MAX).unwrap_err();
        assert!(matches!(err, Error::IdsExhausted { last: u32::MAX }));
        assert_eq!(index.document_count(), 1);
    }

    #[test]
    fn empty_bundle_keeps_the_start_id() {
        let mut index = Bm25Index::new();
        let entries: [(&str, &str); 0] = [];
        assert_eq!(load_bundle(&mut index, entries, DocId::MAX).unwrap(), DocId::MAX);
    }
}
