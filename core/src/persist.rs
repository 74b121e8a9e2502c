use crate::index::{Bm25Index, Document};
use crate::{DocId, Error, Result};
use bincode::Options;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::{self, create_dir_all, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 1;

/// Build summary written next to the index files. Informational only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaFile {
    pub patterns_documents: usize,
    pub knowledge_documents: usize,
    pub created_at: String,
    pub version: u32,
}

/// On-disk layout of a build output directory.
#[derive(Debug, Clone)]
pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn patterns(&self) -> PathBuf { self.root.join("patterns.bin") }
    pub fn knowledge(&self) -> PathBuf { self.root.join("knowledge.bin") }
    pub fn meta(&self) -> PathBuf { self.root.join("meta.json") }
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    documents: &'a [Document],
    doc_length: BTreeMap<DocId, u32>,
    term_frequency: BTreeMap<DocId, BTreeMap<&'a str, u32>>,
    document_frequency: BTreeMap<&'a str, u32>,
    avg_doc_length: f64,
    document_count: u64,
}

#[derive(Deserialize)]
struct Snapshot {
    documents: Vec<Document>,
    doc_length: BTreeMap<DocId, u32>,
    term_frequency: BTreeMap<DocId, BTreeMap<String, u32>>,
    document_frequency: BTreeMap<String, u32>,
    avg_doc_length: f64,
    document_count: u64,
}

fn codec() -> impl Options {
    bincode::DefaultOptions::new().with_fixint_encoding().reject_trailing_bytes()
}

/// Encode the full persisted state of an index. Equal indices encode to equal bytes.
pub fn to_bytes(index: &Bm25Index) -> Result<Vec<u8>> {
    let snapshot = SnapshotRef {
        documents: &index.documents,
        doc_length: index.doc_length.iter().map(|(&id, &len)| (id, len)).collect(),
        term_frequency: index
            .term_frequency
            .iter()
            .map(|(&id, terms)| (id, terms.iter().map(|(t, &tf)| (t.as_str(), tf)).collect()))
            .collect(),
        document_frequency: index
            .document_frequency
            .iter()
            .map(|(t, &df)| (t.as_str(), df))
            .collect(),
        avg_doc_length: index.avg_doc_length,
        document_count: index.documents.len() as u64,
    };
    codec().serialize(&snapshot).map_err(Error::Encode)
}

/// Decode and validate an index produced by [`to_bytes`].
pub fn from_bytes(bytes: &[u8]) -> Result<Bm25Index> {
    let snapshot: Snapshot = codec().deserialize(bytes).map_err(Error::Decode)?;
    validate(&snapshot)?;
    let Snapshot {
        documents,
        doc_length,
        term_frequency,
        document_frequency,
        avg_doc_length,
        ..
    } = snapshot;
    Ok(Bm25Index::from_parts(
        documents,
        doc_length.into_iter().collect(),
        term_frequency.into_iter().map(|(id, terms)| (id, terms.into_iter().collect())).collect(),
        document_frequency.into_iter().collect(),
        avg_doc_length,
    ))
}

fn validate(s: &Snapshot) -> Result<()> {
    let n = s.documents.len();
    if s.document_count != n as u64 {
        let msg = format!("document_count {} but {} documents", s.document_count, n);
        return Err(Error::corrupt(msg));
    }
    let mut ids = HashSet::with_capacity(n);
    for doc in &s.documents {
        if !ids.insert(doc.id) {
            return Err(Error::corrupt(format!("duplicate document id {}", doc.id)));
        }
    }
    if s.doc_length.len() != n || s.term_frequency.len() != n {
        return Err(Error::corrupt("doc_length/term_frequency entries do not match documents"));
    }

    let mut df: HashMap<&str, u32> = HashMap::new();
    let mut total: u64 = 0;
    for doc in &s.documents {
        let stats = (s.doc_length.get(&doc.id), s.term_frequency.get(&doc.id));
        let (Some(&len), Some(terms)) = stats else {
            return Err(Error::corrupt(format!("missing statistics for document {}", doc.id)));
        };
        let mut sum: u64 = 0;
        for (term, &tf) in terms {
            if tf == 0 {
                let msg = format!("zero term frequency for {term:?} in document {}", doc.id);
                return Err(Error::corrupt(msg));
            }
            sum += u64::from(tf);
            *df.entry(term.as_str()).or_insert(0) += 1;
        }
        if sum != u64::from(len) {
            let msg = format!("document {} length {} but {} term occurrences", doc.id, len, sum);
            return Err(Error::corrupt(msg));
        }
        total += u64::from(len);
    }

    if df.len() != s.document_frequency.len()
        || s.document_frequency.iter().any(|(t, &c)| df.get(t.as_str()) != Some(&c))
    {
        return Err(Error::corrupt("document_frequency disagrees with term_frequency"));
    }

    if n > 0 {
        let mean = total as f64 / n as f64;
        if !s.avg_doc_length.is_finite() || (s.avg_doc_length - mean).abs() > 1e-9 * mean.max(1.0) {
            let msg = format!("avg_doc_length {} but mean is {}", s.avg_doc_length, mean);
            return Err(Error::corrupt(msg));
        }
    }
    Ok(())
}

/// An encoded index written beside its destination and not yet visible under the final name.
///
/// Dropping it without [`StagedFile::commit`] removes the temporary file.
#[must_use = "a staged index is discarded unless committed"]
#[derive(Debug)]
pub struct StagedFile {
    tmp: PathBuf,
    dest: PathBuf,
    committed: bool,
}

impl StagedFile {
    pub fn path(&self) -> &Path { &self.dest }

    /// Move the staged file over the destination.
    pub fn commit(mut self) -> Result<()> {
        fs::rename(&self.tmp, &self.dest).map_err(|e| Error::io(&self.dest, e))?;
        self.committed = true;
        tracing::debug!(path = %self.dest.display(), "committed index");
        Ok(())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.tmp);
        }
    }
}

fn staging_path(path: &Path) -> Result<PathBuf> {
    let Some(name) = path.file_name() else {
        return Err(Error::io(path, io::Error::new(io::ErrorKind::InvalidInput, "no file name")));
    };
    let mut tmp = name.to_os_string();
    tmp.push(".tmp");
    Ok(path.with_file_name(tmp))
}

/// Encode `index` into a temporary file next to `path`.
///
/// The file at `path` is untouched until [`StagedFile::commit`].
pub fn stage(index: &Bm25Index, path: impl AsRef<Path>) -> Result<StagedFile> {
    let dest = path.as_ref().to_path_buf();
    let bytes = to_bytes(index)?;
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    let staged = StagedFile { tmp: staging_path(&dest)?, dest, committed: false };
    let mut f = File::create(&staged.tmp).map_err(|e| Error::io(&staged.tmp, e))?;
    f.write_all(&bytes).map_err(|e| Error::io(&staged.tmp, e))?;
    f.sync_all().map_err(|e| Error::io(&staged.tmp, e))?;
    tracing::debug!(path = %staged.tmp.display(), bytes = bytes.len(), "staged index");
    Ok(staged)
}

/// Write `index` to `path`, replacing any previous file in one rename.
pub fn save_to_path(index: &Bm25Index, path: impl AsRef<Path>) -> Result<()> {
    stage(index, path)?.commit()
}

/// Read an index written by [`save_to_path`]. Decode failures name the file.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<Bm25Index> {
    let path = path.as_ref();
    let mut f = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf).map_err(|e| Error::io(path, e))?;
    let index = from_bytes(&buf).map_err(|e| e.in_file(path))?;
    tracing::debug!(path = %path.display(), documents = index.document_count(), "loaded index");
    Ok(index)
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root).map_err(|e| Error::io(&paths.root, e))?;
    let json = serde_json::to_string_pretty(meta)?;
    let path = paths.meta();
    let mut f = File::create(&path).map_err(|e| Error::io(&path, e))?;
    f.write_all(json.as_bytes()).map_err(|e| Error::io(&path, e))?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let path = paths.meta();
    let mut f = File::open(&path).map_err(|e| Error::io(&path, e))?;
    let mut buf = String::new();
    f.read_to_string(&mut buf).map_err(|e| Error::io(&path, e))?;
    let meta: MetaFile = serde_json::from_str(&buf)?;
    Ok(meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Metadata;

    fn sample() -> Bm25Index {
        let mut index = Bm25Index::new();
        let mut meta = Metadata::new();
        meta.insert("source".into(), "patterns/deploy.md".into());
        index.add_document(1, "Deploy to Cloud Run with a canary", meta);
        index.add_document(2, "cache docker layers in cloud build", Metadata::new());
        index.add_document(3, "", Metadata::new());
        index
    }

    #[test]
    fn encoding_is_deterministic() {
        let index = sample();
        assert_eq!(to_bytes(&index).unwrap(), to_bytes(&index.clone()).unwrap());
    }

    #[test]
    fn decoded_index_keeps_all_fields() {
        let index = sample();
        let back = from_bytes(&to_bytes(&index).unwrap()).unwrap();
        assert_eq!(back.documents(), index.documents());
        assert_eq!(back.avg_doc_length(), index.avg_doc_length());
        assert_eq!(back.document_frequency("cloud"), 2);
        assert_eq!(back.term_frequency(2, "cloud"), 1);
        assert_eq!(back.doc_length(3), Some(0));
    }

    #[test]
    fn truncated_bytes_fail_to_decode() {
        let bytes = to_bytes(&sample()).unwrap();
        let err = from_bytes(&bytes[..bytes.len() / 2]).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = to_bytes(&sample()).unwrap();
        bytes.push(0);
        assert!(from_bytes(&bytes).unwrap_err().is_decode());
    }

    #[test]
    fn inconsistent_snapshot_is_corrupt() {
        let mut index = sample();
        index.document_frequency.insert("cloud".into(), 7);
        let err = from_bytes(&to_bytes(&index).unwrap()).unwrap_err();
        assert!(matches!(err, Error::Corrupt(_)), "{err}");
    }
}
