pub mod error;
pub mod index;
pub mod loader;
pub mod persist;
pub mod search;
pub mod shared;
pub mod tokenizer;

pub use error::{Error, Result};
pub use index::{Bm25Index, Document, IndexStats};
pub use loader::{build_corpora, load_bundle, load_directory, Corpora, CorpusLayout};
pub use persist::{load_from_path, save_to_path, IndexPaths};
pub use search::SearchHit;
pub use shared::SharedIndex;

use std::collections::BTreeMap;

pub type DocId = u32;

/// Free-form string attributes attached to a document, e.g. `source -> file path`.
pub type Metadata = BTreeMap<String, String>;

/// Metadata key under which the loader records where a document came from.
pub const SOURCE_KEY: &str = "source";
