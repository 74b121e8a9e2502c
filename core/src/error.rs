use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::DocId;

/// Errors raised by the persistence codec and the corpus loader.
///
/// Searching and adding documents never fail; only I/O, decoding and running
/// out of document ids can.
#[derive(Error, Debug)]
pub enum Error {
    /// File or directory could not be read or written.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// In-memory index could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[source] bincode::Error),

    /// Byte stream is not a valid encoding (truncated, garbage, wrong layout).
    #[error("decode error: {0}")]
    Decode(#[source] bincode::Error),

    /// Byte stream decoded but describes an inconsistent index.
    #[error("corrupt index: {0}")]
    Corrupt(String),

    /// Build metadata file could not be read or written as JSON.
    #[error("metadata error: {0}")]
    Meta(#[from] serde_json::Error),

    /// A persisted index file failed to decode.
    #[error("{}: {source}", .path.display())]
    File {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },

    /// No id is left after `last` for the next document.
    #[error("document ids exhausted after {last}")]
    IdsExhausted { last: DocId },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Error::Io { path: path.as_ref().to_path_buf(), source }
    }

    pub fn corrupt(msg: impl Into<String>) -> Self {
        Error::Corrupt(msg.into())
    }

    /// Attach the file a decode failure came from.
    pub fn in_file(self, path: impl AsRef<Path>) -> Self {
        Error::File { path: path.as_ref().to_path_buf(), source: Box::new(self) }
    }

    /// True for failures caused by the content of a persisted index rather than by I/O.
    pub fn is_decode(&self) -> bool {
        match self {
            Error::Decode(_) | Error::Corrupt(_) | Error::Meta(_) => true,
            Error::File { source, .. } => source.is_decode(),
            _ => false,
        }
    }
}
