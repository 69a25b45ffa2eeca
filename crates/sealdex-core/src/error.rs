use std::path::PathBuf;

use thiserror::Error;

use crate::types::KeyGen;

pub type SealdexResult<T> = Result<T, SealdexError>;

#[derive(Debug, Error)]
pub enum SealdexError {
    #[error("rng failure: {0}")]
    Rng(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported hash output length {0} in index header")]
    InvalidHash(i64),

    #[error("truncated input: {0}")]
    Truncated(&'static str),

    #[error("invalid document ID: {0}")]
    InvalidDocId(String),

    #[error("no key known for generation {0}")]
    KeyNotFound(KeyGen),

    #[error("invalid key generation {0}")]
    InvalidKeyGen(i64),

    #[error("path {} is not strictly beneath the indexed directory", .0.display())]
    PathEscape(PathBuf),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
