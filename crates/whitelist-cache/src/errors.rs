use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("i/o error while accessing whitelist cache: {0}")]
    Io(#[from] io::Error),

    #[error("whitelist cache serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("whitelist cache store error: {0}")]
    Store(String),
}

pub type CacheResult<T> = std::result::Result<T, CacheError>;
