//! Loader error types

use thiserror::Error;

/// Loading result type
pub type LoadResult<T> = Result<T, LoadError>;

/// Loader errors
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to load '{0}'")]
    NotFound(String),

    #[error("Loading '{0}' is not supported")]
    Unsupported(String),
}
