//! Fatal error kinds returned by the core. Recoverable events (a rejected
//! candidate, a malformed JSON document, a buffer overflow, a plugin id
//! collision) are never `Err` values — they are surfaced through a hit's
//! `reasons` and through the [`crate::metrics::MetricsSink`], per the
//! error handling design.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("input exceeds maximum size of {limit} bytes (got {actual})")]
    InputTooLarge { limit: usize, actual: usize },

    #[error("input is not valid: {0}")]
    InputInvalid(String),

    #[error("hmacKey is required for tokenize action on type {0}")]
    TokenizeMissingKey(String),
}

pub type Result<T> = std::result::Result<T, Error>;
