//! Error types for the matching engine.

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, MatcherError>;

/// Errors that can occur while training or matching.
#[derive(Error, Debug)]
pub enum MatcherError {
    /// Embedding error, including a provider that failed to load.
    #[error("embedding error: {0}")]
    Embedding(#[from] refmatch_embeddings::EmbeddingError),

    /// `train` was called with no sentences.
    #[error("no sentences to train on")]
    EmptyTrainingSet,

    /// Sentences and embeddings do not line up.
    #[error("corpus misaligned: {sentences} sentences, {embeddings} embeddings")]
    CorpusMisaligned { sentences: usize, embeddings: usize },

    /// Persisted sentence list could not be read or written.
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
