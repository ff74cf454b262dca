//! Error types for the embeddings system.

use thiserror::Error;

/// Result type alias for embedding operations.
pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// Errors that can occur in the embeddings system.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// Provider not configured.
    #[error("embedding provider not configured")]
    ProviderNotConfigured,

    /// The provider could not be initialized.
    #[error("failed to load embedding provider `{provider}`: {reason}")]
    LoadFailed { provider: String, reason: String },

    /// `embed` was called before `ensure_loaded` succeeded.
    #[error("embedding provider `{0}` is not loaded")]
    NotLoaded(String),

    /// API request failed.
    #[error("API request failed: {0}")]
    ApiRequest(String),

    /// Invalid response from provider.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Dimension mismatch.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The provider returned a vector with no components.
    #[error("provider returned an empty embedding")]
    EmptyEmbedding,

    /// The provider did not answer in time.
    #[error("embedding timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}
