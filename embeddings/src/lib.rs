//! # Embeddings
//!
//! Sentence embeddings and similarity scoring for refmatch.
//!
//! ## Features
//!
//! - **Providers**: OpenAI-compatible HTTP API, or an offline hashing model
//! - **Embedder**: load-once handle that guarantees a fixed dimension
//! - **Similarity**: cosine scoring and best-match scans
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embeddings                                   │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  EmbeddingProvider ──► Embedder ──► Embedding                   │
//! │       │                                 │                       │
//! │       ▼                                 ▼                       │
//! │  OpenAI/Hashing              cosine_similarity / best_match     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod embedder;
pub mod error;
pub mod provider;
pub mod similarity;

pub use embedder::{Embedder, EmbedderState};
pub use error::{EmbeddingError, Result};
pub use provider::{
    EmbeddingProvider, EmbeddingRequest, EmbeddingResponse, HashingProvider, OpenAIProvider,
};
pub use similarity::{ScoredIndex, best_match, cosine_similarity, top_k, zero_embedding};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;
