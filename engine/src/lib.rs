//! # Matching Engine
//!
//! Trains a corpus of reference sentences and finds the best match for an
//! arbitrary query sentence.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    SentenceMatcher                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │   train(sentences)                    match_sentence(query)     │
//! │         │                                      │                │
//! │         ▼                                      ▼                │
//! │  ┌──────────────┐   publish   ┌──────────────┐  ┌───────────┐   │
//! │  │   Trainer    │ ──────────► │ VectorStore  │◄─│  Matcher  │   │
//! │  └──────────────┘             └──────────────┘  └───────────┘   │
//! │         │   │                                      │     │      │
//! │         │   └──────────► Embedder ◄────────────────┘     │      │
//! │         ▼                                                ▼      │
//! │  ┌──────────────┐        rehydrate when empty    ┌───────────┐  │
//! │  │SentenceStore │ ─────────────────────────────► │  restore  │  │
//! │  └──────────────┘                                └───────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use refmatch_engine::SentenceMatcher;
//!
//! let matcher = SentenceMatcher::builder()
//!     .with_data_dir("/var/lib/refmatch")
//!     .build()?;
//!
//! matcher.train(vec!["The cat sleeps on the mat.".into()]).await?;
//! let outcome = matcher.match_sentence("A cat sleeping on a mat").await?;
//! ```

pub mod api;
pub mod config;
pub mod corpus;
pub mod error;
pub mod matcher;
pub mod persistence;
pub mod service;
pub mod trainer;

pub use api::{TestSentenceResponse, TrainModelResponse};
pub use config::{EmbeddingProviderType, MatcherConfig};
pub use corpus::{TrainedCorpus, VectorStore};
pub use error::{MatcherError, Result};
pub use matcher::{MatchOutcome, RankedMatch, Readiness};
pub use persistence::SentenceStore;
pub use service::{MatcherStats, SentenceMatcher, SentenceMatcherBuilder};
pub use trainer::TrainSummary;

// Re-export from dependencies for convenience
pub use refmatch_embeddings::{Embedder, EmbeddingProvider, HashingProvider, OpenAIProvider};
