//! In-memory trained corpus and the store that publishes it.
//!
//! A [`TrainedCorpus`] is immutable once built. The [`VectorStore`] holds the
//! current one behind an `Arc` and replaces it wholesale, so readers always
//! see a complete corpus, never one that is half written.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use refmatch_embeddings::{Embedding, ScoredIndex, best_match, top_k};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{MatcherError, Result};

/// A reference sentence and its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusEntry {
    pub sentence: String,
    pub embedding: Embedding,
}

impl AsRef<[f32]> for CorpusEntry {
    fn as_ref(&self) -> &[f32] {
        &self.embedding
    }
}

/// Ordered, index-aligned sentences and embeddings.
#[derive(Debug, Clone, Default)]
pub struct TrainedCorpus {
    entries: Vec<CorpusEntry>,
    dimension: usize,
    trained_at: Option<DateTime<Utc>>,
}

impl TrainedCorpus {
    /// The corpus that matches nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Pair `sentences[i]` with `embeddings[i]`.
    ///
    /// Fails when the two lists differ in length or any embedding is not
    /// `dimension` long.
    pub fn from_parts(
        sentences: Vec<String>,
        embeddings: Vec<Embedding>,
        dimension: usize,
    ) -> Result<Self> {
        if sentences.len() != embeddings.len() {
            return Err(MatcherError::CorpusMisaligned {
                sentences: sentences.len(),
                embeddings: embeddings.len(),
            });
        }
        if let Some(bad) = embeddings.iter().find(|e| e.len() != dimension) {
            return Err(refmatch_embeddings::EmbeddingError::DimensionMismatch {
                expected: dimension,
                actual: bad.len(),
            }
            .into());
        }

        let entries = sentences
            .into_iter()
            .zip(embeddings)
            .map(|(sentence, embedding)| CorpusEntry {
                sentence,
                embedding,
            })
            .collect();

        Ok(Self {
            entries,
            dimension,
            trained_at: Some(Utc::now()),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// When this corpus was built. `None` for the empty corpus.
    pub fn trained_at(&self) -> Option<DateTime<Utc>> {
        self.trained_at
    }

    pub fn entries(&self) -> &[CorpusEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&CorpusEntry> {
        self.entries.get(index)
    }

    /// Sentences in insertion order.
    pub fn sentences(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.sentence.as_str())
    }

    /// Most similar entry to `query`; the earliest entry wins ties.
    pub fn best_match(&self, query: &[f32]) -> Result<Option<ScoredIndex>> {
        Ok(best_match(query, &self.entries)?)
    }

    /// The `k` most similar entries, best first.
    pub fn top_k(&self, query: &[f32], k: usize) -> Result<Vec<ScoredIndex>> {
        Ok(top_k(query, &self.entries, k)?)
    }
}

/// Result of offering a corpus to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The corpus is now current.
    Published,
    /// A corpus from a newer training run was already published.
    Superseded,
}

struct Published {
    corpus: Arc<TrainedCorpus>,
    generation: u64,
}

/// Holder of the current [`TrainedCorpus`].
pub struct VectorStore {
    current: RwLock<Published>,
}

impl VectorStore {
    /// Create a store holding the empty corpus.
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Published {
                corpus: Arc::new(TrainedCorpus::empty()),
                generation: 0,
            }),
        }
    }

    /// The current corpus. Scanning it does not block publishers.
    pub async fn snapshot(&self) -> Arc<TrainedCorpus> {
        self.current.read().await.corpus.clone()
    }

    /// Replace the current corpus, unless a newer generation already won.
    pub async fn publish(&self, corpus: TrainedCorpus, generation: u64) -> PublishOutcome {
        let mut current = self.current.write().await;
        if generation < current.generation {
            debug!(
                "Discarding corpus from generation {generation}, generation {} is current",
                current.generation
            );
            return PublishOutcome::Superseded;
        }

        info!(
            "Published corpus of {} sentences (generation {generation})",
            corpus.len()
        );
        current.corpus = Arc::new(corpus);
        current.generation = generation;
        PublishOutcome::Published
    }

    /// Install a corpus rebuilt from disk, but only while nothing is in
    /// memory.
    ///
    /// The current generation is kept, so any training run already in
    /// flight still replaces the restored corpus when it publishes.
    pub async fn restore_if_empty(&self, corpus: TrainedCorpus) -> PublishOutcome {
        let mut current = self.current.write().await;
        if !current.corpus.is_empty() {
            debug!("Discarding restored corpus, a trained corpus is already current");
            return PublishOutcome::Superseded;
        }

        info!("Restored corpus of {} sentences", corpus.len());
        current.corpus = Arc::new(corpus);
        PublishOutcome::Published
    }

    /// Drop the in-memory corpus.
    ///
    /// The generation is kept so that a training run started before the
    /// clear still cannot overwrite a newer one.
    pub async fn clear(&self) {
        let mut current = self.current.write().await;
        current.corpus = Arc::new(TrainedCorpus::empty());
        info!("Cleared in-memory corpus");
    }

    pub async fn is_empty(&self) -> bool {
        self.current.read().await.corpus.is_empty()
    }

    pub async fn len(&self) -> usize {
        self.current.read().await.corpus.len()
    }

    /// Generation of the currently published corpus.
    pub async fn generation(&self) -> u64 {
        self.current.read().await.generation
    }
}

impl Default for VectorStore {
    fn default() -> Self {
        Self::new()
    }
}
