//! Query matching against the trained corpus.

use std::sync::Arc;

use refmatch_embeddings::Embedder;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::corpus::VectorStore;
use crate::error::Result;
use crate::persistence::SentenceStore;
use crate::trainer::Trainer;

/// Result of matching one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MatchOutcome {
    /// The best reference sentence reached the threshold.
    Matched { sentence: String, score: f32 },
    /// The best reference sentence scored below the threshold.
    BelowThreshold { score: f32 },
    /// Nothing has been trained, in memory or on disk.
    NoData,
    /// The query itself could not be embedded.
    EmbeddingFailed { reason: String },
}

impl MatchOutcome {
    /// The matched sentence, if the match was confident.
    pub fn best_sentence(&self) -> Option<&str> {
        match self {
            Self::Matched { sentence, .. } => Some(sentence.as_str()),
            _ => None,
        }
    }

    /// The best score, whenever one was computed.
    pub fn best_score(&self) -> Option<f32> {
        match self {
            Self::Matched { score, .. } | Self::BelowThreshold { score } => Some(*score),
            Self::NoData | Self::EmbeddingFailed { .. } => None,
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, Self::Matched { .. })
    }
}

/// Whether there is a corpus to match against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Readiness {
    Ready { entries: usize },
    NoData,
}

/// A reference sentence ranked against a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedMatch {
    pub sentence: String,
    pub score: f32,
}

/// Finds the closest reference sentence for a query.
pub struct Matcher {
    embedder: Embedder,
    store: Arc<VectorStore>,
    trainer: Arc<Trainer>,
    sentences: SentenceStore,
    threshold: f32,
    rehydrate_lock: Mutex<()>,
}

impl Matcher {
    pub fn new(
        embedder: Embedder,
        store: Arc<VectorStore>,
        trainer: Arc<Trainer>,
        sentences: SentenceStore,
        threshold: f32,
    ) -> Self {
        Self {
            embedder,
            store,
            trainer,
            sentences,
            threshold,
            rehydrate_lock: Mutex::new(()),
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Make sure a corpus is in memory, rebuilding it from the persisted
    /// sentence list when the store is empty.
    ///
    /// Concurrent callers share one rebuild.
    pub async fn ensure_ready(&self) -> Result<Readiness> {
        let entries = self.store.len().await;
        if entries > 0 {
            return Ok(Readiness::Ready { entries });
        }

        let _guard = self.rehydrate_lock.lock().await;
        let entries = self.store.len().await;
        if entries > 0 {
            return Ok(Readiness::Ready { entries });
        }

        let sentences = match self.sentences.load().await? {
            Some(sentences) if !sentences.is_empty() => sentences,
            _ => {
                debug!("No trained corpus in memory or on disk");
                return Ok(Readiness::NoData);
            }
        };

        info!(
            "Rehydrating corpus from {} persisted sentences",
            sentences.len()
        );
        self.trainer.restore(sentences).await?;

        let entries = self.store.len().await;
        if entries == 0 {
            return Ok(Readiness::NoData);
        }
        Ok(Readiness::Ready { entries })
    }

    /// Match `query` against the corpus.
    ///
    /// Errors only when the provider cannot load or the persisted list
    /// cannot be read; everything else is a [`MatchOutcome`].
    pub async fn match_sentence(&self, query: &str) -> Result<MatchOutcome> {
        if self.ensure_ready().await? == Readiness::NoData {
            return Ok(MatchOutcome::NoData);
        }

        self.embedder.ensure_loaded().await?;
        let query_embedding = match self.embedder.embed(query).await {
            Ok(embedding) => embedding,
            Err(e) => {
                warn!("Failed to embed query: {e}");
                return Ok(MatchOutcome::EmbeddingFailed {
                    reason: e.to_string(),
                });
            }
        };

        let corpus = self.store.snapshot().await;
        let best = match corpus.best_match(&query_embedding) {
            Ok(Some(best)) => best,
            Ok(None) => return Ok(MatchOutcome::NoData),
            Err(e) => {
                warn!("Similarity scan failed: {e}");
                return Ok(MatchOutcome::EmbeddingFailed {
                    reason: e.to_string(),
                });
            }
        };

        if best.score >= self.threshold {
            let sentence = corpus
                .get(best.index)
                .map(|entry| entry.sentence.clone())
                .unwrap_or_default();
            debug!("Matched with score {:.4}", best.score);
            Ok(MatchOutcome::Matched {
                sentence,
                score: best.score,
            })
        } else {
            debug!(
                "Best score {:.4} is below threshold {}",
                best.score, self.threshold
            );
            Ok(MatchOutcome::BelowThreshold { score: best.score })
        }
    }

    /// The `k` closest reference sentences, best first, ignoring the
    /// threshold. Empty when nothing has been trained.
    pub async fn rank(&self, query: &str, k: usize) -> Result<Vec<RankedMatch>> {
        if self.ensure_ready().await? == Readiness::NoData {
            return Ok(Vec::new());
        }

        self.embedder.ensure_loaded().await?;
        let query_embedding = self.embedder.embed(query).await?;
        let corpus = self.store.snapshot().await;

        let ranked = corpus
            .top_k(&query_embedding, k)?
            .into_iter()
            .filter_map(|scored| {
                corpus.get(scored.index).map(|entry| RankedMatch {
                    sentence: entry.sentence.clone(),
                    score: scored.score,
                })
            })
            .collect();
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_outcome_accessors() {
        let matched = MatchOutcome::Matched {
            sentence: "hi".to_string(),
            score: 0.9,
        };
        assert_eq!(matched.best_sentence(), Some("hi"));
        assert_eq!(matched.best_score(), Some(0.9));
        assert!(matched.is_match());

        let below = MatchOutcome::BelowThreshold { score: 0.1 };
        assert_eq!(below.best_sentence(), None);
        assert_eq!(below.best_score(), Some(0.1));

        assert_eq!(MatchOutcome::NoData.best_score(), None);
        let failed = MatchOutcome::EmbeddingFailed {
            reason: "boom".to_string(),
        };
        assert_eq!(failed.best_sentence(), None);
        assert_eq!(failed.best_score(), None);
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_value(MatchOutcome::BelowThreshold { score: 0.25 }).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "status": "below_threshold", "score": 0.25 })
        );
    }
}
