//! Corpus training.
//!
//! Each call embeds every sentence concurrently, builds a complete
//! [`TrainedCorpus`], overwrites the persisted sentence list, then swaps the
//! corpus into the [`VectorStore`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use refmatch_embeddings::similarity::is_zero;
use refmatch_embeddings::{Embedder, Embedding, zero_embedding};
use serde::Serialize;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::corpus::{PublishOutcome, TrainedCorpus, VectorStore};
use crate::error::{MatcherError, Result};
use crate::persistence::SentenceStore;

/// What a training run did.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainSummary {
    /// Number of sentences in the trained corpus.
    pub sentences: usize,

    /// Sentences stored with a zero vector, which never match anything.
    pub degraded: usize,

    /// Embedding dimension.
    pub dimension: usize,

    /// Training generation of this run.
    pub generation: u64,

    /// A newer run was published first, so this corpus was discarded.
    pub superseded: bool,

    pub trained_at: DateTime<Utc>,
}

struct BuiltCorpus {
    corpus: TrainedCorpus,
    count: usize,
    degraded: usize,
    dimension: usize,
    trained_at: DateTime<Utc>,
}

/// Builds corpora and publishes them.
pub struct Trainer {
    embedder: Embedder,
    store: Arc<VectorStore>,
    sentences: SentenceStore,
    max_concurrency: usize,
    next_generation: AtomicU64,
    publish_lock: Mutex<()>,
}

impl Trainer {
    pub fn new(
        embedder: Embedder,
        store: Arc<VectorStore>,
        sentences: SentenceStore,
        max_concurrency: usize,
    ) -> Self {
        Self {
            embedder,
            store,
            sentences,
            max_concurrency: max_concurrency.max(1),
            next_generation: AtomicU64::new(1),
            publish_lock: Mutex::new(()),
        }
    }

    /// Replace the corpus with `sentences` and persist them.
    ///
    /// A sentence whose embedding fails keeps its slot with a zero vector.
    /// Only a provider that cannot load aborts the run. The sentence list is
    /// written before the corpus is published, so a failed write leaves the
    /// previous corpus in memory.
    pub async fn train(&self, sentences: Vec<String>) -> Result<TrainSummary> {
        if sentences.is_empty() {
            return Err(MatcherError::EmptyTrainingSet);
        }
        self.embedder.ensure_loaded().await?;

        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        info!(
            "Training generation {generation} on {} sentences",
            sentences.len()
        );
        let built = self.build(sentences).await?;

        // persist and publish in the same order across concurrent runs
        let _guard = self.publish_lock.lock().await;
        let current = self.store.generation().await;
        let superseded = if generation < current {
            info!("Training generation {generation} superseded by generation {current}");
            true
        } else {
            let to_persist: Vec<String> =
                built.corpus.sentences().map(str::to_string).collect();
            self.sentences.save(&to_persist).await?;
            self.store.publish(built.corpus, generation).await == PublishOutcome::Superseded
        };

        Ok(TrainSummary {
            sentences: built.count,
            degraded: built.degraded,
            dimension: built.dimension,
            generation,
            superseded,
            trained_at: built.trained_at,
        })
    }

    /// Rebuild the in-memory corpus from an already persisted list.
    ///
    /// Never rewrites the file, and never displaces a corpus that a
    /// training run published in the meantime.
    pub(crate) async fn restore(&self, sentences: Vec<String>) -> Result<TrainSummary> {
        if sentences.is_empty() {
            return Err(MatcherError::EmptyTrainingSet);
        }
        self.embedder.ensure_loaded().await?;

        let built = self.build(sentences).await?;
        let outcome = self.store.restore_if_empty(built.corpus).await;

        Ok(TrainSummary {
            sentences: built.count,
            degraded: built.degraded,
            dimension: built.dimension,
            generation: self.store.generation().await,
            superseded: outcome == PublishOutcome::Superseded,
            trained_at: built.trained_at,
        })
    }

    async fn build(&self, sentences: Vec<String>) -> Result<BuiltCorpus> {
        let dimension = self.embedder.dimension();
        let embeddings = self.embed_all(&sentences).await;
        let degraded = embeddings.iter().filter(|e| is_zero(e)).count();
        if degraded > 0 {
            warn!("{degraded} of {} sentences have no usable embedding", sentences.len());
        }

        let count = sentences.len();
        let corpus = TrainedCorpus::from_parts(sentences, embeddings, dimension)?;
        let trained_at = corpus.trained_at().unwrap_or_else(Utc::now);
        Ok(BuiltCorpus {
            corpus,
            count,
            degraded,
            dimension,
            trained_at,
        })
    }

    /// Embed every sentence, one task each, and return the vectors in input
    /// order regardless of completion order.
    async fn embed_all(&self, sentences: &[String]) -> Vec<Embedding> {
        let dimension = self.embedder.dimension();
        let permits = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();

        for (index, sentence) in sentences.iter().cloned().enumerate() {
            let embedder = self.embedder.clone();
            let permits = permits.clone();
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                (index, embedder.embed_or_zero(&sentence).await)
            });
        }

        let mut slots: Vec<Option<Embedding>> = vec![None; sentences.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, embedding)) => {
                    debug!("Embedded sentence {index}");
                    slots[index] = Some(embedding);
                }
                Err(e) => warn!("Embedding task failed: {e}"),
            }
        }

        slots
            .into_iter()
            .map(|slot| slot.unwrap_or_else(|| zero_embedding(dimension)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use refmatch_embeddings::{
        EmbeddingError, EmbeddingProvider, EmbeddingRequest, EmbeddingResponse, HashingProvider,
    };
    use std::time::Duration;
    use tempfile::TempDir;

    /// Fails for any sentence containing "fail" and answers slowly for any
    /// sentence containing "slow".
    struct FlakyProvider {
        inner: HashingProvider,
    }

    #[async_trait]
    impl EmbeddingProvider for FlakyProvider {
        fn name(&self) -> &str {
            "flaky"
        }

        fn default_model(&self) -> &str {
            "flaky"
        }

        fn dimension(&self) -> usize {
            self.inner.dimension()
        }

        async fn embed(
            &self,
            request: EmbeddingRequest,
        ) -> refmatch_embeddings::Result<EmbeddingResponse> {
            if request.text.contains("fail") {
                return Err(EmbeddingError::ApiRequest("injected".to_string()));
            }
            if request.text.contains("slow") {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            self.inner.embed(request).await
        }

        fn is_available(&self) -> bool {
            true
        }
    }

    struct BrokenProvider;

    #[async_trait]
    impl EmbeddingProvider for BrokenProvider {
        fn name(&self) -> &str {
            "broken"
        }

        fn default_model(&self) -> &str {
            "broken"
        }

        fn dimension(&self) -> usize {
            4
        }

        async fn load(&self) -> refmatch_embeddings::Result<()> {
            Err(EmbeddingError::ProviderNotConfigured)
        }

        async fn embed(
            &self,
            _request: EmbeddingRequest,
        ) -> refmatch_embeddings::Result<EmbeddingResponse> {
            Err(EmbeddingError::ProviderNotConfigured)
        }

        fn is_available(&self) -> bool {
            false
        }
    }

    fn trainer(dir: &TempDir, provider: Arc<dyn EmbeddingProvider>) -> (Trainer, Arc<VectorStore>) {
        trainer_with(dir, Embedder::new(provider))
    }

    fn trainer_with(dir: &TempDir, embedder: Embedder) -> (Trainer, Arc<VectorStore>) {
        let store = Arc::new(VectorStore::new());
        let trainer = Trainer::new(
            embedder,
            store.clone(),
            SentenceStore::new(dir.path().join("sentences.json")),
            4,
        );
        (trainer, store)
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_order_preserved_despite_completion_order() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(FlakyProvider {
            inner: HashingProvider::with_dimension(32),
        });
        let (trainer, store) = trainer(&dir, provider);

        let input = strings(&["slow first", "quick second", "slow third", "quick fourth"]);
        trainer.train(input.clone()).await.unwrap();

        let corpus = store.snapshot().await;
        assert_eq!(corpus.sentences().collect::<Vec<_>>(), input);

        let reference = Embedder::new(Arc::new(HashingProvider::with_dimension(32)));
        reference.ensure_loaded().await.unwrap();
        for entry in corpus.entries() {
            assert_eq!(entry.embedding, reference.embed(&entry.sentence).await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_failed_sentence_keeps_zero_slot() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(FlakyProvider {
            inner: HashingProvider::with_dimension(16),
        });
        let (trainer, store) = trainer(&dir, provider);

        let summary = trainer
            .train(strings(&["good one", "please fail", "good two"]))
            .await
            .unwrap();

        assert_eq!(summary.sentences, 3);
        assert_eq!(summary.degraded, 1);
        let corpus = store.snapshot().await;
        assert_eq!(corpus.get(1).unwrap().sentence, "please fail");
        assert_eq!(corpus.get(1).unwrap().embedding, vec![0.0; 16]);
        assert!(corpus.entries().iter().all(|e| e.embedding.len() == 16));
    }

    #[tokio::test]
    async fn test_empty_input_is_rejected() {
        let dir = TempDir::new().unwrap();
        let (trainer, store) = trainer(&dir, Arc::new(HashingProvider::new()));

        let err = trainer.train(Vec::new()).await.unwrap_err();
        assert!(matches!(err, MatcherError::EmptyTrainingSet));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_load_failure_aborts() {
        let dir = TempDir::new().unwrap();
        let (trainer, store) = trainer(&dir, Arc::new(BrokenProvider));

        let err = trainer.train(strings(&["anything"])).await.unwrap_err();
        assert!(matches!(
            err,
            MatcherError::Embedding(EmbeddingError::LoadFailed { .. })
        ));
        assert!(store.is_empty().await);
        assert_eq!(
            SentenceStore::new(dir.path().join("sentences.json"))
                .load()
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_second_run_replaces_and_persists() {
        let dir = TempDir::new().unwrap();
        let (trainer, store) = trainer(&dir, Arc::new(HashingProvider::new()));

        let first = trainer.train(strings(&["alpha", "beta"])).await.unwrap();
        let second = trainer.train(strings(&["gamma"])).await.unwrap();

        assert!(second.generation > first.generation);
        assert_eq!(store.snapshot().await.sentences().collect::<Vec<_>>(), vec!["gamma"]);
        assert_eq!(
            SentenceStore::new(dir.path().join("sentences.json"))
                .load()
                .await
                .unwrap(),
            Some(strings(&["gamma"]))
        );
    }

    #[tokio::test]
    async fn test_restore_does_not_rewrite_file() {
        let dir = TempDir::new().unwrap();
        let (trainer, store) = trainer(&dir, Arc::new(HashingProvider::new()));

        trainer.restore(strings(&["from disk"])).await.unwrap();

        assert_eq!(store.len().await, 1);
        assert!(!dir.path().join("sentences.json").exists());
    }

    #[tokio::test]
    async fn test_slow_sentence_times_out_to_zero_slot() {
        let dir = TempDir::new().unwrap();
        let embedder = Embedder::new(Arc::new(FlakyProvider {
            inner: HashingProvider::with_dimension(16),
        }))
        .with_timeout(Duration::from_millis(10));
        let (trainer, store) = trainer_with(&dir, embedder);

        let summary = trainer
            .train(strings(&["quick one", "slow one", "quick two"]))
            .await
            .unwrap();

        assert_eq!(summary.sentences, 3);
        assert_eq!(summary.degraded, 1);
        let corpus = store.snapshot().await;
        assert_eq!(corpus.get(1).unwrap().embedding, vec![0.0; 16]);
        assert!(!is_zero(&corpus.get(0).unwrap().embedding));
        assert!(!is_zero(&corpus.get(2).unwrap().embedding));
    }

    #[tokio::test]
    async fn test_failed_save_keeps_previous_corpus() {
        let dir = TempDir::new().unwrap();
        let (trainer, store) = trainer(&dir, Arc::new(HashingProvider::new()));
        trainer.train(strings(&["alpha"])).await.unwrap();

        // a directory where the file should be makes the rename fail
        let path = dir.path().join("sentences.json");
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        let err = trainer.train(strings(&["beta"])).await.unwrap_err();
        assert!(matches!(err, MatcherError::Storage(_) | MatcherError::Io(_)));
        assert_eq!(store.snapshot().await.sentences().collect::<Vec<_>>(), vec!["alpha"]);
    }

    #[tokio::test]
    async fn test_restore_yields_to_trained_corpus() {
        let dir = TempDir::new().unwrap();
        let (trainer, store) = trainer(&dir, Arc::new(HashingProvider::new()));
        trainer.train(strings(&["trained"])).await.unwrap();

        let summary = trainer.restore(strings(&["stale"])).await.unwrap();

        assert!(summary.superseded);
        assert_eq!(store.snapshot().await.sentences().collect::<Vec<_>>(), vec!["trained"]);
    }
}
