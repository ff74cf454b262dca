//! The sentence matching service.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use refmatch_embeddings::{
    Embedder, EmbedderState, EmbeddingProvider, HashingProvider, OpenAIProvider,
};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::api::{TestSentenceResponse, TrainModelResponse};
use crate::config::{EmbeddingConfig, EmbeddingProviderType, MatcherConfig};
use crate::corpus::VectorStore;
use crate::error::Result;
use crate::matcher::{MatchOutcome, Matcher, RankedMatch, Readiness};
use crate::persistence::SentenceStore;
use crate::trainer::{TrainSummary, Trainer};

/// Owns the embedder, the trained corpus, and its persisted sentence list.
///
/// This is the entry point callers use:
/// - `train` replaces the corpus and persists its sentences
/// - `match_sentence` finds the closest reference sentence
/// - `train_model` / `test_sentence` wrap both in their wire shapes
pub struct SentenceMatcher {
    config: MatcherConfig,
    embedder: Embedder,
    store: Arc<VectorStore>,
    sentences: SentenceStore,
    trainer: Arc<Trainer>,
    matcher: Matcher,
}

impl SentenceMatcher {
    /// Create a new service builder.
    pub fn builder() -> SentenceMatcherBuilder {
        SentenceMatcherBuilder::new()
    }

    /// Create the service with an explicit provider.
    pub fn new(config: MatcherConfig, provider: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        config.validate()?;

        let mut embedder = Embedder::new(provider);
        if let Some(timeout) = config.training.embed_timeout() {
            embedder = embedder.with_timeout(timeout);
        }

        let store = Arc::new(VectorStore::new());
        let sentences = SentenceStore::new(config.corpus_path());
        let trainer = Arc::new(Trainer::new(
            embedder.clone(),
            store.clone(),
            sentences.clone(),
            config.training.max_concurrency,
        ));
        let matcher = Matcher::new(
            embedder.clone(),
            store.clone(),
            trainer.clone(),
            sentences.clone(),
            config.matching.threshold,
        );

        info!(
            "Sentence matcher using {} embeddings, corpus at {}",
            embedder.provider_name(),
            sentences.path().display()
        );

        Ok(Self {
            config,
            embedder,
            store,
            sentences,
            trainer,
            matcher,
        })
    }

    /// Create the service with the provider named in `config`.
    pub fn from_config(config: MatcherConfig) -> Result<Self> {
        let provider = provider_from_config(&config.embedding);
        Self::new(config, provider)
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    pub fn embedder(&self) -> &Embedder {
        &self.embedder
    }

    /// Replace the corpus with `sentences`.
    pub async fn train(&self, sentences: Vec<String>) -> Result<TrainSummary> {
        self.trainer.train(sentences).await
    }

    /// See [`Matcher::ensure_ready`].
    pub async fn ensure_ready(&self) -> Result<Readiness> {
        self.matcher.ensure_ready().await
    }

    /// See [`Matcher::match_sentence`].
    pub async fn match_sentence(&self, query: &str) -> Result<MatchOutcome> {
        self.matcher.match_sentence(query).await
    }

    /// See [`Matcher::rank`].
    pub async fn rank(&self, query: &str, k: usize) -> Result<Vec<RankedMatch>> {
        self.matcher.rank(query, k).await
    }

    /// Drop the in-memory corpus, leaving the persisted list alone. The next
    /// match rebuilds it from disk.
    pub async fn clear_memory(&self) {
        self.store.clear().await;
    }

    /// Train and report the outcome as a [`TrainModelResponse`].
    pub async fn train_model(&self, sentences: Vec<String>) -> TrainModelResponse {
        match self.train(sentences).await {
            Ok(summary) => TrainModelResponse::from(&summary),
            Err(e) => {
                error!("Training failed: {e}");
                TrainModelResponse::failure(e.to_string())
            }
        }
    }

    /// Match and report the outcome as a [`TestSentenceResponse`].
    pub async fn test_sentence(&self, sentence: &str) -> TestSentenceResponse {
        match self.match_sentence(sentence).await {
            Ok(outcome) => TestSentenceResponse::from(&outcome),
            Err(e) => {
                warn!("Matching failed: {e}");
                TestSentenceResponse::default()
            }
        }
    }

    /// Get service statistics.
    pub async fn stats(&self) -> MatcherStats {
        let corpus = self.store.snapshot().await;
        MatcherStats {
            provider: self.embedder.provider_name().to_string(),
            dimension: self.embedder.dimension(),
            embedder_state: self.embedder.state(),
            entries: corpus.len(),
            generation: self.store.generation().await,
            last_trained_at: corpus.trained_at(),
            persisted: self.sentences.exists().await,
            corpus_path: self.sentences.path().to_path_buf(),
            threshold: self.matcher.threshold(),
        }
    }
}

/// Build the provider described by `config`.
pub fn provider_from_config(config: &EmbeddingConfig) -> Arc<dyn EmbeddingProvider> {
    match config.provider {
        EmbeddingProviderType::OpenAI => {
            let mut provider = OpenAIProvider::new();
            if let Some(model) = &config.model {
                provider = provider.with_model(model);
            }
            if let Some(base_url) = &config.base_url {
                provider = provider.with_base_url(base_url);
            }
            if let Some(dimension) = config.dimension {
                provider = provider.with_dimensions(dimension);
            }
            Arc::new(provider)
        }
        EmbeddingProviderType::Hashing => Arc::new(match config.dimension {
            Some(dimension) => HashingProvider::with_dimension(dimension),
            None => HashingProvider::new(),
        }),
    }
}

/// Builder for [`SentenceMatcher`].
pub struct SentenceMatcherBuilder {
    config: MatcherConfig,
    provider: Option<Arc<dyn EmbeddingProvider>>,
}

impl SentenceMatcherBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: MatcherConfig::default(),
            provider: None,
        }
    }

    /// Start from an existing configuration.
    pub fn with_config(mut self, config: MatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the directory holding the persisted sentence list.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.data_dir = dir.into();
        self
    }

    /// Use `provider` instead of the one named in the configuration.
    pub fn with_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the acceptance threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.config.matching.threshold = threshold;
        self
    }

    /// Bound the number of sentences embedded at once.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.config.training.max_concurrency = max_concurrency;
        self
    }

    /// Bound each embedding call, in seconds.
    pub fn with_embed_timeout_secs(mut self, secs: u64) -> Self {
        self.config.training.embed_timeout_secs = Some(secs);
        self
    }

    /// Build the service.
    pub fn build(self) -> Result<SentenceMatcher> {
        match self.provider {
            Some(provider) => SentenceMatcher::new(self.config, provider),
            None => SentenceMatcher::from_config(self.config),
        }
    }
}

impl Default for SentenceMatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about the service.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatcherStats {
    /// Embedding provider name.
    pub provider: String,

    /// Embedding dimension.
    pub dimension: usize,

    pub embedder_state: EmbedderState,

    /// Sentences in the in-memory corpus.
    pub entries: usize,

    /// Generation of the published corpus.
    pub generation: u64,

    pub last_trained_at: Option<DateTime<Utc>>,

    /// Whether a persisted sentence list exists.
    pub persisted: bool,

    pub corpus_path: PathBuf,

    pub threshold: f32,
}
