//! Load-once handle over an [`EmbeddingProvider`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::Embedding;
use crate::error::{EmbeddingError, Result};
use crate::provider::{EmbeddingProvider, EmbeddingRequest};
use crate::similarity::zero_embedding;

/// Lifecycle of the underlying provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbedderState {
    /// `ensure_loaded` has not been called yet.
    Unloaded,
    /// A load is in flight.
    Loading,
    /// The provider is ready to embed.
    Ready,
    /// The load failed. Terminal for this process.
    Failed,
}

#[derive(Default)]
struct LoadState {
    outcome: OnceCell<std::result::Result<(), String>>,
    loading: AtomicBool,
}

/// Cloneable handle that turns sentences into vectors of a fixed dimension.
///
/// The provider is loaded at most once per handle (and all of its clones).
/// Every vector returned by [`Embedder::embed`] has exactly
/// [`Embedder::dimension`] finite components.
#[derive(Clone)]
pub struct Embedder {
    provider: Arc<dyn EmbeddingProvider>,
    dimension: usize,
    timeout: Option<Duration>,
    state: Arc<LoadState>,
}

impl Embedder {
    /// Wrap a provider. Nothing is loaded until [`Embedder::ensure_loaded`].
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        let dimension = provider.dimension();
        Self {
            provider,
            dimension,
            timeout: None,
            state: Arc::new(LoadState::default()),
        }
    }

    /// Bound each provider call by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Name of the wrapped provider.
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Number of components in every embedding.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn state(&self) -> EmbedderState {
        match self.state.outcome.get() {
            Some(Ok(())) => EmbedderState::Ready,
            Some(Err(_)) => EmbedderState::Failed,
            None if self.state.loading.load(Ordering::Acquire) => EmbedderState::Loading,
            None => EmbedderState::Unloaded,
        }
    }

    /// Load the provider if no load has happened yet.
    ///
    /// Concurrent callers share the single in-flight load. A failed load is
    /// remembered and returned to every later caller without touching the
    /// provider again.
    pub async fn ensure_loaded(&self) -> Result<()> {
        let outcome = self
            .state
            .outcome
            .get_or_init(|| async {
                self.state.loading.store(true, Ordering::Release);
                info!("Loading embedding provider: {}", self.provider.name());
                let outcome = self.provider.load().await.map_err(|e| e.to_string());
                match &outcome {
                    Ok(()) => info!(
                        "Embedding provider {} ready ({}d)",
                        self.provider.name(),
                        self.dimension
                    ),
                    Err(e) => warn!("Embedding provider {} failed to load: {e}", self.provider.name()),
                }
                self.state.loading.store(false, Ordering::Release);
                outcome
            })
            .await;

        outcome
            .clone()
            .map_err(|reason| EmbeddingError::LoadFailed {
                provider: self.provider.name().to_string(),
                reason,
            })
    }

    /// Embed `text`, validating the provider's answer.
    pub async fn embed(&self, text: &str) -> Result<Embedding> {
        if self.state() != EmbedderState::Ready {
            return Err(EmbeddingError::NotLoaded(self.provider.name().to_string()));
        }

        let request = EmbeddingRequest::new(text);
        let response = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.provider.embed(request))
                .await
                .map_err(|_| EmbeddingError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                })??,
            None => self.provider.embed(request).await?,
        };

        let embedding = self.validate(response.embedding)?;
        debug!("Embedded {} chars into {}d vector", text.len(), self.dimension);
        Ok(embedding)
    }

    /// Embed `text`, substituting the zero vector on any failure.
    pub async fn embed_or_zero(&self, text: &str) -> Embedding {
        match self.embed(text).await {
            Ok(embedding) => embedding,
            Err(e) => {
                warn!("Embedding failed, using zero vector: {e}");
                zero_embedding(self.dimension)
            }
        }
    }

    fn validate(&self, embedding: Embedding) -> Result<Embedding> {
        if embedding.is_empty() {
            return Err(EmbeddingError::EmptyEmbedding);
        }
        if embedding.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }
        if embedding.iter().any(|x| !x.is_finite()) {
            return Err(EmbeddingError::InvalidResponse(
                "embedding contains non-finite components".to_string(),
            ));
        }
        Ok(embedding)
    }
}

impl std::fmt::Debug for Embedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Embedder")
            .field("provider", &self.provider.name())
            .field("dimension", &self.dimension)
            .field("timeout", &self.timeout)
            .field("state", &self.state())
            .finish()
    }
}
