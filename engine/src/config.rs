//! Configuration for the matching engine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MatcherError, Result};

/// File name of the persisted sentence list inside `data_dir`.
pub const DEFAULT_CORPUS_FILE: &str = "trained_sentences.json";

/// Similarity a best match must reach to be reported.
pub const DEFAULT_THRESHOLD: f32 = 0.3;

/// Configuration for the matching engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Directory holding the persisted sentence list.
    pub data_dir: PathBuf,

    /// File name of the persisted sentence list.
    pub corpus_file: String,

    /// Embedding provider configuration.
    pub embedding: EmbeddingConfig,

    /// Match acceptance configuration.
    pub matching: MatchingConfig,

    /// Training configuration.
    pub training: TrainingConfig,
}

impl MatcherConfig {
    /// Create a new configuration with default values.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            corpus_file: DEFAULT_CORPUS_FILE.to_string(),
            embedding: EmbeddingConfig::default(),
            matching: MatchingConfig::default(),
            training: TrainingConfig::default(),
        }
    }

    /// Read a TOML configuration file. Missing keys fall back to defaults.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
            .map_err(|e| MatcherError::Config(format!("{}: {e}", path.display())))
    }

    /// Parse a TOML configuration document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| MatcherError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Set the embedding configuration.
    pub fn with_embedding(mut self, config: EmbeddingConfig) -> Self {
        self.embedding = config;
        self
    }

    /// Set the acceptance threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.matching.threshold = threshold;
        self
    }

    /// Full path of the persisted sentence list.
    pub fn corpus_path(&self) -> PathBuf {
        self.data_dir.join(&self.corpus_file)
    }

    /// Reject values the engine cannot honour.
    pub fn validate(&self) -> Result<()> {
        let threshold = self.matching.threshold;
        if !(-1.0..=1.0).contains(&threshold) {
            return Err(MatcherError::Config(format!(
                "threshold must be within [-1, 1], got {threshold}"
            )));
        }
        if self.training.max_concurrency == 0 {
            return Err(MatcherError::Config(
                "training.max_concurrency must be greater than zero".to_string(),
            ));
        }
        if self.corpus_file.is_empty() {
            return Err(MatcherError::Config("corpus_file must not be empty".to_string()));
        }
        if self.embedding.dimension == Some(0) {
            return Err(MatcherError::Config(
                "embedding.dimension must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self::new(dirs::data_dir().unwrap_or_default().join("refmatch"))
    }
}

/// Configuration for the embedding provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Which provider to use.
    pub provider: EmbeddingProviderType,

    /// Model to use for embeddings.
    pub model: Option<String>,

    /// Vector dimension override.
    pub dimension: Option<usize>,

    /// Base URL for OpenAI-compatible endpoints.
    pub base_url: Option<String>,
}

/// Type of embedding provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProviderType {
    /// OpenAI embeddings API (key from `OPENAI_API_KEY`).
    #[serde(rename = "openai")]
    OpenAI,
    /// Offline feature-hashing embeddings.
    #[default]
    Hashing,
}

/// Configuration for match acceptance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Minimum cosine similarity for a confident match.
    pub threshold: f32,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// Configuration for training.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Maximum number of sentences embedded at once.
    pub max_concurrency: usize,

    /// Per-sentence embedding timeout in seconds. No timeout when unset.
    pub embed_timeout_secs: Option<u64>,
}

impl TrainingConfig {
    pub fn embed_timeout(&self) -> Option<Duration> {
        self.embed_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 16,
            embed_timeout_secs: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = MatcherConfig::new("/tmp/refmatch");
        assert_eq!(config.matching.threshold, 0.3);
        assert_eq!(config.training.max_concurrency, 16);
        assert_eq!(config.embedding.provider, EmbeddingProviderType::Hashing);
        assert_eq!(
            config.corpus_path(),
            PathBuf::from("/tmp/refmatch/trained_sentences.json")
        );
    }

    #[test]
    fn test_partial_toml() {
        let config = MatcherConfig::from_toml_str(
            r#"
            data_dir = "/var/lib/refmatch"

            [embedding]
            provider = "openai"
            model = "text-embedding-3-large"

            [matching]
            threshold = 0.5
            "#,
        )
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/var/lib/refmatch"));
        assert_eq!(config.embedding.provider, EmbeddingProviderType::OpenAI);
        assert_eq!(config.embedding.model.as_deref(), Some("text-embedding-3-large"));
        assert_eq!(config.matching.threshold, 0.5);
        assert_eq!(config.corpus_file, DEFAULT_CORPUS_FILE);
        assert_eq!(config.training.embed_timeout(), None);
    }

    #[test]
    fn test_rejects_out_of_range_threshold() {
        let err = MatcherConfig::from_toml_str("[matching]\nthreshold = 1.5\n").unwrap_err();
        assert!(matches!(err, MatcherError::Config(_)));
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let err =
            MatcherConfig::from_toml_str("[training]\nmax_concurrency = 0\n").unwrap_err();
        assert!(matches!(err, MatcherError::Config(_)));
    }
}
