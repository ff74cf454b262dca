//! Durable record of the trained sentences.
//!
//! Only the sentences are written, as a JSON array of strings. Embeddings
//! are recomputed whenever the list is loaded back.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info};

use crate::error::{MatcherError, Result};

/// JSON file holding the last trained sentence list.
#[derive(Debug, Clone)]
pub struct SentenceStore {
    path: PathBuf,
}

impl SentenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exists(&self) -> bool {
        fs::try_exists(&self.path).await.unwrap_or(false)
    }

    /// Overwrite the stored list with `sentences`.
    ///
    /// The file is replaced atomically, so a crash mid-write leaves the
    /// previous list intact.
    pub async fn save(&self, sentences: &[String]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| MatcherError::Storage(format!("{}: {e}", parent.display())))?;
        }

        let content = serde_json::to_string_pretty(sentences)?;

        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, &content)
            .await
            .map_err(|e| MatcherError::Storage(format!("{}: {e}", temp_path.display())))?;

        fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| MatcherError::Storage(format!("{}: {e}", self.path.display())))?;

        info!(
            "Persisted {} trained sentences to {}",
            sentences.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Read the stored list. `None` when nothing has been persisted yet.
    pub async fn load(&self) -> Result<Option<Vec<String>>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No persisted sentences at {}", self.path.display());
                return Ok(None);
            }
            Err(e) => {
                return Err(MatcherError::Storage(format!(
                    "{}: {e}",
                    self.path.display()
                )));
            }
        };

        let sentences: Vec<String> = serde_json::from_str(&content)?;
        debug!(
            "Loaded {} persisted sentences from {}",
            sentences.len(),
            self.path.display()
        );
        Ok(Some(sentences))
    }
}
