//! Wire shapes handed to the client-facing layer.
//!
//! Both types serialize to camelCase JSON; absent values become `null`.

use serde::{Deserialize, Serialize};

use crate::matcher::MatchOutcome;
use crate::trainer::TrainSummary;

/// Reply to a `trainModel` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainModelResponse {
    pub success: bool,

    /// Human-readable outcome, including the failure reason.
    pub message: String,

    /// Sentences in the trained corpus; zero on failure.
    pub sentence_count: usize,
}

impl TrainModelResponse {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            sentence_count: 0,
        }
    }
}

impl From<&TrainSummary> for TrainModelResponse {
    fn from(summary: &TrainSummary) -> Self {
        let message = if summary.superseded {
            format!(
                "Trained {} sentences, but a newer training run replaced them",
                summary.sentences
            )
        } else if summary.degraded > 0 {
            format!(
                "Trained {} sentences ({} could not be embedded and will never match)",
                summary.sentences, summary.degraded
            )
        } else {
            format!("Trained {} sentences", summary.sentences)
        };

        Self {
            success: true,
            message,
            sentence_count: summary.sentences,
        }
    }
}

/// Reply to a `testSentence` call.
///
/// `bestMatch` is set only for a confident match. `bestScore` without
/// `bestMatch` means the best candidate was below the threshold; both
/// `null` means there was no data or the query could not be embedded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSentenceResponse {
    pub best_match: Option<String>,
    pub best_score: Option<f32>,
}

impl From<&MatchOutcome> for TestSentenceResponse {
    fn from(outcome: &MatchOutcome) -> Self {
        Self {
            best_match: outcome.best_sentence().map(str::to_string),
            best_score: outcome.best_score(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn summary(degraded: usize, superseded: bool) -> TrainSummary {
        TrainSummary {
            sentences: 3,
            degraded,
            dimension: 384,
            generation: 1,
            superseded,
            trained_at: Utc::now(),
        }
    }

    #[test]
    fn test_train_response_messages() {
        assert_eq!(
            TrainModelResponse::from(&summary(0, false)).message,
            "Trained 3 sentences"
        );
        assert!(
            TrainModelResponse::from(&summary(1, false))
                .message
                .contains("1 could not be embedded")
        );
        assert!(TrainModelResponse::from(&summary(0, true)).success);
    }

    #[test]
    fn test_response_json_shape() {
        let below = TestSentenceResponse::from(&MatchOutcome::BelowThreshold { score: 0.125 });
        assert_eq!(
            serde_json::to_value(&below).unwrap(),
            serde_json::json!({ "bestMatch": null, "bestScore": 0.125 })
        );

        let none = TestSentenceResponse::from(&MatchOutcome::NoData);
        assert_eq!(
            serde_json::to_value(&none).unwrap(),
            serde_json::json!({ "bestMatch": null, "bestScore": null })
        );

        let failure = TrainModelResponse::failure("no sentences to train on");
        assert_eq!(
            serde_json::to_value(&failure).unwrap(),
            serde_json::json!({
                "success": false,
                "message": "no sentences to train on",
                "sentenceCount": 0
            })
        );
    }
}
