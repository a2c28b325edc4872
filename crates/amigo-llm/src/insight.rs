// Insight result type, its error taxonomy, and the generator capability.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use amigo_core::participant::Participant;

/// A short, playful commentary about the group and its draw progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insight {
    pub summary: String,
    pub funny_fact: String,
    pub recommendation: String,
}

#[derive(Debug, Error)]
pub enum InsightError {
    #[error("insight request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("insight service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("insight service returned no text")]
    EmptyResponse,

    #[error("insight response is not a valid insight: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Something that can comment on the participant list.
///
/// Failures are swallowed: an implementation logs what went wrong and
/// returns `None`.
#[async_trait]
pub trait InsightGenerator: Send + Sync {
    async fn generate_insight(&self, participants: &[Participant]) -> Option<Insight>;
}
