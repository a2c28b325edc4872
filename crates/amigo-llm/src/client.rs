// Gemini `generateContent` client for the optional insight panel.
//
// One JSON request per insight, asking for structured output that matches
// `prompt::response_schema()`. Every failure is logged and turned into
// `None`; the caller never sees an error.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use amigo_core::config::Config;
use amigo_core::participant::Participant;

use crate::insight::{Insight, InsightError, InsightGenerator};
use crate::prompt::request_body;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest error body kept in `InsightError::Status`.
const MAX_ERROR_BODY: usize = 300;

// ---------------------------------------------------------------------------
// GeminiClient
// ---------------------------------------------------------------------------

/// Low-level Gemini API client.
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: &str,
    ) -> Result<Self, InsightError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    /// Ask the model for an insight, surfacing every failure.
    pub async fn request_insight(
        &self,
        participants: &[Participant],
    ) -> Result<Insight, InsightError> {
        debug!(model = %self.model, participants = participants.len(), "requesting insight");

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body(participants))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(InsightError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        let text = parse_candidate_text(&body).ok_or(InsightError::EmptyResponse)?;
        Ok(parse_insight(&text)?)
    }
}

#[async_trait]
impl InsightGenerator for GeminiClient {
    async fn generate_insight(&self, participants: &[Participant]) -> Option<Insight> {
        match self.request_insight(participants).await {
            Ok(insight) => {
                info!("insight generated");
                Some(insight)
            }
            Err(e) => {
                warn!("insight generation failed: {e}");
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// InsightClient wrapper
// ---------------------------------------------------------------------------

/// Either a configured Gemini client or disabled.
pub enum InsightClient {
    Active(GeminiClient),
    /// No API key configured.
    Disabled,
}

impl InsightClient {
    /// `Active` when a Gemini API key and an http(s) base URL are
    /// configured, otherwise `Disabled`.
    pub fn from_config(config: &Config) -> Self {
        let Some(key) = config.insight_api_key() else {
            info!("Gemini API key not set; insights disabled");
            return InsightClient::Disabled;
        };
        let base_url = config.insight.base_url.as_str();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            warn!("insight base URL {base_url:?} is not an http(s) URL; insights disabled");
            return InsightClient::Disabled;
        }
        match GeminiClient::new(key, config.insight.model.clone(), &config.insight.base_url) {
            Ok(client) => InsightClient::Active(client),
            Err(e) => {
                warn!("failed to build insight client: {e}");
                InsightClient::Disabled
            }
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, InsightClient::Active(_))
    }
}

#[async_trait]
impl InsightGenerator for InsightClient {
    async fn generate_insight(&self, participants: &[Participant]) -> Option<Insight> {
        match self {
            InsightClient::Active(client) => client.generate_insight(participants).await,
            InsightClient::Disabled => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Response parsing helpers
// ---------------------------------------------------------------------------

/// Concatenated text of the first candidate.
///
/// Expected shape: `{ "candidates": [{ "content": { "parts": [{ "text": "..." }] } }] }`
pub(crate) fn parse_candidate_text(body: &str) -> Option<String> {
    let v: Value = serde_json::from_str(body).ok()?;
    let parts = v
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();
    (!text.trim().is_empty()).then_some(text)
}

/// Decode the model's JSON answer. Tolerates a surrounding markdown code
/// fence.
pub(crate) fn parse_insight(text: &str) -> Result<Insight, serde_json::Error> {
    let trimmed = text.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|rest| rest.trim_end().trim_end_matches("```"))
        .unwrap_or(trimmed);
    serde_json::from_str(unfenced.trim())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
