// PostgREST (Supabase) participant store over reqwest.
//
// Reads are a plain `select=*` on the participant table. Writes are a
// compare-and-swap PATCH: the row filter only matches while the participant
// is unassigned or already assigned to the same target, and
// `Prefer: return=representation` tells us whether any row matched.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::{AssignmentUpdate, ParticipantStore, SchemaNaming, StoreError};
use crate::participant::ParticipantId;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Postgres: relation does not exist.
const PG_UNDEFINED_TABLE: &str = "42P01";
/// Postgres: column does not exist.
const PG_UNDEFINED_COLUMN: &str = "42703";
/// Postgres: unique constraint violated.
const PG_UNIQUE_VIOLATION: &str = "23505";
/// PostgREST: column not found in the schema cache.
const PGRST_COLUMN_NOT_FOUND: &str = "PGRST204";
/// PostgREST: table not found in the schema cache.
const PGRST_TABLE_NOT_FOUND: &str = "PGRST205";

// ---------------------------------------------------------------------------
// RestStore
// ---------------------------------------------------------------------------

pub struct RestStore {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    write_target_id: bool,
}

impl RestStore {
    /// Create a store for the project at `base_url` (e.g.
    /// `https://xyz.supabase.co`) authenticated with the anon key.
    ///
    /// With `write_target_id` set, commits also write the target id column,
    /// which only exists on tables migrated to id-based assignments.
    pub fn new(
        base_url: &str,
        api_key: &str,
        timeout: Duration,
        write_target_id: bool,
    ) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Unavailable(format!("failed to build HTTP client: {e}")))?;
        Ok(RestStore {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            write_target_id,
        })
    }

    fn table_url(&self, naming: SchemaNaming) -> String {
        format!("{}/rest/v1/{}", self.base_url, naming.table())
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Vec<Value>, StoreError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_error(status, &body));
        }

        response
            .json::<Vec<Value>>()
            .await
            .map_err(|e| StoreError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl ParticipantStore for RestStore {
    fn describe(&self) -> String {
        format!("rest({})", self.base_url)
    }

    async fn fetch_rows(&self, naming: SchemaNaming) -> Result<Vec<Value>, StoreError> {
        let url = self.table_url(naming);
        debug!(%url, "fetching participant rows");
        self.send(self.http.get(&url).query(&[("select", "*")])).await
    }

    async fn apply_assignment(
        &self,
        naming: SchemaNaming,
        id: ParticipantId,
        update: &AssignmentUpdate,
    ) -> Result<(), StoreError> {
        let url = self.table_url(naming);

        let mut body = Map::new();
        body.insert(naming.flag_column().to_string(), Value::Bool(true));
        body.insert(
            naming.target_column().to_string(),
            Value::String(update.target_name.clone()),
        );
        if self.write_target_id {
            body.insert(
                naming.target_id_column().to_string(),
                Value::from(update.target_id.0),
            );
        }

        let id_filter = format!("eq.{}", id.0);
        let cas_filter = assignment_guard(naming, &update.target_name);
        debug!(%url, participant = %id, filter = %cas_filter, "applying assignment");

        let request = self
            .http
            .patch(&url)
            .query(&[(naming.id_column(), id_filter.as_str()), ("or", cas_filter.as_str())])
            .header("Prefer", "return=representation")
            .json(&Value::Object(body));

        let updated = self.send(request).await?;
        if updated.is_empty() {
            return Err(StoreError::Conflict(format!(
                "participant {id} does not exist or already drew someone else"
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// PostgREST error body.
#[derive(Debug, Deserialize)]
struct PostgrestError {
    code: Option<String>,
    message: Option<String>,
}

/// Row filter admitting only rows that are unassigned or already assigned to
/// `target_name`.
pub(crate) fn assignment_guard(naming: SchemaNaming, target_name: &str) -> String {
    format!(
        "({flag}.not.is.true,{target}.eq.{value})",
        flag = naming.flag_column(),
        target = naming.target_column(),
        value = quote_filter_value(target_name),
    )
}

/// Double-quote a value for use inside a PostgREST logical filter.
pub(crate) fn quote_filter_value(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

/// Map an unsuccessful PostgREST response onto the store error taxonomy.
pub(crate) fn classify_error(status: StatusCode, body: &str) -> StoreError {
    let parsed: Option<PostgrestError> = serde_json::from_str(body).ok();
    let code = parsed
        .as_ref()
        .and_then(|e| e.code.as_deref())
        .unwrap_or_default();
    let message = parsed
        .as_ref()
        .and_then(|e| e.message.clone())
        .unwrap_or_else(|| body.trim().to_string());

    match code {
        PG_UNDEFINED_TABLE | PG_UNDEFINED_COLUMN | PGRST_COLUMN_NOT_FOUND
        | PGRST_TABLE_NOT_FOUND => StoreError::SchemaMismatch(format!("{code}: {message}")),
        PG_UNIQUE_VIOLATION => StoreError::Conflict(message),
        _ if status.is_server_error() => {
            StoreError::Unavailable(format!("status {status}: {message}"))
        }
        _ => StoreError::Rejected(format!("status {status}: {message}")),
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
