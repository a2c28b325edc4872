// Participant store adapters.
//
// The store itself is an external collaborator reached through the
// `ParticipantStore` trait. `ParticipantRepository` sits on top of it and owns
// the contract the draw core relies on: reads never fail the caller, writes
// report whether they were acknowledged, and a table or column that is not
// found under one naming convention is retried once under the other.

pub mod rest;
pub mod sqlite;

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::{Config, StoreBackend};
use crate::participant::{Participant, ParticipantId, Snapshot};

pub use rest::RestStore;
pub use sqlite::SqliteStore;

// ---------------------------------------------------------------------------
// Schema naming conventions
// ---------------------------------------------------------------------------

/// The two historical naming conventions for the participant table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaNaming {
    /// `Friends` table with `Id`, `Nome`, `TemSegredo`, `Segredo` columns.
    #[default]
    Capitalized,
    /// `friends` table with `id`, `nome`, `temsegredo`, `segredo` columns.
    Lowercase,
}

impl SchemaNaming {
    /// Both conventions, in row-normalization precedence order.
    pub const ALL: [SchemaNaming; 2] = [SchemaNaming::Capitalized, SchemaNaming::Lowercase];

    pub fn table(self) -> &'static str {
        match self {
            SchemaNaming::Capitalized => "Friends",
            SchemaNaming::Lowercase => "friends",
        }
    }

    pub fn id_column(self) -> &'static str {
        match self {
            SchemaNaming::Capitalized => "Id",
            SchemaNaming::Lowercase => "id",
        }
    }

    pub fn name_column(self) -> &'static str {
        match self {
            SchemaNaming::Capitalized => "Nome",
            SchemaNaming::Lowercase => "nome",
        }
    }

    pub fn flag_column(self) -> &'static str {
        match self {
            SchemaNaming::Capitalized => "TemSegredo",
            SchemaNaming::Lowercase => "temsegredo",
        }
    }

    pub fn target_column(self) -> &'static str {
        match self {
            SchemaNaming::Capitalized => "Segredo",
            SchemaNaming::Lowercase => "segredo",
        }
    }

    pub fn target_id_column(self) -> &'static str {
        match self {
            SchemaNaming::Capitalized => "SegredoId",
            SchemaNaming::Lowercase => "segredoid",
        }
    }

    pub fn alternate(self) -> Self {
        match self {
            SchemaNaming::Capitalized => SchemaNaming::Lowercase,
            SchemaNaming::Lowercase => SchemaNaming::Capitalized,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors and write payload
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("participant store is not configured")]
    NotConfigured,

    #[error("participant store unreachable: {0}")]
    Unavailable(String),

    /// The table or a column does not exist under the naming that was tried.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// The write was refused because it would reassign a participant or
    /// give one target to two drawers.
    #[error("assignment conflict: {0}")]
    Conflict(String),

    #[error("store rejected the request: {0}")]
    Rejected(String),

    #[error("malformed store response: {0}")]
    Malformed(String),
}

/// Fields written when a participant's draw is committed. Applying it sets
/// the participant's assigned flag and records the drawn target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentUpdate {
    pub target_id: ParticipantId,
    pub target_name: String,
}

impl AssignmentUpdate {
    pub fn for_target(target: &Participant) -> Self {
        AssignmentUpdate {
            target_id: target.id,
            target_name: target.name.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// ParticipantStore
// ---------------------------------------------------------------------------

/// A backing store for participant rows.
///
/// Implementations return raw rows keyed by the naming they were asked for;
/// normalization into `Participant` happens in the repository. A missing
/// table or column must surface as `StoreError::SchemaMismatch` so the
/// repository can retry under the alternate naming.
#[async_trait]
pub trait ParticipantStore: Send + Sync {
    /// Short human-readable description for logs.
    fn describe(&self) -> String;

    async fn fetch_rows(&self, naming: SchemaNaming) -> Result<Vec<Value>, StoreError>;

    /// Mark participant `id` as assigned to `update`'s target.
    ///
    /// Must only succeed if the row is unassigned or already assigned to the
    /// same target, which makes a repeated commit a no-op.
    async fn apply_assignment(
        &self,
        naming: SchemaNaming,
        id: ParticipantId,
        update: &AssignmentUpdate,
    ) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// ParticipantRepository
// ---------------------------------------------------------------------------

/// The repository the draw core talks to. Either backed by a store or
/// disabled because no store is configured.
pub enum ParticipantRepository {
    Active(ActiveRepository),
    Disabled,
}

/// A configured store plus the naming convention currently in use.
pub struct ActiveRepository {
    store: Box<dyn ParticipantStore>,
    primary: SchemaNaming,
    /// Set once the alternate naming has succeeded, so later calls try it
    /// first.
    use_alternate: AtomicBool,
}

impl ActiveRepository {
    fn naming(&self) -> SchemaNaming {
        if self.use_alternate.load(Ordering::Relaxed) {
            self.primary.alternate()
        } else {
            self.primary
        }
    }

    /// Run `op` under the current naming; on a schema mismatch retry it once
    /// under the alternate naming and remember which one worked.
    async fn with_naming_fallback<T, F, Fut>(&self, what: &str, op: F) -> Result<T, StoreError>
    where
        F: Fn(SchemaNaming) -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let naming = self.naming();
        match op(naming).await {
            Err(StoreError::SchemaMismatch(detail)) => {
                let alternate = naming.alternate();
                warn!(
                    %detail,
                    from = naming.table(),
                    to = alternate.table(),
                    "{what}: schema mismatch, retrying with alternate naming"
                );
                let result = op(alternate).await;
                if result.is_ok() {
                    self.use_alternate
                        .store(alternate != self.primary, Ordering::Relaxed);
                }
                result
            }
            other => other,
        }
    }
}

impl ParticipantRepository {
    /// Wrap a store. `primary` is the naming tried first.
    pub fn active(store: impl ParticipantStore + 'static, primary: SchemaNaming) -> Self {
        ParticipantRepository::Active(ActiveRepository {
            store: Box::new(store),
            primary,
            use_alternate: AtomicBool::new(false),
        })
    }

    /// Build the repository selected by the configuration.
    ///
    /// Missing credentials, a Supabase URL without an http(s) scheme or a
    /// local database that cannot be opened leave the repository `Disabled`: the app keeps running with no data.
    pub fn from_config(config: &Config) -> Self {
        let primary = config.store.primary_naming;
        match config.store.backend {
            StoreBackend::Rest => {
                let Some((url, key)) = config.store_credentials() else {
                    warn!("Supabase URL or anon key not set; running with an empty participant list");
                    return ParticipantRepository::Disabled;
                };
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    warn!(
                        "Supabase URL {url:?} is not an http(s) URL; \
                         running with an empty participant list"
                    );
                    return ParticipantRepository::Disabled;
                }
                let timeout = Duration::from_secs(config.store.request_timeout_secs);
                match RestStore::new(url, key, timeout, config.store.write_target_id) {
                    Ok(store) => ParticipantRepository::active(store, primary),
                    Err(e) => {
                        error!("failed to build REST participant store: {e}");
                        ParticipantRepository::Disabled
                    }
                }
            }
            StoreBackend::Sqlite => {
                let store = match SqliteStore::open(&config.sqlite.path, primary) {
                    Ok(store) => store,
                    Err(e) => {
                        error!("failed to open local participant database: {e:#}");
                        return ParticipantRepository::Disabled;
                    }
                };
                if !config.sqlite.seed.is_empty() {
                    match store.seed(&config.sqlite.seed) {
                        Ok(added) => info!("seeded {added} participants into local database"),
                        Err(e) => warn!("failed to seed local database: {e:#}"),
                    }
                }
                ParticipantRepository::active(store, primary)
            }
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, ParticipantRepository::Active(_))
    }

    /// Fetch the current snapshot, surfacing store errors.
    pub async fn try_list_participants(&self) -> Result<Snapshot, StoreError> {
        let repo = match self {
            ParticipantRepository::Active(repo) => repo,
            ParticipantRepository::Disabled => return Err(StoreError::NotConfigured),
        };

        let rows = repo
            .with_naming_fallback("list participants", |naming| repo.store.fetch_rows(naming))
            .await?;

        let total = rows.len();
        let participants: Vec<Participant> =
            rows.iter().filter_map(Participant::from_row).collect();
        if participants.len() < total {
            warn!(
                skipped = total - participants.len(),
                "ignored participant rows without a usable id"
            );
        }
        debug!(count = participants.len(), store = %repo.store.describe(), "participants loaded");
        Ok(Snapshot::new(participants))
    }

    /// Fetch the current snapshot. Never fails: an unreachable or
    /// unconfigured store yields an empty snapshot and a log entry.
    pub async fn list_participants(&self) -> Snapshot {
        match self.try_list_participants().await {
            Ok(snapshot) => snapshot,
            Err(StoreError::NotConfigured) => {
                warn!("participant store not configured; returning no participants");
                Snapshot::empty()
            }
            Err(e) => {
                error!("failed to load participants: {e}");
                Snapshot::empty()
            }
        }
    }

    /// Apply an assignment, surfacing store errors.
    pub async fn try_update_participant(
        &self,
        id: ParticipantId,
        update: &AssignmentUpdate,
    ) -> Result<(), StoreError> {
        let repo = match self {
            ParticipantRepository::Active(repo) => repo,
            ParticipantRepository::Disabled => return Err(StoreError::NotConfigured),
        };

        repo.with_naming_fallback("update participant", |naming| {
            repo.store.apply_assignment(naming, id, update)
        })
        .await
    }

    /// Apply an assignment. Returns whether the store acknowledged the write.
    pub async fn update_participant(&self, id: ParticipantId, update: &AssignmentUpdate) -> bool {
        match self.try_update_participant(id, update).await {
            Ok(()) => true,
            Err(StoreError::NotConfigured) => {
                warn!(participant = %id, "participant store not configured; draw result not saved");
                false
            }
            Err(e) => {
                error!(participant = %id, "failed to update participant: {e}");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
