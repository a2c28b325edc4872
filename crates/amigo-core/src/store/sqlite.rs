// SQLite participant store for local and offline use.
//
// Unlike the hosted table, this schema is owned here, so it carries the
// constraints the draw relies on: a participant can be drawn by at most one
// assigned row, and an assigned row only accepts a repeat of its own target.

use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, ErrorCode};
use serde_json::{Map, Value};

use super::{AssignmentUpdate, ParticipantStore, SchemaNaming, StoreError};
use crate::participant::ParticipantId;

pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: String,
    /// Naming the table was created under. SQLite identifiers are
    /// case-insensitive, so either naming can still read it.
    naming: SchemaNaming,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and ensure the participant
    /// table exists under `naming`. Pass `":memory:"` for an ephemeral
    /// database.
    pub fn open(path: &str, naming: SchemaNaming) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open participant database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        let table = naming.table();
        let id = naming.id_column();
        let name = naming.name_column();
        let flag = naming.flag_column();
        let target = naming.target_column();
        let target_id = naming.target_id_column();

        conn.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS "{table}" (
                "{id}"        INTEGER PRIMARY KEY AUTOINCREMENT,
                "{name}"      TEXT NOT NULL UNIQUE,
                "{flag}"      INTEGER NOT NULL DEFAULT 0,
                "{target}"    TEXT,
                "{target_id}" INTEGER REFERENCES "{table}"("{id}")
            );

            CREATE UNIQUE INDEX IF NOT EXISTS "idx_{table}_assigned_target"
                ON "{table}"("{target}") WHERE "{flag}" = 1;

            CREATE UNIQUE INDEX IF NOT EXISTS "idx_{table}_assigned_target_id"
                ON "{table}"("{target_id}") WHERE "{flag}" = 1;
            "#
        ))
        .context("failed to create participant schema")?;

        Ok(SqliteStore {
            conn: Mutex::new(conn),
            path: path.to_string(),
            naming,
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock). This should never happen in normal operation.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    /// Insert any of `names` not already present. Returns how many rows were
    /// added. Participants are created outside the draw; this exists so a
    /// local database can be populated without a separate tool.
    pub fn seed(&self, names: &[String]) -> Result<usize> {
        let conn = self.conn();
        let sql = format!(
            r#"INSERT OR IGNORE INTO "{}" ("{}") VALUES (?1)"#,
            self.naming.table(),
            self.naming.name_column()
        );
        let mut added = 0;
        for name in names.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
            added += conn
                .execute(&sql, params![name])
                .with_context(|| format!("failed to seed participant {name}"))?;
        }
        Ok(added)
    }

    fn fetch_rows_blocking(&self, naming: SchemaNaming) -> Result<Vec<Value>, StoreError> {
        let conn = self.conn();
        let sql = format!(
            r#"SELECT "{id}", "{name}", "{flag}", "{target}", "{target_id}" FROM "{table}" ORDER BY "{id}""#,
            id = naming.id_column(),
            name = naming.name_column(),
            flag = naming.flag_column(),
            target = naming.target_column(),
            target_id = naming.target_id_column(),
            table = naming.table(),
        );
        let mut stmt = conn.prepare(&sql).map_err(classify_sqlite_error)?;

        let rows = stmt
            .query_map([], |row| {
                let mut obj = Map::new();
                obj.insert(naming.id_column().into(), Value::from(row.get::<_, i64>(0)?));
                obj.insert(naming.name_column().into(), Value::from(row.get::<_, String>(1)?));
                obj.insert(naming.flag_column().into(), Value::Bool(row.get::<_, i64>(2)? != 0));
                obj.insert(
                    naming.target_column().into(),
                    row.get::<_, Option<String>>(3)?.map_or(Value::Null, Value::from),
                );
                obj.insert(
                    naming.target_id_column().into(),
                    row.get::<_, Option<i64>>(4)?.map_or(Value::Null, Value::from),
                );
                Ok(Value::Object(obj))
            })
            .map_err(classify_sqlite_error)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(classify_sqlite_error)?;

        Ok(rows)
    }

    fn apply_assignment_blocking(
        &self,
        naming: SchemaNaming,
        id: ParticipantId,
        update: &AssignmentUpdate,
    ) -> Result<(), StoreError> {
        let conn = self.conn();
        let sql = format!(
            r#"UPDATE "{table}" SET "{flag}" = 1, "{target}" = ?2, "{target_id}" = ?3
               WHERE "{id}" = ?1 AND ("{flag}" = 0 OR "{target}" = ?2)"#,
            table = naming.table(),
            flag = naming.flag_column(),
            target = naming.target_column(),
            target_id = naming.target_id_column(),
            id = naming.id_column(),
        );
        let changed = conn
            .execute(&sql, params![id.0, update.target_name, update.target_id.0])
            .map_err(classify_sqlite_error)?;

        if changed == 0 {
            return Err(StoreError::Conflict(format!(
                "participant {id} does not exist or already drew someone else"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ParticipantStore for SqliteStore {
    fn describe(&self) -> String {
        format!("sqlite({})", self.path)
    }

    async fn fetch_rows(&self, naming: SchemaNaming) -> Result<Vec<Value>, StoreError> {
        self.fetch_rows_blocking(naming)
    }

    async fn apply_assignment(
        &self,
        naming: SchemaNaming,
        id: ParticipantId,
        update: &AssignmentUpdate,
    ) -> Result<(), StoreError> {
        self.apply_assignment_blocking(naming, id, update)
    }
}

fn classify_sqlite_error(e: rusqlite::Error) -> StoreError {
    let message = e.to_string();
    if message.contains("no such table") || message.contains("no such column") {
        return StoreError::SchemaMismatch(message);
    }
    match e {
        rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation => {
            StoreError::Conflict(message)
        }
        rusqlite::Error::SqliteFailure(err, _)
            if matches!(err.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) =>
        {
            StoreError::Unavailable(message)
        }
        _ => StoreError::Rejected(message),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ParticipantRepository;

    fn seeded(naming: SchemaNaming) -> SqliteStore {
        let store = SqliteStore::open(":memory:", naming).unwrap();
        let names: Vec<String> = ["Ana", "Bea", "Cid"].iter().map(|s| s.to_string()).collect();
        assert_eq!(store.seed(&names).unwrap(), 3);
        store
    }

    fn update(id: i64, name: &str) -> AssignmentUpdate {
        AssignmentUpdate {
            target_id: ParticipantId(id),
            target_name: name.into(),
        }
    }

    #[test]
    fn seed_is_idempotent() {
        let store = seeded(SchemaNaming::Capitalized);
        let again: Vec<String> = vec!["Ana".into(), "  ".into(), "Dan".into()];
        assert_eq!(store.seed(&again).unwrap(), 1);
        let rows = store.fetch_rows_blocking(SchemaNaming::Capitalized).unwrap();
        assert_eq!(rows.len(), 4);
    }

    #[test]
    fn rows_use_requested_naming() {
        let store = seeded(SchemaNaming::Lowercase);
        let rows = store.fetch_rows_blocking(SchemaNaming::Lowercase).unwrap();
        assert_eq!(rows[0]["id"], 1);
        assert_eq!(rows[0]["nome"], "Ana");
        assert_eq!(rows[0]["temsegredo"], false);
        assert!(rows[0]["segredo"].is_null());
    }

    #[test]
    fn assignment_is_idempotent_for_same_target() {
        let store = seeded(SchemaNaming::Capitalized);
        let naming = SchemaNaming::Capitalized;
        store
            .apply_assignment_blocking(naming, ParticipantId(1), &update(2, "Bea"))
            .unwrap();
        store
            .apply_assignment_blocking(naming, ParticipantId(1), &update(2, "Bea"))
            .unwrap();

        let rows = store.fetch_rows_blocking(naming).unwrap();
        assert_eq!(rows[0]["TemSegredo"], true);
        assert_eq!(rows[0]["Segredo"], "Bea");
        assert_eq!(rows[0]["SegredoId"], 2);
    }

    #[test]
    fn reassignment_is_refused() {
        let store = seeded(SchemaNaming::Capitalized);
        let naming = SchemaNaming::Capitalized;
        store
            .apply_assignment_blocking(naming, ParticipantId(1), &update(2, "Bea"))
            .unwrap();
        let err = store
            .apply_assignment_blocking(naming, ParticipantId(1), &update(3, "Cid"))
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn same_target_for_two_drawers_is_refused() {
        let store = seeded(SchemaNaming::Capitalized);
        let naming = SchemaNaming::Capitalized;
        store
            .apply_assignment_blocking(naming, ParticipantId(1), &update(3, "Cid"))
            .unwrap();
        let err = store
            .apply_assignment_blocking(naming, ParticipantId(2), &update(3, "Cid"))
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)), "{err}");
    }

    #[test]
    fn unknown_participant_is_conflict() {
        let store = seeded(SchemaNaming::Capitalized);
        let err = store
            .apply_assignment_blocking(SchemaNaming::Capitalized, ParticipantId(42), &update(1, "Ana"))
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn missing_column_is_schema_mismatch() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(r#"CREATE TABLE "friends" ("id" INTEGER PRIMARY KEY, "nome" TEXT);"#)
            .unwrap();
        let store = SqliteStore {
            conn: Mutex::new(conn),
            path: ":memory:".into(),
            naming: SchemaNaming::Lowercase,
        };
        let err = store
            .fetch_rows_blocking(SchemaNaming::Lowercase)
            .unwrap_err();
        assert!(matches!(err, StoreError::SchemaMismatch(_)), "{err}");
    }

    #[test]
    fn missing_table_is_schema_mismatch() {
        let conn = Connection::open_in_memory().unwrap();
        let store = SqliteStore {
            conn: Mutex::new(conn),
            path: ":memory:".into(),
            naming: SchemaNaming::Lowercase,
        };
        let err = store
            .fetch_rows_blocking(SchemaNaming::Capitalized)
            .unwrap_err();
        assert!(matches!(err, StoreError::SchemaMismatch(_)));
    }

    #[tokio::test]
    async fn repository_over_sqlite_round_trip() {
        let repo = ParticipantRepository::active(
            seeded(SchemaNaming::Lowercase),
            SchemaNaming::Capitalized,
        );
        assert!(repo.update_participant(ParticipantId(2), &update(3, "Cid")).await);

        let snapshot = repo.list_participants().await;
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.assigned_count(), 1);
        let bea = snapshot.get(ParticipantId(2)).unwrap();
        assert_eq!(bea.assigned_target_name.as_deref(), Some("Cid"));
        assert_eq!(bea.assigned_target_id, Some(ParticipantId(3)));
    }

    #[test]
    fn file_database_persists_across_opens() {
        let dir = std::env::temp_dir().join("amigo_sqlite_persist");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("participants.db");
        let path = path.to_str().unwrap();

        {
            let store = SqliteStore::open(path, SchemaNaming::Capitalized).unwrap();
            store.seed(&["Ana".to_string(), "Bea".to_string()]).unwrap();
            store
                .apply_assignment_blocking(SchemaNaming::Capitalized, ParticipantId(1), &update(2, "Bea"))
                .unwrap();
        }

        let store = SqliteStore::open(path, SchemaNaming::Capitalized).unwrap();
        let rows = store.fetch_rows_blocking(SchemaNaming::Capitalized).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["Segredo"], "Bea");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
