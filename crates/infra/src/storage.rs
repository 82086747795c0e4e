//! SQLite-backed durable store for the override and snapshot entries.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use sqlx::Row;
use tokio::sync::Mutex;

use congrega_auth::FilialOverride;
use congrega_session::gateway::ResolvedContext;
use congrega_session::snapshot::CachedSnapshot;
use congrega_session::store::{
    OVERRIDE_KEY, OverrideStore, SNAPSHOT_KEY, SnapshotStore, StoreError,
};

/// SQLite key/JSON store implementing both durable-store ports.
///
/// One `session_state` table, keyed entry name to payload. Writes are
/// last-write-wins upserts; reads tolerate missing and corrupt rows.
#[derive(Debug, Clone)]
pub struct SqliteStateStore {
    /// Lazily initialized shared pool; cheap to clone across tasks.
    pool: Arc<Mutex<Option<SqlitePool>>>,
    path: PathBuf,
}

impl SqliteStateStore {
    /// Create a store over the given database path (lazy initialization).
    pub fn new(path: PathBuf) -> Self {
        Self {
            pool: Arc::new(Mutex::new(None)),
            path,
        }
    }

    /// Store at the platform-conventional location:
    /// `{app_data_dir}/congrega/session.db`.
    pub fn at_default_path() -> anyhow::Result<Self> {
        let base = dirs::data_dir()
            .or_else(|| {
                dirs::home_dir().map(|mut h| {
                    h.push(".local");
                    h.push("share");
                    h
                })
            })
            .context("failed to resolve OS app data directory")?;

        let mut path = base;
        path.push("congrega");
        std::fs::create_dir_all(&path)
            .with_context(|| format!("failed to create data directory at {:?}", path))?;
        path.push("session.db");

        Ok(Self::new(path))
    }

    async fn ensure_initialized(&self) -> anyhow::Result<()> {
        let mut pool_guard = self.pool.lock().await;
        if pool_guard.is_some() {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory at {:?}", parent))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&self.path)
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(options)
            .await
            .with_context(|| format!("failed to open session store at {:?}", self.path))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS session_state (
                entry_key  TEXT NOT NULL PRIMARY KEY,
                payload    TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .context("failed to create session_state table")?;

        *pool_guard = Some(pool);
        Ok(())
    }

    async fn get_pool(&self) -> anyhow::Result<SqlitePool> {
        self.ensure_initialized().await?;
        let pool_guard = self.pool.lock().await;
        pool_guard
            .clone()
            .context("session store pool missing after initialization")
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let pool = self.get_pool().await?;

        let row = sqlx::query(
            r#"
            SELECT payload
            FROM session_state
            WHERE entry_key = ?1
            "#,
        )
        .bind(key)
        .fetch_optional(&pool)
        .await
        .with_context(|| format!("failed to read session entry '{key}'"))?;

        match row {
            Some(row) => Ok(Some(row.try_get("payload")?)),
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, payload: &str) -> anyhow::Result<()> {
        let pool = self.get_pool().await?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO session_state (entry_key, payload, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(entry_key)
            DO UPDATE SET
                payload = excluded.payload,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(payload)
        .bind(&now)
        .execute(&pool)
        .await
        .with_context(|| format!("failed to upsert session entry '{key}'"))?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        let pool = self.get_pool().await?;

        sqlx::query(
            r#"
            DELETE FROM session_state
            WHERE entry_key = ?1
            "#,
        )
        .bind(key)
        .execute(&pool)
        .await
        .with_context(|| format!("failed to delete session entry '{key}'"))?;

        Ok(())
    }
}

fn backend(err: anyhow::Error) -> StoreError {
    StoreError::Backend(format!("{err:#}"))
}

#[async_trait]
impl OverrideStore for SqliteStateStore {
    async fn read(&self) -> Result<Option<FilialOverride>, StoreError> {
        let Some(payload) = self.get(OVERRIDE_KEY).await.map_err(backend)? else {
            return Ok(None);
        };
        match serde_json::from_str(&payload) {
            Ok(choice) => Ok(Some(choice)),
            Err(err) => {
                tracing::warn!("corrupt override entry, treating as absent: {err}");
                Ok(None)
            }
        }
    }

    async fn write(&self, choice: FilialOverride) -> Result<(), StoreError> {
        let payload =
            serde_json::to_string(&choice).map_err(|e| StoreError::Backend(e.to_string()))?;
        self.put(OVERRIDE_KEY, &payload).await.map_err(backend)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.remove(OVERRIDE_KEY).await.map_err(backend)
    }
}

#[async_trait]
impl SnapshotStore for SqliteStateStore {
    async fn read(&self) -> Result<Option<CachedSnapshot>, StoreError> {
        let Some(payload) = self.get(SNAPSHOT_KEY).await.map_err(backend)? else {
            return Ok(None);
        };
        let snapshot: CachedSnapshot = match serde_json::from_str(&payload) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::warn!("corrupt snapshot entry, treating as absent: {err}");
                return Ok(None);
            }
        };
        if snapshot.is_fresh(Utc::now()) {
            Ok(Some(snapshot))
        } else {
            Ok(None)
        }
    }

    async fn write(&self, context: &ResolvedContext) -> Result<(), StoreError> {
        let snapshot = CachedSnapshot::stamp(context.clone(), Utc::now());
        let payload =
            serde_json::to_string(&snapshot).map_err(|e| StoreError::Backend(e.to_string()))?;
        self.put(SNAPSHOT_KEY, &payload).await.map_err(backend)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.remove(SNAPSHOT_KEY).await.map_err(backend)
    }
}

#[cfg(test)]
mod tests {
    use congrega_auth::{AccessRestriction, Profile};
    use congrega_core::{FilialId, IgrejaId, UserId};
    use uuid::Uuid;

    use super::*;

    fn temp_store() -> SqliteStateStore {
        let path = std::env::temp_dir().join(format!("congrega-session-{}.db", Uuid::now_v7()));
        SqliteStateStore::new(path)
    }

    fn context() -> ResolvedContext {
        ResolvedContext {
            profile: Profile {
                id: UserId::new(),
                igreja_id: IgrejaId::new(),
                filial_id: None,
                nome: "Ana".to_string(),
                igreja_nome: "Igreja Central".to_string(),
                filial_nome: None,
            },
            roles: vec![],
            is_admin: false,
            restriction: AccessRestriction::unrestricted(),
            filiais: vec![],
        }
    }

    #[tokio::test]
    async fn override_roundtrip_and_clear() {
        let store = temp_store();
        let choice = FilialOverride::filial(FilialId::new());

        OverrideStore::write(&store, choice).await.unwrap();
        assert_eq!(OverrideStore::read(&store).await.unwrap(), Some(choice));

        OverrideStore::clear(&store).await.unwrap();
        assert_eq!(OverrideStore::read(&store).await.unwrap(), None);
    }

    #[tokio::test]
    async fn snapshot_roundtrip_preserves_context() {
        let store = temp_store();
        let context = context();

        SnapshotStore::write(&store, &context).await.unwrap();
        let snapshot = SnapshotStore::read(&store).await.unwrap().unwrap();
        assert_eq!(snapshot.context, context);
    }

    #[tokio::test]
    async fn backdated_snapshot_reads_as_absent() {
        let store = temp_store();
        let snapshot = CachedSnapshot {
            context: context(),
            cached_at: Utc::now() - chrono::Duration::minutes(10),
        };
        store
            .put(SNAPSHOT_KEY, &serde_json::to_string(&snapshot).unwrap())
            .await
            .unwrap();

        assert!(SnapshotStore::read(&store).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_rows_read_as_absent() {
        let store = temp_store();
        store.put(OVERRIDE_KEY, "{oops").await.unwrap();
        store.put(SNAPSHOT_KEY, "42").await.unwrap();

        assert_eq!(OverrideStore::read(&store).await.unwrap(), None);
        assert!(SnapshotStore::read(&store).await.unwrap().is_none());
    }
}
