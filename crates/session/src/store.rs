//! Durable key-value store ports for the override and the cached snapshot.
//!
//! Both ports surface failures as an explicit tri-state: `Ok(Some(_))` for a
//! usable entry, `Ok(None)` for absence (including corrupt payloads, which
//! implementations log and treat as absent), and `Err` for storage-medium
//! failures. Callers degrade `Err` to absence; persistence is best-effort and
//! losing either entry is non-fatal.

use async_trait::async_trait;
use thiserror::Error;

use congrega_auth::FilialOverride;

use crate::gateway::ResolvedContext;
use crate::snapshot::CachedSnapshot;

/// Key of the override entry in the durable key-value layout.
pub const OVERRIDE_KEY: &str = "filial_override";

/// Key of the snapshot entry in the durable key-value layout.
pub const SNAPSHOT_KEY: &str = "context_snapshot";

/// Storage-medium failure (connection, quota, io).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Durable storage of the user's manual filial-selection choice.
#[async_trait]
pub trait OverrideStore: Send + Sync {
    /// Corrupt or missing entries read as `Ok(None)`.
    async fn read(&self) -> Result<Option<FilialOverride>, StoreError>;

    /// Overwrites any prior value.
    async fn write(&self, choice: FilialOverride) -> Result<(), StoreError>;

    /// Invoked on sign-out.
    async fn clear(&self) -> Result<(), StoreError>;
}

/// Durable, time-boxed fallback snapshot of the last resolved context.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Returns only snapshots still inside the freshness window; stale,
    /// missing, and corrupt entries all read as `Ok(None)`.
    async fn read(&self) -> Result<Option<CachedSnapshot>, StoreError>;

    /// Stamps the current time and overwrites any prior snapshot.
    async fn write(&self, context: &ResolvedContext) -> Result<(), StoreError>;

    /// Invoked on sign-out.
    async fn clear(&self) -> Result<(), StoreError>;
}
