//! Time-boxed durable snapshot of the last resolved context.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::gateway::ResolvedContext;

/// How long a persisted snapshot stays usable as a fallback.
pub const SNAPSHOT_MAX_AGE: Duration = Duration::from_secs(5 * 60);

/// A timestamped copy of the last successfully resolved context.
///
/// Staleness is re-evaluated on every read against [`SNAPSHOT_MAX_AGE`];
/// stale entries read as absent and are only ever deleted on sign-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedSnapshot {
    pub context: ResolvedContext,
    pub cached_at: DateTime<Utc>,
}

impl CachedSnapshot {
    /// Stamp a freshly resolved context with the given wall-clock time.
    pub fn stamp(context: ResolvedContext, now: DateTime<Utc>) -> Self {
        Self { context, cached_at: now }
    }

    /// Whether this snapshot is still inside the freshness window at `now`.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        let max_age = chrono::Duration::from_std(SNAPSHOT_MAX_AGE)
            .unwrap_or_else(|_| chrono::Duration::zero());
        now.signed_duration_since(self.cached_at) <= max_age
    }
}
