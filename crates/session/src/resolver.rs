//! Context resolution with timeout, cache fallback, and in-flight
//! de-duplication.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, watch};

use congrega_core::UserId;

use crate::gateway::{AuthzGateway, ContextDecision};
use crate::state::SharedLiveState;
use crate::store::SnapshotStore;

/// How long a caller waits for the authorization call before falling back to
/// the cached snapshot. The underlying call is not cancelled on timeout.
pub const RESOLVE_TIMEOUT: Duration = Duration::from_millis(3000);

/// Resolves the authoritative tenant context for a user and applies it to the
/// shared live state.
///
/// Failure semantics: `resolve` never surfaces an error. Every failure path
/// (transport error, denial, timeout) degrades to "apply the cached snapshot"
/// or, lacking one, "keep existing state". A stale context is preferable to
/// blocking the caller on an authorization round-trip.
#[derive(Clone)]
pub struct ContextResolver {
    inner: Arc<ResolverInner>,
}

struct ResolverInner {
    gateway: Arc<dyn AuthzGateway>,
    snapshots: Arc<dyn SnapshotStore>,
    state: SharedLiveState,
    /// Settlement handle of the outstanding resolution, if any. Callers that
    /// find one await it instead of issuing a duplicate gateway call.
    in_flight: Mutex<Option<watch::Receiver<()>>>,
    timeout: Duration,
}

impl ContextResolver {
    pub fn new(
        gateway: Arc<dyn AuthzGateway>,
        snapshots: Arc<dyn SnapshotStore>,
        state: SharedLiveState,
    ) -> Self {
        Self::with_timeout(gateway, snapshots, state, RESOLVE_TIMEOUT)
    }

    pub fn with_timeout(
        gateway: Arc<dyn AuthzGateway>,
        snapshots: Arc<dyn SnapshotStore>,
        state: SharedLiveState,
        timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(ResolverInner {
                gateway,
                snapshots,
                state,
                in_flight: Mutex::new(None),
                timeout,
            }),
        }
    }

    /// Resolve the context for `user_id`, waiting at most the configured
    /// timeout. Concurrent calls share one underlying gateway call and one
    /// outcome.
    pub async fn resolve(&self, user_id: UserId) {
        let mut settled = {
            let mut in_flight = self.inner.in_flight.lock().await;
            match in_flight.as_ref() {
                Some(rx) => {
                    tracing::debug!(user = %user_id, "resolution already in flight; joining");
                    rx.clone()
                }
                None => {
                    let (tx, rx) = watch::channel(());
                    *in_flight = Some(rx.clone());
                    let inner = Arc::clone(&self.inner);
                    tokio::spawn(async move {
                        inner.run(user_id, tx).await;
                    });
                    rx
                }
            }
        };

        // Settlement is a send or a sender drop; either means the task
        // finished. On timeout the task keeps running and will still apply
        // its outcome later.
        if tokio::time::timeout(self.inner.timeout, settled.changed())
            .await
            .is_err()
        {
            tracing::warn!(
                user = %user_id,
                timeout_ms = self.inner.timeout.as_millis() as u64,
                "context resolution timed out; applying cached snapshot",
            );
            self.inner.apply_cached_fallback().await;
        }
    }
}

impl ResolverInner {
    async fn run(&self, user_id: UserId, settled: watch::Sender<()>) {
        match self.gateway.resolve_context(user_id).await {
            Ok(ContextDecision::Granted(context)) => {
                {
                    let mut state = self.state.write().await;
                    state.apply_context(&context);
                }
                if let Err(err) = self.snapshots.write(&context).await {
                    tracing::warn!(user = %user_id, "failed to persist context snapshot: {err}");
                }
                tracing::debug!(user = %user_id, igreja = %context.profile.igreja_id, "context resolved");
            }
            Ok(ContextDecision::Denied { reason }) => {
                tracing::warn!(
                    user = %user_id,
                    %reason,
                    "authorization procedure denied context; applying cached snapshot",
                );
                self.apply_cached_fallback().await;
            }
            Err(err) => {
                tracing::warn!(
                    user = %user_id,
                    error = %err,
                    "authorization call failed; applying cached snapshot",
                );
                self.apply_cached_fallback().await;
            }
        }

        // Clear the in-flight slot before signalling settlement so a caller
        // woken here and immediately re-resolving starts a fresh call.
        {
            let mut in_flight = self.in_flight.lock().await;
            *in_flight = None;
        }
        let _ = settled.send(());
    }

    async fn apply_cached_fallback(&self) {
        let snapshot = match self.snapshots.read().await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                tracing::debug!("no fresh snapshot available; keeping current state");
                return;
            }
            Err(err) => {
                tracing::warn!("snapshot store unreadable ({err}); keeping current state");
                return;
            }
        };

        let mut state = self.state.write().await;
        state.apply_context(&snapshot.context);
    }
}
