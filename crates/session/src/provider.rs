//! Ambient session context: the provider surface the rest of the application
//! consumes.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::broadcast;

use congrega_auth::{
    EffectiveScope, Filial, FilialOverride, Profile, Role, effective_scope,
};
use congrega_core::{FilialId, IgrejaId, UserId};

use crate::gateway::{AuthEvent, AuthzGateway, Session, SessionGateway};
use crate::resolver::ContextResolver;
use crate::state::{LiveState, SharedLiveState, shared_live_state};
use crate::store::{OverrideStore, SnapshotStore};

/// Read-only view of the session context at one instant.
///
/// The effective (igreja, filial) fields are recomputed through the scope
/// compositor on every read; they are never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextView {
    pub user_id: Option<UserId>,
    pub session: Option<Session>,
    pub profile: Option<Profile>,
    pub roles: Vec<Role>,
    pub is_admin: bool,
    pub igreja_id: Option<IgrejaId>,
    pub igreja_nome: Option<String>,
    pub filial_id: Option<FilialId>,
    pub filial_nome: Option<String>,
    pub is_all_filiais: bool,
    pub has_explicit_access: bool,
    pub allowed_filial_ids: Option<HashSet<FilialId>>,
    pub filiais: Vec<Filial>,
    pub loading: bool,
}

/// Ambient tenant/session context.
///
/// One instance is built at composition time from the four ports and handed
/// to consumers; clones share state. No method panics or returns an error:
/// every failure path degrades to the cached snapshot or to empty defaults,
/// so consumers can always render something.
#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<ProviderInner>,
}

struct ProviderInner {
    state: SharedLiveState,
    resolver: ContextResolver,
    overrides: Arc<dyn OverrideStore>,
    snapshots: Arc<dyn SnapshotStore>,
    sessions: Arc<dyn SessionGateway>,
}

impl SessionContext {
    pub fn new(
        gateway: Arc<dyn AuthzGateway>,
        sessions: Arc<dyn SessionGateway>,
        overrides: Arc<dyn OverrideStore>,
        snapshots: Arc<dyn SnapshotStore>,
    ) -> Self {
        let state = shared_live_state();
        let resolver =
            ContextResolver::new(gateway, Arc::clone(&snapshots), Arc::clone(&state));
        Self {
            inner: Arc::new(ProviderInner {
                state,
                resolver,
                overrides,
                snapshots,
                sessions,
            }),
        }
    }

    /// Bring the context up: persisted override and cached paint first, then
    /// the session check, then the auth event loop.
    ///
    /// With a session and a fresh cache the resolution runs in the
    /// background; with a session and no cache it is awaited; with no session
    /// the context goes straight to ready and empty. `loading` is false once
    /// this returns.
    pub async fn start(&self) {
        let inner = &self.inner;

        match inner.overrides.read().await {
            Ok(choice) => inner.state.write().await.choice = choice,
            Err(err) => {
                tracing::warn!("override store unreadable, treating as absent: {err}");
            }
        }

        let cache_applied = match inner.snapshots.read().await {
            Ok(Some(snapshot)) => {
                inner.state.write().await.apply_context(&snapshot.context);
                tracing::debug!("cached context applied for instant paint");
                true
            }
            Ok(None) => false,
            Err(err) => {
                tracing::warn!("snapshot store unreadable, treating as absent: {err}");
                false
            }
        };

        match inner.sessions.current_session().await {
            Ok(Some(session)) => {
                let user_id = session.user_id;
                inner.state.write().await.session = Some(session);
                if cache_applied {
                    // Cached paint is on screen; refresh without blocking.
                    let resolver = inner.resolver.clone();
                    tokio::spawn(async move { resolver.resolve(user_id).await });
                } else {
                    inner.resolver.resolve(user_id).await;
                }
            }
            Ok(None) => tracing::debug!("no active session; context stays empty"),
            Err(err) => {
                tracing::warn!("session lookup failed; context stays empty: {err}");
            }
        }

        inner.state.write().await.loading = false;

        let this = self.clone();
        let mut events = inner.sessions.subscribe();
        tokio::spawn(async move {
            this.run_event_loop(&mut events).await;
        });
    }

    /// Current context, with the effective scope recomputed.
    pub async fn current(&self) -> ContextView {
        let state = self.inner.state.read().await;
        let scope: EffectiveScope = effective_scope(
            state.profile.as_ref(),
            state.choice.as_ref(),
            state.is_admin,
            &state.restriction,
            &state.filiais,
        );

        ContextView {
            user_id: state.session.as_ref().map(|s| s.user_id),
            session: state.session.clone(),
            profile: state.profile.clone(),
            roles: state.roles.clone(),
            is_admin: state.is_admin,
            igreja_id: scope.igreja_id,
            igreja_nome: scope.igreja_nome,
            filial_id: scope.filial_id,
            filial_nome: scope.filial_nome,
            is_all_filiais: scope.is_all_filiais,
            has_explicit_access: state.restriction.has_explicit_access,
            allowed_filial_ids: state.restriction.allowed_filiais.clone(),
            filiais: state.filiais.clone(),
            loading: state.loading,
        }
    }

    /// Re-run resolution for the current session's user; no-op without one.
    pub async fn refresh_context(&self) {
        let user_id = {
            self.inner
                .state
                .read()
                .await
                .session
                .as_ref()
                .map(|s| s.user_id)
        };
        match user_id {
            Some(user_id) => self.inner.resolver.resolve(user_id).await,
            None => tracing::debug!("refresh requested without a session; ignoring"),
        }
    }

    /// Record the user's filial-viewing choice, persisting it best-effort.
    pub async fn set_filial_override(&self, filial_id: Option<FilialId>, is_all_filiais: bool) {
        let choice = FilialOverride::new(filial_id, is_all_filiais);
        if let Err(err) = self.inner.overrides.write(choice).await {
            tracing::warn!("failed to persist filial override, kept for this session only: {err}");
        }
        self.inner.state.write().await.choice = Some(choice);
    }

    async fn run_event_loop(&self, events: &mut broadcast::Receiver<AuthEvent>) {
        loop {
            match events.recv().await {
                Ok(AuthEvent::SignedIn(session)) => {
                    let user_id = session.user_id;
                    self.inner.state.write().await.session = Some(session);
                    let resolver = self.inner.resolver.clone();
                    tokio::spawn(async move { resolver.resolve(user_id).await });
                }
                Ok(AuthEvent::SignedOut) => self.sign_out_cleanup().await,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "auth event stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    async fn sign_out_cleanup(&self) {
        {
            let mut state = self.inner.state.write().await;
            *state = LiveState::default();
        }
        if let Err(err) = self.inner.overrides.clear().await {
            tracing::warn!("failed to clear override store on sign-out: {err}");
        }
        if let Err(err) = self.inner.snapshots.clear().await {
            tracing::warn!("failed to clear snapshot store on sign-out: {err}");
        }
        tracing::info!("signed out; session context cleared");
    }
}
