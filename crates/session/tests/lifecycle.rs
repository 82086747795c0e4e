//! Provider lifecycle scenarios: cold start, auth events, sign-out cleanup.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use congrega_auth::{AccessRestriction, Filial, Profile, Role};
use congrega_core::{FilialId, IgrejaId, UserId};
use congrega_session::memory::{InMemorySessionHub, InMemoryStateStore};
use congrega_session::store::SNAPSHOT_KEY;
use congrega_session::{
    AuthzGateway, CachedSnapshot, ContextDecision, GatewayError, ResolvedContext, Session,
    SessionContext,
};

fn resolved_context(user_id: UserId, nome: &str) -> ResolvedContext {
    let filial_id = FilialId::new();
    ResolvedContext {
        profile: Profile {
            id: user_id,
            igreja_id: IgrejaId::new(),
            filial_id: Some(filial_id),
            nome: nome.to_string(),
            igreja_nome: "Igreja Central".to_string(),
            filial_nome: Some("Sede".to_string()),
        },
        roles: vec![Role::new("member")],
        is_admin: false,
        restriction: AccessRestriction::unrestricted(),
        filiais: vec![Filial::new(filial_id, "Sede")],
    }
}

fn session_for(user_id: UserId) -> Session {
    Session {
        user_id,
        access_token: "token-abc".to_string(),
        expires_at: None,
    }
}

/// Gateway answering with a fixed context after a fixed delay.
struct StubGateway {
    calls: AtomicUsize,
    delay: Duration,
    context: ResolvedContext,
}

impl StubGateway {
    fn new(context: ResolvedContext, delay: Duration) -> Arc<Self> {
        Arc::new(Self { calls: AtomicUsize::new(0), delay, context })
    }
}

#[async_trait]
impl AuthzGateway for StubGateway {
    async fn resolve_context(&self, _user_id: UserId) -> Result<ContextDecision, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(ContextDecision::Granted(self.context.clone()))
    }
}

struct Fixture {
    context: SessionContext,
    hub: Arc<InMemorySessionHub>,
    store: Arc<InMemoryStateStore>,
    gateway: Arc<StubGateway>,
}

fn fixture(gateway: Arc<StubGateway>) -> Fixture {
    let hub = Arc::new(InMemorySessionHub::new());
    let store = Arc::new(InMemoryStateStore::new());
    let context = SessionContext::new(
        gateway.clone(),
        hub.clone(),
        store.clone(),
        store.clone(),
    );
    Fixture { context, hub, store, gateway }
}

/// Let spawned tasks (event loop, background resolutions) settle.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

#[tokio::test(start_paused = true)]
async fn no_session_starts_ready_and_empty() {
    let user = UserId::new();
    let fx = fixture(StubGateway::new(resolved_context(user, "Ana"), Duration::ZERO));

    fx.context.start().await;

    let view = fx.context.current().await;
    assert!(!view.loading);
    assert_eq!(view.profile, None);
    assert_eq!(view.igreja_id, None);
    assert!(!view.is_all_filiais);
    assert_eq!(fx.gateway.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn session_without_cache_awaits_resolution() {
    let user = UserId::new();
    let resolved = resolved_context(user, "Ana");
    let fx = fixture(StubGateway::new(resolved.clone(), Duration::ZERO));
    fx.hub.seed_session(session_for(user));

    fx.context.start().await;

    let view = fx.context.current().await;
    assert!(!view.loading);
    assert_eq!(view.profile, Some(resolved.profile.clone()));
    assert_eq!(view.igreja_id, Some(resolved.profile.igreja_id));
    assert_eq!(view.filial_id, resolved.profile.filial_id);
}

#[tokio::test(start_paused = true)]
async fn cold_start_with_valid_cache_paints_before_refresh() {
    let user = UserId::new();
    let cached = resolved_context(user, "Cacheada");
    // The live refresh is far slower than the start path.
    let fresh = resolved_context(user, "Atualizada");
    let fx = fixture(StubGateway::new(fresh.clone(), Duration::from_secs(10)));
    fx.hub.seed_session(session_for(user));
    fx.store.insert_raw(
        SNAPSHOT_KEY,
        serde_json::to_string(&CachedSnapshot {
            context: cached.clone(),
            cached_at: Utc::now() - chrono::Duration::seconds(60),
        })
        .unwrap(),
    );

    fx.context.start().await;

    // Cached igreja is available as soon as start returns, long before the
    // background refresh settles.
    let view = fx.context.current().await;
    assert!(!view.loading);
    assert_eq!(view.igreja_id, Some(cached.profile.igreja_id));
    assert_eq!(view.profile, Some(cached.profile));

    // The refresh eventually lands and overwrites the paint.
    tokio::time::sleep(Duration::from_secs(11)).await;
    let view = fx.context.current().await;
    assert_eq!(view.profile, Some(fresh.profile));
}

#[tokio::test(start_paused = true)]
async fn stale_cache_is_ignored_on_start() {
    let user = UserId::new();
    let cached = resolved_context(user, "Cacheada");
    let fresh = resolved_context(user, "Atualizada");
    let fx = fixture(StubGateway::new(fresh.clone(), Duration::ZERO));
    fx.hub.seed_session(session_for(user));
    fx.store.insert_raw(
        SNAPSHOT_KEY,
        serde_json::to_string(&CachedSnapshot {
            context: cached,
            cached_at: Utc::now() - chrono::Duration::minutes(6),
        })
        .unwrap(),
    );

    fx.context.start().await;

    // Stale entry read as absent, so start awaited the live resolution.
    let view = fx.context.current().await;
    assert_eq!(view.profile, Some(fresh.profile));
}

#[tokio::test(start_paused = true)]
async fn signed_in_event_resolves_in_background() {
    let user = UserId::new();
    let resolved = resolved_context(user, "Ana");
    let fx = fixture(StubGateway::new(resolved.clone(), Duration::ZERO));

    fx.context.start().await;
    assert_eq!(fx.context.current().await.profile, None);

    fx.hub.sign_in(session_for(user));
    settle().await;

    let view = fx.context.current().await;
    assert_eq!(view.user_id, Some(user));
    assert_eq!(view.profile, Some(resolved.profile));
    assert_eq!(fx.gateway.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn sign_out_clears_live_state_and_both_stores() {
    let user = UserId::new();
    let resolved = resolved_context(user, "Ana");
    let fx = fixture(StubGateway::new(resolved.clone(), Duration::ZERO));
    fx.hub.seed_session(session_for(user));

    fx.context.start().await;
    fx.context
        .set_filial_override(resolved.profile.filial_id, false)
        .await;
    settle().await;
    assert!(fx.store.read_override_entry().is_some());
    assert!(fx.store.read_snapshot_entry().is_some());

    fx.hub.sign_out();
    settle().await;

    let view = fx.context.current().await;
    assert_eq!(view.session, None);
    assert_eq!(view.profile, None);
    assert!(view.roles.is_empty());
    assert!(!view.is_admin);
    assert!(!view.has_explicit_access);
    assert_eq!(view.allowed_filial_ids, None);
    assert!(view.filiais.is_empty());
    assert_eq!(view.igreja_id, None);
    assert!(fx.store.read_override_entry().is_none());
    assert!(fx.store.read_snapshot_entry().is_none());
}

#[tokio::test(start_paused = true)]
async fn persisted_override_survives_restart_and_shapes_scope() {
    let user = UserId::new();
    let mut resolved = resolved_context(user, "Ana");
    let chosen = FilialId::new();
    resolved.filiais.push(Filial::new(chosen, "Filial Norte"));

    let fx = fixture(StubGateway::new(resolved.clone(), Duration::ZERO));
    fx.hub.seed_session(session_for(user));
    fx.context.start().await;
    fx.context.set_filial_override(Some(chosen), false).await;

    let view = fx.context.current().await;
    assert_eq!(view.filial_id, Some(chosen));
    assert_eq!(view.filial_nome.as_deref(), Some("Filial Norte"));

    // A second provider over the same durable store sees the same choice.
    let restarted = SessionContext::new(
        fx.gateway.clone(),
        fx.hub.clone(),
        fx.store.clone(),
        fx.store.clone(),
    );
    restarted.start().await;

    let view = restarted.current().await;
    assert_eq!(view.filial_id, Some(chosen));
    assert!(!view.is_all_filiais);
}

#[tokio::test(start_paused = true)]
async fn refresh_context_is_a_noop_without_session() {
    let user = UserId::new();
    let fx = fixture(StubGateway::new(resolved_context(user, "Ana"), Duration::ZERO));

    fx.context.start().await;
    fx.context.refresh_context().await;

    assert_eq!(fx.gateway.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn broken_stores_degrade_to_empty_not_panic() {
    let user = UserId::new();
    let resolved = resolved_context(user, "Ana");
    let fx = fixture(StubGateway::new(resolved.clone(), Duration::ZERO));
    fx.hub.seed_session(session_for(user));
    fx.store.set_broken(true);

    fx.context.start().await;

    // Live resolution still lands; only the snapshot write was lost.
    let view = fx.context.current().await;
    assert!(!view.loading);
    assert_eq!(view.profile, Some(resolved.profile));
    assert!(fx.store.read_snapshot_entry().is_none());
}
