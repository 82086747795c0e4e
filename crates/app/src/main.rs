//! Composition root: wires the session context stack against the platform
//! API and reports the effective scope.
//!
//! Session credentials come from the environment (a native shell would feed
//! its login flow into the hub instead): `CONGREGA_USER_ID`, optionally
//! `CONGREGA_ACCESS_TOKEN`, plus `CONGREGA_API_URL` / `CONGREGA_API_TOKEN`
//! for the gateway.

use std::sync::Arc;

use congrega_core::UserId;
use congrega_infra::{HttpAuthzGateway, SqliteStateStore};
use congrega_session::memory::InMemorySessionHub;
use congrega_session::{Session, SessionContext};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    congrega_observability::init();

    let gateway = Arc::new(HttpAuthzGateway::from_env());
    let store = Arc::new(SqliteStateStore::at_default_path()?);
    let sessions = Arc::new(InMemorySessionHub::new());

    if let Ok(raw) = std::env::var("CONGREGA_USER_ID") {
        let user_id: UserId = raw.parse()?;
        let access_token =
            std::env::var("CONGREGA_ACCESS_TOKEN").unwrap_or_else(|_| {
                tracing::warn!("CONGREGA_ACCESS_TOKEN not set; using empty token");
                String::new()
            });
        sessions.seed_session(Session {
            user_id,
            access_token,
            expires_at: None,
        });
    } else {
        tracing::info!("CONGREGA_USER_ID not set; starting without a session");
    }

    let context = SessionContext::new(gateway, sessions, store.clone(), store);
    context.start().await;

    let view = context.current().await;
    match view.igreja_id {
        Some(igreja_id) => tracing::info!(
            igreja = %igreja_id,
            igreja_nome = view.igreja_nome.as_deref().unwrap_or("?"),
            filial = ?view.filial_id,
            filial_nome = view.filial_nome.as_deref().unwrap_or("-"),
            all_filiais = view.is_all_filiais,
            admin = view.is_admin,
            "session context ready",
        ),
        None => tracing::info!("session context ready with no igreja (sign-in required)"),
    }

    Ok(())
}
