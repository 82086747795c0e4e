//! Backend-facing ports: the authorization procedure and the session primitive.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

use congrega_auth::{AccessRestriction, Filial, Profile, Role};
use congrega_core::UserId;

/// An authenticated backend session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: UserId,
    pub access_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Auth state transitions published by the session backend.
#[derive(Debug, Clone)]
pub enum AuthEvent {
    SignedIn(Session),
    SignedOut,
}

/// Transport/infrastructure failure while talking to the backend.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("network error: {0}")]
    Network(String),

    #[error("API error ({0}): {1}")]
    Api(u16, String),

    #[error("parse error: {0}")]
    Parse(String),
}

/// The authoritative context computed by the backend authorization procedure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedContext {
    pub profile: Profile,
    pub roles: Vec<Role>,
    pub is_admin: bool,
    pub restriction: AccessRestriction,
    pub filiais: Vec<Filial>,
}

/// Outcome of the authorization procedure.
///
/// The wire shape carries a success flag plus an optional error string; here
/// that is an enum so a denied resolution cannot be mistaken for a granted one.
#[derive(Debug, Clone)]
pub enum ContextDecision {
    Granted(ResolvedContext),
    Denied { reason: String },
}

/// Remote authorization procedure (one call per resolution).
#[async_trait]
pub trait AuthzGateway: Send + Sync {
    async fn resolve_context(&self, user_id: UserId) -> Result<ContextDecision, GatewayError>;
}

/// Backend session primitive: current session plus auth-change subscription.
///
/// Subscriptions have broadcast semantics: every subscriber sees every event.
#[async_trait]
pub trait SessionGateway: Send + Sync {
    async fn current_session(&self) -> Result<Option<Session>, GatewayError>;

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}
