//! `congrega-session` — tenant/session context orchestration.
//!
//! Resolves the authoritative (igreja, filial) context for the signed-in
//! user, keeps a time-boxed durable snapshot for slow-network resilience,
//! honors the user's persisted filial override, and exposes the composed
//! result as ambient state.

pub mod gateway;
pub mod memory;
pub mod provider;
pub mod resolver;
pub mod snapshot;
pub mod state;
pub mod store;

pub use gateway::{
    AuthEvent, AuthzGateway, ContextDecision, GatewayError, ResolvedContext, Session,
    SessionGateway,
};
pub use provider::{ContextView, SessionContext};
pub use resolver::{ContextResolver, RESOLVE_TIMEOUT};
pub use snapshot::{CachedSnapshot, SNAPSHOT_MAX_AGE};
pub use store::{OverrideStore, SnapshotStore, StoreError};
