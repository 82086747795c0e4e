//! Live (in-process) context state shared between the resolver, the provider,
//! and background tasks.

use std::sync::Arc;

use tokio::sync::RwLock;

use congrega_auth::{AccessRestriction, Filial, FilialOverride, Profile, Role};

use crate::gateway::{ResolvedContext, Session};

/// Everything the provider surface exposes, in mutable form.
///
/// Within a single resolution these fields are written only after the
/// authorization call settles (success or accepted fallback) — never
/// partially; [`LiveState::apply_context`] is the one write path.
#[derive(Debug, Clone, Default)]
pub struct LiveState {
    pub session: Option<Session>,
    pub profile: Option<Profile>,
    pub roles: Vec<Role>,
    pub is_admin: bool,
    pub restriction: AccessRestriction,
    pub filiais: Vec<Filial>,
    pub choice: Option<FilialOverride>,
    pub loading: bool,
}

impl LiveState {
    /// Apply a resolved (or cached) context atomically.
    ///
    /// The session and the user's override choice are deliberately left
    /// untouched; they have their own lifecycles.
    pub fn apply_context(&mut self, context: &ResolvedContext) {
        self.profile = Some(context.profile.clone());
        self.roles = context.roles.clone();
        self.is_admin = context.is_admin;
        self.restriction = context.restriction.clone();
        self.filiais = context.filiais.clone();
    }
}

/// Handle to the shared live state, cheap to clone across tasks.
pub type SharedLiveState = Arc<RwLock<LiveState>>;

pub fn shared_live_state() -> SharedLiveState {
    Arc::new(RwLock::new(LiveState { loading: true, ..Default::default() }))
}
