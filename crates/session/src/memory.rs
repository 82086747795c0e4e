//! In-memory port implementations for tests/dev.
//!
//! The state store keeps the same key → JSON-payload layout the durable
//! SQLite adapter uses, so serialization faults and backdated entries can be
//! exercised without a database.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::broadcast;

use congrega_auth::FilialOverride;

use crate::gateway::{AuthEvent, GatewayError, ResolvedContext, Session, SessionGateway};
use crate::snapshot::CachedSnapshot;
use crate::store::{OVERRIDE_KEY, OverrideStore, SNAPSHOT_KEY, SnapshotStore, StoreError};

/// In-memory key/JSON store implementing both durable-store ports.
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    entries: Mutex<HashMap<String, String>>,
    broken: AtomicBool,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail, simulating an unavailable medium.
    pub fn set_broken(&self, broken: bool) {
        self.broken.store(broken, Ordering::SeqCst);
    }

    /// Insert a raw payload, bypassing serialization (corruption/backdating
    /// in tests).
    pub fn insert_raw(&self, key: &str, payload: String) {
        self.entries
            .lock()
            .expect("state store lock")
            .insert(key.to_string(), payload);
    }

    /// Raw snapshot entry, if any (stale entries included).
    pub fn read_snapshot_entry(&self) -> Option<String> {
        self.entries
            .lock()
            .expect("state store lock")
            .get(SNAPSHOT_KEY)
            .cloned()
    }

    /// Raw override entry, if any.
    pub fn read_override_entry(&self) -> Option<String> {
        self.entries
            .lock()
            .expect("state store lock")
            .get(OVERRIDE_KEY)
            .cloned()
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.broken.load(Ordering::SeqCst) {
            Err(StoreError::Backend("in-memory store marked broken".to_string()))
        } else {
            Ok(())
        }
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.ensure_available()?;
        Ok(self
            .entries
            .lock()
            .expect("state store lock")
            .get(key)
            .cloned())
    }

    fn put(&self, key: &str, payload: String) -> Result<(), StoreError> {
        self.ensure_available()?;
        self.entries
            .lock()
            .expect("state store lock")
            .insert(key.to_string(), payload);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.ensure_available()?;
        self.entries.lock().expect("state store lock").remove(key);
        Ok(())
    }
}

#[async_trait]
impl OverrideStore for InMemoryStateStore {
    async fn read(&self) -> Result<Option<FilialOverride>, StoreError> {
        let Some(payload) = self.get(OVERRIDE_KEY)? else {
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
        let payload = serde_json::to_string(&choice)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        self.put(OVERRIDE_KEY, payload)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.remove(OVERRIDE_KEY)
    }
}

#[async_trait]
impl SnapshotStore for InMemoryStateStore {
    async fn read(&self) -> Result<Option<CachedSnapshot>, StoreError> {
        let Some(payload) = self.get(SNAPSHOT_KEY)? else {
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
        let payload = serde_json::to_string(&snapshot)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        self.put(SNAPSHOT_KEY, payload)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.remove(SNAPSHOT_KEY)
    }
}

/// In-memory session backend: holds the current session and fans auth events
/// out to every subscriber.
#[derive(Debug)]
pub struct InMemorySessionHub {
    current: Mutex<Option<Session>>,
    events: broadcast::Sender<AuthEvent>,
}

impl InMemorySessionHub {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self { current: Mutex::new(None), events }
    }

    /// Seed a session without emitting an event (pre-existing login).
    pub fn seed_session(&self, session: Session) {
        *self.current.lock().expect("session hub lock") = Some(session);
    }

    pub fn sign_in(&self, session: Session) {
        *self.current.lock().expect("session hub lock") = Some(session.clone());
        let _ = self.events.send(AuthEvent::SignedIn(session));
    }

    pub fn sign_out(&self) {
        *self.current.lock().expect("session hub lock") = None;
        let _ = self.events.send(AuthEvent::SignedOut);
    }
}

impl Default for InMemorySessionHub {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionGateway for InMemorySessionHub {
    async fn current_session(&self) -> Result<Option<Session>, GatewayError> {
        Ok(self.current.lock().expect("session hub lock").clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}
