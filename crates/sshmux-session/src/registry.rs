//! Process-wide session registry.
//!
//! Name → session map with enforced uniqueness. Session operations never
//! need a registry-wide lock; the concurrent map only serializes name
//! insertion and removal.

use dashmap::DashMap;
use sshmux_core::types::valid_session_name;
use std::sync::Arc;
use tracing::info;

use crate::error::{Result, SessionError};
use crate::session::Session;
use crate::types::SessionMetadata;

#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Register a session under its name. Fails with `NameTaken` when the
    /// name is already bound; validation happens here as a second line of
    /// defense behind the connect surface.
    pub fn insert(&self, session: Arc<Session>) -> Result<()> {
        let name = session.name().to_string();
        if !valid_session_name(&name) {
            return Err(SessionError::InvalidName(name));
        }
        match self.sessions.entry(name.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(SessionError::NameTaken(name)),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(session);
                info!(session = %name, "session registered");
                Ok(())
            }
        }
    }

    pub fn get(&self, name: &str) -> Result<Arc<Session>> {
        self.sessions
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| SessionError::SessionNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sessions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Metadata snapshots for every registered session.
    pub fn list(&self) -> Vec<SessionMetadata> {
        self.sessions
            .iter()
            .map(|entry| entry.value().metadata())
            .collect()
    }

    /// Tear a session down and remove it. The teardown rejects all pending
    /// work and closes the transport before the name is released.
    pub async fn remove(&self, name: &str, reason: &str) -> Result<()> {
        let (_, session) = self
            .sessions
            .remove(name)
            .ok_or_else(|| SessionError::SessionNotFound(name.to_string()))?;
        session.teardown(reason).await;
        info!(session = %name, "session removed");
        Ok(())
    }

    /// Graceful-stop path: tear down everything.
    pub async fn teardown_all(&self, reason: &str) {
        let names: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
        for name in names {
            let _ = self.remove(&name, reason).await;
        }
    }
}
