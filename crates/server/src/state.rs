//! Session registry. The only state shared between the read loop and
//! the upload tasks.
//!
//! Backed by a `DashMap`, so every operation locks only the shard holding
//! the session. Ids are random v4 UUIDs and are never handed out twice.

use std::path::PathBuf;
use std::time::Duration;

use dashmap::DashMap;
use photobridge_protocol::{new_session_id, PhotoMetadata};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::session::{Session, SessionState};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("session not found: {0}")]
    NotFound(String),

    #[error("session {id} is {state:?}; only a freshly prepared session can start uploading")]
    NotUploadable { id: String, state: SessionState },
}

#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session and return its id.
    pub fn create(&self, files: Vec<PathBuf>, metadata: PhotoMetadata) -> String {
        loop {
            let id = new_session_id();
            // A v4 collision is practically impossible, but never hand out a live id.
            if let dashmap::mapref::entry::Entry::Vacant(slot) = self.sessions.entry(id.clone()) {
                slot.insert(Session::new(id.clone(), files, metadata));
                debug!(
                    component = "registry",
                    event = "registry.session.created",
                    session_id = %id,
                    "Session created"
                );
                return id;
            }
        }
    }

    /// Snapshot of a session.
    pub fn get(&self, id: &str) -> Result<Session, RegistryError> {
        self.sessions
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    /// Attach the cancel token of a starting upload (Created → Uploading).
    pub fn attach_cancel(&self, id: &str, token: CancellationToken) -> Result<(), RegistryError> {
        let mut entry = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        if entry.state != SessionState::Created {
            return Err(RegistryError::NotUploadable {
                id: id.to_string(),
                state: entry.state,
            });
        }
        entry.cancel = Some(token);
        entry.state = SessionState::Uploading;
        Ok(())
    }

    /// Fire the session's cancel token and mark it Cancelled.
    ///
    /// Idempotent: a second call on a cancelled session succeeds without
    /// firing anything again. A completed session is about to be removed
    /// and reports `NotFound`.
    pub fn cancel(&self, id: &str) -> Result<(), RegistryError> {
        let mut entry = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        match entry.state {
            SessionState::Cancelled => Ok(()),
            SessionState::Completed => Err(RegistryError::NotFound(id.to_string())),
            SessionState::Created | SessionState::Uploading => {
                if let Some(token) = &entry.cancel {
                    token.cancel();
                }
                entry.state = SessionState::Cancelled;
                info!(
                    component = "registry",
                    event = "registry.session.cancelled",
                    session_id = %id,
                    "Session cancelled"
                );
                Ok(())
            }
        }
    }

    /// Mark a finished upload Completed. A session cancelled in the meantime
    /// keeps its Cancelled state.
    pub fn complete(&self, id: &str) -> Result<SessionState, RegistryError> {
        let mut entry = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        if entry.state == SessionState::Uploading {
            entry.state = SessionState::Completed;
        }
        Ok(entry.state)
    }

    pub fn remove(&self, id: &str) -> Result<Session, RegistryError> {
        self.sessions
            .remove(id)
            .map(|(_, session)| session)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    /// Drop cancelled and never-uploaded sessions older than `ttl`.
    /// Sessions with an upload in progress are never swept.
    pub fn sweep(&self, ttl: Duration) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, session| {
            let idle = matches!(session.state, SessionState::Created | SessionState::Cancelled);
            !(idle && session.created_at.elapsed() >= ttl)
        });
        before.saturating_sub(self.sessions.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn registry_with_session() -> (SessionRegistry, String) {
        let registry = SessionRegistry::new();
        let id = registry.create(vec![PathBuf::from("a.jpg")], PhotoMetadata::default());
        (registry, id)
    }

    #[test]
    fn create_generates_unique_ids() {
        let registry = SessionRegistry::new();
        let ids: HashSet<String> = (0..500)
            .map(|_| registry.create(Vec::new(), PhotoMetadata::default()))
            .collect();
        assert_eq!(ids.len(), 500);
        assert_eq!(registry.len(), 500);
    }

    #[test]
    fn get_returns_snapshot() {
        let (registry, id) = registry_with_session();
        let session = registry.get(&id).expect("session");
        assert_eq!(session.id, id);
        assert_eq!(session.state, SessionState::Created);
        assert_eq!(session.files, vec![PathBuf::from("a.jpg")]);
        assert!(session.cancel.is_none());
    }

    #[test]
    fn attach_then_cancel_fires_token_once() {
        let (registry, id) = registry_with_session();
        let token = CancellationToken::new();
        registry.attach_cancel(&id, token.clone()).expect("attach");
        assert_eq!(registry.get(&id).unwrap().state, SessionState::Uploading);

        registry.cancel(&id).expect("cancel");
        assert!(token.is_cancelled());
        assert_eq!(registry.get(&id).unwrap().state, SessionState::Cancelled);

        // Second cancel is a no-op, not an error.
        registry.cancel(&id).expect("cancel again");
        assert_eq!(registry.get(&id).unwrap().state, SessionState::Cancelled);
    }

    #[test]
    fn attach_requires_created_state() {
        let (registry, id) = registry_with_session();
        registry.attach_cancel(&id, CancellationToken::new()).expect("attach");
        let err = registry.attach_cancel(&id, CancellationToken::new()).unwrap_err();
        assert_eq!(
            err,
            RegistryError::NotUploadable {
                id: id.clone(),
                state: SessionState::Uploading
            }
        );

        let (registry, id) = registry_with_session();
        registry.cancel(&id).expect("cancel before upload");
        assert!(matches!(
            registry.attach_cancel(&id, CancellationToken::new()),
            Err(RegistryError::NotUploadable { state: SessionState::Cancelled, .. })
        ));
    }

    #[test]
    fn removed_session_is_not_found_everywhere() {
        let (registry, id) = registry_with_session();
        registry.remove(&id).expect("remove");

        let not_found = RegistryError::NotFound(id.clone());
        assert_eq!(registry.get(&id).unwrap_err(), not_found);
        assert_eq!(registry.cancel(&id).unwrap_err(), not_found);
        assert_eq!(registry.remove(&id).unwrap_err(), not_found);
        assert_eq!(registry.complete(&id).unwrap_err(), not_found);
        assert_eq!(
            registry.attach_cancel(&id, CancellationToken::new()).unwrap_err(),
            not_found
        );
    }

    #[test]
    fn cancel_after_complete_is_not_found() {
        let (registry, id) = registry_with_session();
        let token = CancellationToken::new();
        registry.attach_cancel(&id, token.clone()).expect("attach");
        assert_eq!(registry.complete(&id).unwrap(), SessionState::Completed);

        assert_eq!(registry.cancel(&id).unwrap_err(), RegistryError::NotFound(id.clone()));
        assert!(!token.is_cancelled());
        assert_eq!(registry.get(&id).unwrap().state, SessionState::Completed);
    }

    #[test]
    fn complete_does_not_overwrite_cancelled() {
        let (registry, id) = registry_with_session();
        registry.attach_cancel(&id, CancellationToken::new()).expect("attach");
        registry.cancel(&id).expect("cancel");
        assert_eq!(registry.complete(&id).unwrap(), SessionState::Cancelled);

        let (registry, id) = registry_with_session();
        registry.attach_cancel(&id, CancellationToken::new()).expect("attach");
        assert_eq!(registry.complete(&id).unwrap(), SessionState::Completed);
    }

    #[test]
    fn sweep_keeps_uploading_sessions() {
        let registry = SessionRegistry::new();
        let created = registry.create(Vec::new(), PhotoMetadata::default());
        let cancelled = registry.create(Vec::new(), PhotoMetadata::default());
        let uploading = registry.create(Vec::new(), PhotoMetadata::default());
        registry.cancel(&cancelled).unwrap();
        registry.attach_cancel(&uploading, CancellationToken::new()).unwrap();

        assert_eq!(registry.sweep(Duration::from_secs(3600)), 0);
        assert_eq!(registry.sweep(Duration::ZERO), 2);
        assert!(registry.get(&created).is_err());
        assert!(registry.get(&cancelled).is_err());
        assert!(registry.get(&uploading).is_ok());
    }

    #[tokio::test]
    async fn concurrent_cancel_and_complete_are_safe() {
        let registry = Arc::new(SessionRegistry::new());
        let mut ids = Vec::new();
        for _ in 0..64 {
            let id = registry.create(Vec::new(), PhotoMetadata::default());
            registry.attach_cancel(&id, CancellationToken::new()).unwrap();
            ids.push(id);
        }

        let mut handles = Vec::new();
        for id in ids.clone() {
            let r1 = registry.clone();
            let r2 = registry.clone();
            let id2 = id.clone();
            handles.push(tokio::spawn(async move {
                // Losing the race to complete reports NotFound.
                match r1.cancel(&id) {
                    Ok(()) | Err(RegistryError::NotFound(_)) => Ok(()),
                    Err(e) => Err(e),
                }
            }));
            handles.push(tokio::spawn(async move { r2.complete(&id2).map(|_| ()) }));
        }
        for handle in handles {
            handle.await.expect("task").expect("op");
        }

        for id in ids {
            let state = registry.get(&id).unwrap().state;
            assert!(matches!(state, SessionState::Cancelled | SessionState::Completed));
        }
    }
}
