//! Session Module
//!
//! Holds the bearer token and user profile, persists them, and notifies
//! subscribers whenever the session changes.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::api::UserProfile;
use crate::storage::{load_json, save_json, KeyValueStore, StorageError};

pub const TOKEN_KEY: &str = "accessToken";
pub const USER_KEY: &str = "userData";

/// Authenticated user context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub access_token: String,
    pub user: UserProfile,
}

/// Owns the current session and its persisted copy
#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<dyn KeyValueStore>,
    tx: Arc<watch::Sender<Option<Session>>>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            storage,
            tx: Arc::new(tx),
        }
    }

    /// Load a previously persisted session, if both entries are present
    pub fn restore(&self) -> Result<Option<Session>, StorageError> {
        let token = self
            .storage
            .get_item(TOKEN_KEY)?
            .filter(|t| !t.is_empty());
        let user: Option<UserProfile> = match load_json(self.storage.as_ref(), USER_KEY) {
            Ok(user) => user,
            Err(StorageError::Serialization(e)) => {
                warn!("Stored user profile is unreadable, discarding session: {}", e);
                self.storage.multi_remove(&[TOKEN_KEY, USER_KEY])?;
                self.tx.send_replace(None);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let session = match (token, user) {
            (Some(access_token), Some(user)) => Some(Session { access_token, user }),
            (None, None) => None,
            _ => {
                warn!("Stored session is incomplete, discarding");
                self.storage.multi_remove(&[TOKEN_KEY, USER_KEY])?;
                None
            }
        };

        if let Some(session) = &session {
            info!("Session restored for user: {}", session.user.id);
        }
        self.tx.send_replace(session.clone());
        Ok(session)
    }

    /// Persist and publish a new session
    pub fn set_session(&self, session: Session) -> Result<(), StorageError> {
        self.storage.set_item(TOKEN_KEY, &session.access_token)?;
        save_json(self.storage.as_ref(), USER_KEY, &session.user)?;

        info!("Session set for user: {}", session.user.id);
        self.tx.send_replace(Some(session));
        Ok(())
    }

    pub fn current(&self) -> Option<Session> {
        self.tx.borrow().clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.tx.borrow().as_ref().map(|s| s.access_token.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Drop the session from memory and storage together
    pub fn clear(&self) -> Result<(), StorageError> {
        // Publish first so in-memory state is signed out even if storage fails.
        self.tx.send_replace(None);
        self.storage.multi_remove(&[TOKEN_KEY, USER_KEY])?;
        info!("Session cleared");
        Ok(())
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileStorage, MemoryStorage};

    fn profile(id: &str) -> UserProfile {
        UserProfile {
            id: id.into(),
            email: format!("{}@mapic.app", id),
            full_name: "Test User".into(),
            avatar_url: None,
            extra: Default::default(),
        }
    }

    fn session(token: &str) -> Session {
        Session {
            access_token: token.into(),
            user: profile("u1"),
        }
    }

    #[test]
    fn set_session_persists_token_and_user() {
        let storage = Arc::new(MemoryStorage::new());
        let store = SessionStore::new(storage.clone());

        store.set_session(session("tok-1")).unwrap();

        assert_eq!(storage.get_item(TOKEN_KEY).unwrap().as_deref(), Some("tok-1"));
        let user: Option<UserProfile> = load_json(storage.as_ref(), USER_KEY).unwrap();
        assert_eq!(user, Some(profile("u1")));
        assert_eq!(store.access_token().as_deref(), Some("tok-1"));
        assert!(store.is_authenticated());
    }

    #[test]
    fn clear_removes_both_keys() {
        let storage = Arc::new(MemoryStorage::new());
        let store = SessionStore::new(storage.clone());
        store.set_session(session("tok-1")).unwrap();

        store.clear().unwrap();

        assert_eq!(storage.get_item(TOKEN_KEY).unwrap(), None);
        assert_eq!(storage.get_item(USER_KEY).unwrap(), None);
        assert!(store.current().is_none());
    }

    #[test]
    fn restore_reads_back_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let first = SessionStore::new(Arc::new(FileStorage::new(dir.path()).unwrap()));
        first.set_session(session("tok-disk")).unwrap();

        let second = SessionStore::new(Arc::new(FileStorage::new(dir.path()).unwrap()));
        assert!(second.current().is_none());
        let restored = second.restore().unwrap();

        assert_eq!(restored, Some(session("tok-disk")));
        assert_eq!(second.current(), Some(session("tok-disk")));
    }

    #[test]
    fn restore_discards_half_written_session() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set_item(TOKEN_KEY, "orphan").unwrap();
        let store = SessionStore::new(storage.clone());

        assert_eq!(store.restore().unwrap(), None);
        assert_eq!(storage.get_item(TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn restore_discards_unreadable_profile() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(FileStorage::new(dir.path()).unwrap());
        storage.set_item(TOKEN_KEY, "tok").unwrap();
        storage.set_item(USER_KEY, "{not json").unwrap();
        let store = SessionStore::new(storage.clone());

        assert_eq!(store.restore().unwrap(), None);
        assert_eq!(storage.get_item(TOKEN_KEY).unwrap(), None);
        assert_eq!(storage.get_item(USER_KEY).unwrap(), None);
        assert!(!store.is_authenticated());

        // The next start sees a clean signed-out state.
        assert_eq!(store.restore().unwrap(), None);
    }

    #[test]
    fn empty_token_counts_as_signed_out() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set_item(TOKEN_KEY, "").unwrap();
        save_json(storage.as_ref(), USER_KEY, &profile("u1")).unwrap();

        let store = SessionStore::new(storage);
        assert_eq!(store.restore().unwrap(), None);
    }

    #[tokio::test]
    async fn subscribers_see_sign_in_and_sign_out() {
        let store = SessionStore::new(Arc::new(MemoryStorage::new()));
        let mut rx = store.subscribe();

        store.set_session(session("tok-2")).unwrap();
        rx.changed().await.unwrap();
        assert_eq!(
            rx.borrow_and_update().as_ref().map(|s| s.access_token.as_str()),
            Some("tok-2")
        );

        store.clear().unwrap();
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_none());
    }
}
