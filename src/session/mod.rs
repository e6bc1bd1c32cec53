//! Who is logged in.
//!
//! The token and the user profile always travel together: in memory the
//! session is an `Option<Session>`, and in storage both entries are written,
//! read and removed as a pair.

mod storage;

pub use storage::{FileStorage, MemoryStorage, SessionStorage, StorageError};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{info, warn};

/// Storage key for the session token.
pub const TOKEN_KEY: &str = "ea_token";
/// Storage key for the serialized user profile.
pub const USER_KEY: &str = "ea_user";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Supplier,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Supplier => write!(f, "supplier"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

/// Identity returned by the backend on login.
///
/// Older deployments send `rol`, `supplierName` and `correo`; those are
/// accepted on input and written back in the current form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(alias = "rol")]
    pub role: Role,
    #[serde(default, alias = "supplierName")]
    pub display_name: String,
    #[serde(alias = "correo")]
    pub email: String,
}

impl UserProfile {
    /// Name to show for this user, falling back to the email address.
    pub fn label(&self) -> &str {
        if self.display_name.trim().is_empty() {
            &self.email
        } else {
            &self.display_name
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub user: UserProfile,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("user", &self.user)
            .finish()
    }
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session token must not be empty")]
    EmptyToken,

    #[error("Failed to serialize user profile: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Single source of truth for the current session.
pub struct SessionStore {
    storage: Box<dyn SessionStorage>,
    current: Mutex<Option<Session>>,
}

impl SessionStore {
    /// Create a store with no in-memory session. Call [`load`](Self::load)
    /// to pick up a previously saved one.
    pub fn new(storage: impl SessionStorage + 'static) -> Self {
        Self {
            storage: Box::new(storage),
            current: Mutex::new(None),
        }
    }

    /// Create a store and immediately load any saved session.
    pub fn open(storage: impl SessionStorage + 'static) -> Self {
        let store = Self::new(storage);
        store.load();
        store
    }

    /// Read the persisted session into memory. Missing, partial or corrupt
    /// entries count as no session.
    pub fn load(&self) -> Option<Session> {
        let mut current = self.current.lock();
        let loaded = self.read_persisted();
        *current = loaded.clone();
        loaded
    }

    fn read_persisted(&self) -> Option<Session> {
        let mut entries = self.storage.get_all(&[TOKEN_KEY, USER_KEY]).into_iter();
        let token = entries.next().flatten();
        let user = entries.next().flatten();

        match (token, user) {
            (None, None) => None,
            (Some(token), Some(user)) if !token.is_empty() => {
                match serde_json::from_str::<UserProfile>(&user) {
                    Ok(user) => Some(Session { token, user }),
                    Err(e) => {
                        warn!(error = %e, "Stored user profile is corrupt, treating as logged out");
                        None
                    }
                }
            }
            _ => {
                warn!("Stored session is incomplete, treating as logged out");
                None
            }
        }
    }

    /// Persist the pair, then make it the current session. On a storage
    /// failure the current session is left as it was.
    pub fn save(&self, user: UserProfile, token: impl Into<String>) -> Result<(), SessionError> {
        let token = token.into();
        if token.is_empty() {
            return Err(SessionError::EmptyToken);
        }
        let user_json = serde_json::to_string(&user)?;

        let mut current = self.current.lock();
        self.storage
            .set_all(&[(TOKEN_KEY, token.as_str()), (USER_KEY, user_json.as_str())])?;
        info!(user = %user.email, role = %user.role, "Session saved");
        *current = Some(Session { token, user });
        Ok(())
    }

    /// Forget the session. The in-memory session is dropped even when the
    /// storage write fails; the failure is still reported.
    pub fn clear(&self) -> Result<(), SessionError> {
        let mut current = self.current.lock();
        *current = None;
        self.storage.remove_all(&[TOKEN_KEY, USER_KEY])?;
        info!("Session cleared");
        Ok(())
    }

    pub fn current(&self) -> Option<Session> {
        self.current.lock().clone()
    }

    pub fn token(&self) -> Option<String> {
        self.current.lock().as_ref().map(|s| s.token.clone())
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.current.lock().as_ref().map(|s| s.user.clone())
    }

    pub fn is_logged_in(&self) -> bool {
        self.current.lock().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn supplier() -> UserProfile {
        UserProfile {
            role: Role::Supplier,
            display_name: "Acme".to_string(),
            email: "a@b.com".to_string(),
        }
    }

    fn admin() -> UserProfile {
        UserProfile {
            role: Role::Admin,
            display_name: String::new(),
            email: "admin@ea.mx".to_string(),
        }
    }

    /// Storage whose writes always fail.
    struct ReadOnlyStorage(MemoryStorage);

    impl SessionStorage for ReadOnlyStorage {
        fn get_all(&self, keys: &[&str]) -> Vec<Option<String>> {
            self.0.get_all(keys)
        }

        fn set_all(&self, _entries: &[(&str, &str)]) -> Result<(), StorageError> {
            Err(StorageError::Io {
                path: "/read-only".into(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            })
        }

        fn remove_all(&self, keys: &[&str]) -> Result<(), StorageError> {
            self.set_all(&keys.iter().map(|k| (*k, "")).collect::<Vec<_>>())
        }
    }

    #[test]
    fn test_empty_storage_has_no_session() {
        let store = SessionStore::open(MemoryStorage::new());
        assert!(store.current().is_none());
        assert!(store.token().is_none());
        assert!(!store.is_logged_in());
    }

    #[test]
    fn test_save_then_reload() {
        let storage = MemoryStorage::new();
        let store = SessionStore::new(storage.clone());
        store.save(supplier(), "tok123").unwrap();

        let current = store.current().unwrap();
        assert_eq!(current.token, "tok123");
        assert_eq!(current.user, supplier());

        let reloaded = SessionStore::new(storage);
        let session = reloaded.load().unwrap();
        assert_eq!(session.token, "tok123");
        assert_eq!(session.user, supplier());
        assert_eq!(reloaded.current(), Some(session));
    }

    #[test]
    fn test_clear_then_reload() {
        let storage = MemoryStorage::new();
        let store = SessionStore::new(storage.clone());
        store.save(supplier(), "tok123").unwrap();
        store.clear().unwrap();

        assert!(store.current().is_none());
        assert!(storage.is_empty());
        assert!(SessionStore::new(storage).load().is_none());
    }

    #[test]
    fn test_save_replaces_previous_user() {
        let storage = MemoryStorage::new();
        let store = SessionStore::new(storage.clone());
        store.save(supplier(), "tok1").unwrap();
        store.save(admin(), "tok2").unwrap();

        let reloaded = SessionStore::open(storage);
        let session = reloaded.current().unwrap();
        assert_eq!(session.token, "tok2");
        assert_eq!(session.user.role, Role::Admin);
    }

    #[test]
    fn test_empty_token_rejected() {
        let storage = MemoryStorage::new();
        let store = SessionStore::new(storage.clone());
        assert!(matches!(
            store.save(supplier(), ""),
            Err(SessionError::EmptyToken)
        ));
        assert!(storage.is_empty());
    }

    #[test]
    fn test_partial_storage_is_no_session() {
        let storage = MemoryStorage::new();
        storage.insert_raw(TOKEN_KEY, "orphan");
        assert!(SessionStore::open(storage).current().is_none());

        let storage = MemoryStorage::new();
        storage.insert_raw(USER_KEY, &json!({"role":"admin","email":"x@y.z"}).to_string());
        assert!(SessionStore::open(storage).current().is_none());
    }

    #[test]
    fn test_corrupt_user_is_no_session() {
        let storage = MemoryStorage::new();
        storage.insert_raw(TOKEN_KEY, "tok");
        storage.insert_raw(USER_KEY, "null");
        assert!(SessionStore::open(storage.clone()).current().is_none());

        storage.insert_raw(USER_KEY, "{\"role\":\"superuser\",\"email\":\"x\"}");
        assert!(SessionStore::open(storage).current().is_none());
    }

    #[test]
    fn test_legacy_profile_keys_accepted() {
        let user: UserProfile = serde_json::from_value(json!({
            "rol": "supplier",
            "supplierName": "Acme SA de CV",
            "correo": "facturas@acme.mx",
            "supplierId": "SUP-001"
        }))
        .unwrap();

        assert_eq!(user.role, Role::Supplier);
        assert_eq!(user.display_name, "Acme SA de CV");
        assert_eq!(user.email, "facturas@acme.mx");
        assert_eq!(
            serde_json::to_value(&user).unwrap(),
            json!({"role": "supplier", "displayName": "Acme SA de CV", "email": "facturas@acme.mx"})
        );
    }

    #[test]
    fn test_label_falls_back_to_email() {
        assert_eq!(supplier().label(), "Acme");
        assert_eq!(admin().label(), "admin@ea.mx");
    }

    #[test]
    fn test_failed_save_keeps_current_session() {
        let inner = MemoryStorage::new();
        let store = SessionStore::new(inner.clone());
        store.save(supplier(), "tok1").unwrap();

        let read_only = SessionStore::open(ReadOnlyStorage(inner));
        assert!(read_only.save(admin(), "tok2").is_err());
        assert_eq!(read_only.token().as_deref(), Some("tok1"));
    }

    #[test]
    fn test_failed_clear_still_logs_out_in_memory() {
        let inner = MemoryStorage::new();
        SessionStore::new(inner.clone())
            .save(supplier(), "tok1")
            .unwrap();

        let store = SessionStore::open(ReadOnlyStorage(inner));
        assert!(store.is_logged_in());
        assert!(store.clear().is_err());
        assert!(!store.is_logged_in());
    }

    #[test]
    fn test_file_backed_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");

        SessionStore::new(FileStorage::new(&path))
            .save(supplier(), "tok123")
            .unwrap();

        let reloaded = SessionStore::open(FileStorage::new(&path));
        assert_eq!(reloaded.token().as_deref(), Some("tok123"));
        assert_eq!(reloaded.user(), Some(supplier()));

        reloaded.clear().unwrap();
        assert!(SessionStore::open(FileStorage::new(&path)).current().is_none());
    }

    #[test]
    fn test_load_never_mixes_pairs_from_another_writer() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        let stop = Arc::new(AtomicBool::new(false));

        let writer = {
            let path = path.clone();
            let stop = stop.clone();
            std::thread::spawn(move || {
                let store = SessionStore::new(FileStorage::new(&path));
                let mut i = 0;
                while !stop.load(Ordering::Relaxed) {
                    let user = UserProfile {
                        role: Role::Supplier,
                        display_name: format!("user-{}", i),
                        email: format!("{}@example.com", i),
                    };
                    store.save(user, format!("tok-{}", i)).unwrap();
                    i += 1;
                }
            })
        };

        let mut mixed = Vec::new();
        for _ in 0..500 {
            if let Some(session) = SessionStore::open(FileStorage::new(&path)).current() {
                let suffix = session.token.trim_start_matches("tok-");
                if session.user.display_name != format!("user-{}", suffix) {
                    mixed.push((session.token, session.user.display_name));
                }
            }
        }

        stop.store(true, Ordering::Relaxed);
        writer.join().unwrap();
        assert!(mixed.is_empty(), "token/user from different saves: {:?}", mixed);
    }

    #[test]
    fn test_debug_redacts_token() {
        let session = Session {
            token: "secret-token".to_string(),
            user: supplier(),
        };
        assert!(!format!("{:?}", session).contains("secret-token"));
    }

    #[test]
    fn test_concurrent_saves_never_mix_pairs() {
        let storage = MemoryStorage::new();
        let store = Arc::new(SessionStore::new(storage.clone()));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    let user = UserProfile {
                        role: Role::Supplier,
                        display_name: format!("user-{}", i),
                        email: format!("{}@example.com", i),
                    };
                    store.save(user, format!("tok-{}", i)).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let current = store.current().unwrap();
        let suffix = current.token.trim_start_matches("tok-");
        assert_eq!(current.user.display_name, format!("user-{}", suffix));

        let persisted = SessionStore::open(storage).current().unwrap();
        assert_eq!(persisted, current);
    }
}
