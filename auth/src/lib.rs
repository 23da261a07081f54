//! Session state for the Abelana client.

use std::sync::{Arc, RwLock};

use cache::Prefs;
use keyring::Entry;
use thiserror::Error;

const KEYRING_SERVICE_NAME: &str = "Abelana";
const KEYRING_USER_NAME: &str = "user_token";

/// Prefs key under which [`PrefsTokenStore`] keeps the session token.
pub const USER_TOKEN_KEY: &str = "userToken";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Keyring Error: {0}")]
    Keyring(String),
    #[error("Storage Error: {0}")]
    Storage(String),
    #[error("Other Error: {0}")]
    Other(String),
}

/// Somewhere to keep the session token between runs.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Option<String>, AuthError>;
    fn save(&self, token: &str) -> Result<(), AuthError>;
    fn clear(&self) -> Result<(), AuthError>;
}

/// Keeps the token next to the photo cache in the shared prefs store.
pub struct PrefsTokenStore {
    prefs: Arc<dyn Prefs>,
}

impl PrefsTokenStore {
    pub fn new(prefs: Arc<dyn Prefs>) -> Self {
        PrefsTokenStore { prefs }
    }
}

impl TokenStore for PrefsTokenStore {
    fn load(&self) -> Result<Option<String>, AuthError> {
        let raw = self
            .prefs
            .get(USER_TOKEN_KEY)
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        raw.map(|bytes| String::from_utf8(bytes).map_err(|e| AuthError::Storage(e.to_string())))
            .transpose()
    }

    fn save(&self, token: &str) -> Result<(), AuthError> {
        self.prefs
            .set(USER_TOKEN_KEY, token.as_bytes())
            .and_then(|_| self.prefs.flush())
            .map_err(|e| AuthError::Storage(e.to_string()))
    }

    fn clear(&self) -> Result<(), AuthError> {
        self.prefs
            .remove(USER_TOKEN_KEY)
            .and_then(|_| self.prefs.flush())
            .map_err(|e| AuthError::Storage(e.to_string()))
    }
}

/// Keeps the token in the operating system keyring.
pub struct KeyringTokenStore {
    entry: Entry,
}

impl KeyringTokenStore {
    pub fn new() -> Result<Self, AuthError> {
        let entry = Entry::new(KEYRING_SERVICE_NAME, KEYRING_USER_NAME)
            .map_err(|e| AuthError::Keyring(e.to_string()))?;
        Ok(KeyringTokenStore { entry })
    }
}

impl TokenStore for KeyringTokenStore {
    fn load(&self) -> Result<Option<String>, AuthError> {
        match self.entry.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(AuthError::Keyring(e.to_string())),
        }
    }

    fn save(&self, token: &str) -> Result<(), AuthError> {
        self.entry
            .set_password(token)
            .map_err(|e| AuthError::Keyring(e.to_string()))
    }

    fn clear(&self) -> Result<(), AuthError> {
        match self.entry.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(AuthError::Keyring(e.to_string())),
        }
    }
}

/// The current session token, mirrored to a [`TokenStore`].
///
/// An empty token is the same as no token: both mean signed out.
pub struct Session {
    store: Arc<dyn TokenStore>,
    token: RwLock<Option<String>>,
}

impl Session {
    /// Loads the stored token, if any. A store that cannot be read yields a
    /// signed-out session.
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        let token = match store.load() {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load session token");
                None
            }
        };
        Session { store, token: RwLock::new(token) }
    }

    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self, token)))]
    pub fn set_token(&self, token: &str) -> Result<(), AuthError> {
        self.store.save(token)?;
        let mut current = self
            .token
            .write()
            .map_err(|_| AuthError::Other("Poisoned lock".into()))?;
        *current = Some(token.to_string()).filter(|t| !t.is_empty());
        Ok(())
    }

    /// Forgets the token. The in-memory token is dropped even when the store
    /// cannot be updated.
    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    pub fn clear_token(&self) -> Result<(), AuthError> {
        match self.token.write() {
            Ok(mut current) => *current = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
        self.store.clear()
    }

    pub fn current_token(&self) -> Option<String> {
        match self.token.read() {
            Ok(token) => token.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.current_token().is_some_and(|t| !t.is_empty())
    }
}
