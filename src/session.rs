//! Authentication state container.
//!
//! Holds the bearer token and its decoded claims, persists the token to a
//! `TokenStore`, and broadcasts `SessionEvent`s. One `AuthSession` is built
//! at startup and cloned into whatever needs it.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};

use tokio::sync::broadcast;

use crate::{
    auth::{decode_claims, token_fingerprint},
    error::ClientError,
    models::Claims,
};

/// Storage key (and file name) of the persisted bearer token.
pub const TOKEN_STORAGE_KEY: &str = "dcms.token";

pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Option<String>, ClientError>;
    fn save(&self, token: &str) -> Result<(), ClientError>;
    fn clear(&self) -> Result<(), ClientError>;
}

/// Token persisted as a single file.
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// `None` falls back to `<data dir>/dcms-desk/dcms.token`.
    pub fn new(path: Option<PathBuf>) -> Self {
        let path = path.unwrap_or_else(Self::default_path);
        Self { path }
    }

    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("dcms-desk")
            .join(TOKEN_STORAGE_KEY)
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<String>, ClientError> {
        match std::fs::read_to_string(&self.path) {
            Ok(s) if s.trim().is_empty() => Ok(None),
            Ok(s) => Ok(Some(s.trim().to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, token: &str) -> Result<(), ClientError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(&self.path, token)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), ClientError> {
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// In-memory store, for tests and throwaway sessions.
#[derive(Default)]
pub struct MemoryTokenStore {
    slot: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(token.into())),
        }
    }

    pub fn peek(&self) -> Option<String> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<String>, ClientError> {
        Ok(self.peek())
    }

    fn save(&self, token: &str) -> Result<(), ClientError> {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), ClientError> {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn,
    Refreshed,
    LoggedOut,
    /// Refresh failed for good; the user has to sign in again.
    Expired,
}

#[derive(Default)]
struct Credentials {
    token: Option<String>,
    claims: Option<Claims>,
    /// Bumped on every sign-in and sign-out. A refresh started under one
    /// generation may only write back into the same generation.
    generation: u64,
}

struct Inner {
    creds: RwLock<Credentials>,
    store: Arc<dyn TokenStore>,
    events: broadcast::Sender<SessionEvent>,
}

#[derive(Clone)]
pub struct AuthSession {
    inner: Arc<Inner>,
}

impl AuthSession {
    /// Empty session backed by `store`. Nothing is read from the store.
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            inner: Arc::new(Inner {
                creds: RwLock::new(Credentials::default()),
                store,
                events,
            }),
        }
    }

    /// Session initialised from a previously stored token, if it still decodes.
    pub fn restore(store: Arc<dyn TokenStore>) -> Self {
        let session = Self::new(store);

        let stored = match session.inner.store.load() {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!("could not read stored token: {e}");
                None
            }
        };

        if let Some(token) = stored {
            match decode_claims(&token) {
                Ok(claims) => {
                    tracing::debug!(token = %token_fingerprint(&token), "restored session");
                    let mut creds = session.write();
                    creds.token = Some(token);
                    creds.claims = Some(claims);
                    creds.generation += 1;
                }
                Err(e) => {
                    tracing::warn!("discarding stored token: {e}");
                    session.clear_store();
                }
            }
        }
        session
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        let creds = self.read();
        creds.claims.is_some() && creds.token.as_deref().is_some_and(|t| !t.is_empty())
    }

    pub fn token(&self) -> Option<String> {
        self.read().token.clone()
    }

    pub fn claims(&self) -> Option<Claims> {
        self.read().claims.clone()
    }

    pub fn generation(&self) -> u64 {
        self.read().generation
    }

    /// Generation and claims read together, for callers about to refresh.
    pub fn current(&self) -> Option<(u64, Claims)> {
        let creds = self.read();
        creds.claims.clone().map(|c| (creds.generation, c))
    }

    /// Store a freshly issued token after a successful login.
    pub fn login(&self, token: &str) -> Result<Claims, ClientError> {
        let claims = decode_claims(token)?;
        {
            let mut creds = self.write();
            creds.generation += 1;
            self.store_locked(&mut creds, token, &claims);
        }
        tracing::info!(sub = %claims.sub, "signed in");
        let _ = self.inner.events.send(SessionEvent::LoggedIn);
        Ok(claims)
    }

    /// Replace the held token with a refreshed one issued for `generation`.
    ///
    /// Fails with `SessionExpired` when the session was signed out (or signed
    /// in again) since that generation was read; the token is then dropped.
    /// A token identical to the one held is a no-op.
    pub fn set_credentials(&self, generation: u64, token: &str) -> Result<Claims, ClientError> {
        let claims = decode_claims(token)?;
        {
            let mut creds = self.write();
            if creds.generation != generation || creds.token.is_none() {
                tracing::debug!(
                    token = %token_fingerprint(token),
                    "discarding refreshed token for a closed session"
                );
                return Err(ClientError::SessionExpired);
            }
            if creds.token.as_deref() == Some(token) {
                return Ok(claims);
            }
            self.store_locked(&mut creds, token, &claims);
        }
        tracing::debug!(token = %token_fingerprint(token), "token refreshed");
        let _ = self.inner.events.send(SessionEvent::Refreshed);
        Ok(claims)
    }

    pub fn logout(&self) {
        if self.take(None) {
            tracing::info!("signed out");
        }
        let _ = self.inner.events.send(SessionEvent::LoggedOut);
    }

    /// Drop the credentials after an unrecoverable refresh failure.
    /// Only the call that actually clears a held token broadcasts
    /// `Expired`; returns whether this call did.
    pub fn expire(&self) -> bool {
        self.expire_inner(None)
    }

    /// Like `expire`, but only while the session is still in `generation`.
    pub fn expire_generation(&self, generation: u64) -> bool {
        self.expire_inner(Some(generation))
    }

    fn expire_inner(&self, generation: Option<u64>) -> bool {
        let had_token = self.take(generation);
        if had_token {
            tracing::warn!("session expired, sign-in required");
            let _ = self.inner.events.send(SessionEvent::Expired);
        }
        had_token
    }

    /// Caller holds the write lock; memory and store change together.
    fn store_locked(&self, creds: &mut Credentials, token: &str, claims: &Claims) {
        creds.token = Some(token.to_string());
        creds.claims = Some(claims.clone());
        if let Err(e) = self.inner.store.save(token) {
            tracing::warn!("could not persist token: {e}");
        }
    }

    fn take(&self, generation: Option<u64>) -> bool {
        let mut creds = self.write();
        if generation.is_some_and(|g| g != creds.generation) {
            return false;
        }
        creds.claims = None;
        let had_token = creds.token.take().is_some();
        if had_token {
            creds.generation += 1;
        }
        self.clear_store();
        had_token
    }

    fn clear_store(&self) {
        if let Err(e) = self.inner.store.clear() {
            tracing::warn!("could not clear stored token: {e}");
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Credentials> {
        self.inner.creds.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Credentials> {
        self.inner.creds.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::test_tokens;
    use chrono::{Duration, Utc};

    fn token(sub: &str) -> String {
        test_tokens::expiring_at(sub, Utc::now() + Duration::minutes(15))
    }

    #[test]
    fn login_persists_and_authenticates() {
        let store = Arc::new(MemoryTokenStore::default());
        let session = AuthSession::new(store.clone());
        assert!(!session.is_authenticated());

        let t = token("7");
        let claims = session.login(&t).unwrap();
        assert_eq!(claims.sub, "7");
        assert!(session.is_authenticated());
        assert_eq!(store.peek(), Some(t));
    }

    #[test]
    fn invalid_token_is_rejected_and_state_kept() {
        let session = AuthSession::new(Arc::new(MemoryTokenStore::default()));
        assert!(session.login("garbage").is_err());
        assert!(!session.is_authenticated());
        assert_eq!(session.token(), None);
    }

    #[test]
    fn restore_reads_store_and_drops_bad_tokens() {
        let good = token("9");
        let session = AuthSession::restore(Arc::new(MemoryTokenStore::with_token(good.clone())));
        assert!(session.is_authenticated());
        assert_eq!(session.token(), Some(good));

        let store = Arc::new(MemoryTokenStore::with_token("not-a-token"));
        let session = AuthSession::restore(store.clone());
        assert!(!session.is_authenticated());
        assert_eq!(store.peek(), None);
    }

    #[test]
    fn logout_clears_everything() {
        let store = Arc::new(MemoryTokenStore::default());
        let session = AuthSession::new(store.clone());
        let mut events = session.subscribe();
        session.login(&token("1")).unwrap();
        session.logout();

        assert!(!session.is_authenticated());
        assert_eq!(session.claims(), None);
        assert_eq!(store.peek(), None);
        assert_eq!(events.try_recv().unwrap(), SessionEvent::LoggedIn);
        assert_eq!(events.try_recv().unwrap(), SessionEvent::LoggedOut);
    }

    #[test]
    fn expire_broadcasts_once() {
        let store = Arc::new(MemoryTokenStore::default());
        let session = AuthSession::new(store.clone());
        session.login(&token("1")).unwrap();
        let mut events = session.subscribe();

        assert!(session.expire());
        assert!(!session.expire());

        assert_eq!(events.try_recv().unwrap(), SessionEvent::Expired);
        assert!(events.try_recv().is_err());
        assert_eq!(store.peek(), None);
    }

    #[test]
    fn set_credentials_skips_identical_token() {
        let session = AuthSession::new(Arc::new(MemoryTokenStore::default()));
        let t = token("1");
        session.login(&t).unwrap();
        let mut events = session.subscribe();

        let generation = session.generation();
        session.set_credentials(generation, &t).unwrap();
        assert!(events.try_recv().is_err());

        let fresh = token("2");
        session.set_credentials(generation, &fresh).unwrap();
        assert_eq!(events.try_recv().unwrap(), SessionEvent::Refreshed);
        assert_eq!(session.claims().unwrap().sub, "2");
        assert_eq!(session.generation(), generation);
    }

    #[test]
    fn refreshed_token_after_logout_is_discarded() {
        let store = Arc::new(MemoryTokenStore::default());
        let session = AuthSession::new(store.clone());
        session.login(&token("1")).unwrap();
        let (generation, _) = session.current().unwrap();

        session.logout();
        let err = session.set_credentials(generation, &token("2")).unwrap_err();
        assert!(matches!(err, ClientError::SessionExpired));
        assert!(!session.is_authenticated());
        assert_eq!(store.peek(), None);
    }

    #[test]
    fn refresh_from_previous_sign_in_does_not_replace_new_one() {
        let session = AuthSession::new(Arc::new(MemoryTokenStore::default()));
        session.login(&token("old")).unwrap();
        let stale = session.generation();

        session.logout();
        session.login(&token("new")).unwrap();

        assert!(session.set_credentials(stale, &token("old-refreshed")).is_err());
        assert!(!session.expire_generation(stale));
        assert_eq!(session.claims().unwrap().sub, "new");
    }

    #[test]
    fn refresh_without_sign_in_is_rejected() {
        let session = AuthSession::new(Arc::new(MemoryTokenStore::default()));
        assert!(session.set_credentials(session.generation(), &token("1")).is_err());
        assert!(!session.is_authenticated());
    }

    #[test]
    fn file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(Some(dir.path().join("nested").join(TOKEN_STORAGE_KEY)));
        assert_eq!(store.load().unwrap(), None);
        store.save("abc.def.ghi").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("abc.def.ghi"));
        store.clear().unwrap();
        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }
}
