// ── Auth session ──
//
// Owns the bearer credential for one device: where it is persisted, whether
// the device demands one, and what happens when the device rejects it.

use std::sync::{Arc, Mutex, PoisonError};

use boneio_api::BoneioClient;
use secrecy::SecretString;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::CoreError;

/// Observable authentication status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AuthState {
    pub is_authenticated: bool,
    pub is_auth_required: bool,
}

impl AuthState {
    /// Whether protected calls can be expected to succeed.
    pub fn is_satisfied(&self) -> bool {
        !self.is_auth_required || self.is_authenticated
    }
}

/// Where session tokens live between runs.
pub trait TokenStore: Send + Sync + 'static {
    fn load(&self) -> Option<SecretString>;
    fn save(&self, token: &SecretString);
    fn clear(&self);
}

/// Process-local token store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<SecretString>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: SecretString) -> Self {
        Self {
            token: Mutex::new(Some(token)),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Option<SecretString> {
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn save(&self, token: &SecretString) {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.clone());
    }

    fn clear(&self) {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Cheaply cloneable handle to the credential of one device.
#[derive(Clone)]
pub struct AuthSession {
    inner: Arc<AuthInner>,
}

struct AuthInner {
    client: Arc<BoneioClient>,
    store: Arc<dyn TokenStore>,
    state: watch::Sender<AuthState>,
}

impl AuthSession {
    /// Wrap `client`, restoring any stored token. A restored token is
    /// trusted until the device rejects it.
    pub fn new(client: Arc<BoneioClient>, store: Arc<dyn TokenStore>) -> Self {
        let restored = store.load();
        let is_authenticated = restored.is_some();
        if is_authenticated {
            debug!("restored stored session token");
            client.set_token(restored);
        }

        let (state, _) = watch::channel(AuthState {
            is_authenticated,
            is_auth_required: false,
        });

        Self {
            inner: Arc::new(AuthInner {
                client,
                store,
                state,
            }),
        }
    }

    /// Ask the device whether login is required. Falls back to "required"
    /// when the device cannot be asked.
    pub async fn init(&self) -> AuthState {
        let required = match self.inner.client.auth_required().await {
            Ok(required) => required,
            Err(e) => {
                warn!(error = %e, "could not determine auth requirement, assuming required");
                true
            }
        };
        self.inner.state.send_modify(|s| s.is_auth_required = required);
        self.state()
    }

    pub fn state(&self) -> AuthState {
        *self.inner.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.inner.state.subscribe()
    }

    /// The current bearer token, if any.
    pub fn credential(&self) -> Option<SecretString> {
        self.inner.client.token()
    }

    /// Exchange credentials for a token and persist it.
    pub async fn login(&self, username: &str, password: &SecretString) -> Result<(), CoreError> {
        let token = self.inner.client.login(username, password).await?;
        self.inner.store.save(&token);
        self.inner.state.send_modify(|s| s.is_authenticated = true);
        info!(username, "logged in");
        Ok(())
    }

    /// Forget the credential locally.
    pub fn logout(&self) {
        self.forget();
        info!("logged out");
    }

    /// Drop a credential the device has rejected.
    pub fn evict(&self) {
        warn!("device rejected the session token, clearing it");
        self.forget();
    }

    /// Pass `result` through, evicting the credential on a 401.
    pub fn observe<T>(&self, result: Result<T, boneio_api::Error>) -> Result<T, CoreError> {
        result.map_err(|e| {
            if e.is_unauthorized() {
                self.evict();
            }
            CoreError::from(e)
        })
    }

    fn forget(&self) {
        self.inner.client.set_token(None);
        self.inner.store.clear();
        self.inner.state.send_if_modified(|s| {
            let was = s.is_authenticated;
            s.is_authenticated = false;
            was
        });
    }

    /// Force the requirement flag without asking the device.
    #[cfg(test)]
    pub(crate) fn set_required(&self, required: bool) {
        self.inner.state.send_modify(|s| s.is_auth_required = required);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use std::time::Duration;

    use secrecy::ExposeSecret;
    use url::Url;

    use super::*;

    /// Client pointed at a port nothing listens on; tests never send requests.
    pub(crate) fn offline_client() -> Arc<BoneioClient> {
        Arc::new(BoneioClient::with_client(
            reqwest::Client::new(),
            Url::parse("http://127.0.0.1:9").unwrap(),
            Duration::from_secs(1),
        ))
    }

    #[test]
    fn restores_stored_token_optimistically() {
        let store = Arc::new(MemoryTokenStore::with_token(SecretString::from("abc".to_owned())));
        let session = AuthSession::new(offline_client(), store);

        assert!(session.state().is_authenticated);
        assert_eq!(
            session.credential().map(|t| t.expose_secret().to_owned()),
            Some("abc".to_owned())
        );
    }

    #[test]
    fn evict_clears_client_and_store() {
        let store = Arc::new(MemoryTokenStore::with_token(SecretString::from("abc".to_owned())));
        let session = AuthSession::new(offline_client(), store.clone());
        session.set_required(true);

        session.evict();

        assert!(session.credential().is_none());
        assert!(store.load().is_none());
        let state = session.state();
        assert!(!state.is_authenticated);
        assert!(!state.is_satisfied());
    }

    #[test]
    fn observe_evicts_only_on_unauthorized() {
        let store = Arc::new(MemoryTokenStore::with_token(SecretString::from("abc".to_owned())));
        let session = AuthSession::new(offline_client(), store);

        let not_found: Result<(), _> = Err(boneio_api::Error::Api {
            status: 404,
            message: "Output not found".into(),
        });
        assert!(session.observe(not_found).is_err());
        assert!(session.state().is_authenticated);

        let rejected: Result<(), _> = Err(boneio_api::Error::Unauthorized);
        let err = session.observe(rejected).unwrap_err();
        assert!(err.is_auth());
        assert!(!session.state().is_authenticated);
    }

    #[test]
    fn satisfied_when_not_required() {
        let state = AuthState {
            is_authenticated: false,
            is_auth_required: false,
        };
        assert!(state.is_satisfied());
    }
}
