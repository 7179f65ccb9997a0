//! Reactive session state, persisted to session storage and kept in sync
//! across every instance that shares that storage.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::{Stream, StreamExt};

use crate::error::AppResult;
use crate::error_messages::{self, UserFacingError};
use crate::models::{AccountRole, LoginRequest};
use crate::services::AuthBackend;
use crate::storage::{SessionStorage, StorageEvent};

pub const AUTH_STORAGE_KEY: &str = "auth-storage";
const PERSIST_VERSION: u32 = 0;
/// Tokens expiring sooner than this are refreshed before use.
const REFRESH_LEEWAY_SECS: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitializationStatus {
    #[default]
    Idle,
    Loading,
    Completed,
    Error,
}

impl InitializationStatus {
    pub fn is_settled(&self) -> bool {
        matches!(self, InitializationStatus::Completed | InitializationStatus::Error)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthState {
    #[serde(default)]
    pub role: Option<AccountRole>,
    #[serde(default)]
    pub is_authenticated: bool,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub initialization_status: InitializationStatus,
}

impl AuthState {
    pub fn signed_out(status: InitializationStatus) -> Self {
        Self {
            initialization_status: status,
            ..Self::default()
        }
    }
}

#[derive(Serialize, Deserialize)]
struct PersistedAuth {
    state: AuthState,
    #[serde(default)]
    version: u32,
}

pub fn parse_persisted(raw: &str) -> AppResult<AuthState> {
    let persisted: PersistedAuth = serde_json::from_str(raw)?;
    Ok(persisted.state)
}

/// Reads the persisted record directly, bypassing any live store.
pub fn read_persisted(storage: &dyn SessionStorage) -> AppResult<Option<AuthState>> {
    match storage.get(AUTH_STORAGE_KEY)? {
        Some(raw) => parse_persisted(&raw).map(Some),
        None => Ok(None),
    }
}

#[derive(Deserialize)]
struct ExpiryClaims {
    exp: Option<i64>,
}

/// Expiry of a JWT access token. The signature is not checked; the server
/// does that.
pub fn token_expiry(token: &str) -> Option<DateTime<Utc>> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data =
        jsonwebtoken::decode::<ExpiryClaims>(token, &DecodingKey::from_secret(&[]), &validation)
            .ok()?;
    DateTime::from_timestamp(data.claims.exp?, 0)
}

pub struct AuthStore<B> {
    backend: B,
    storage: Arc<dyn SessionStorage>,
    state: watch::Sender<AuthState>,
    /// Raw record this instance last wrote; `Some(None)` after a removal.
    last_written: Mutex<Option<Option<String>>>,
}

impl<B: AuthBackend> AuthStore<B> {
    /// Hydrates from the persisted record; an unreadable record starts
    /// signed out.
    pub fn new(backend: B, storage: Arc<dyn SessionStorage>) -> Self {
        let initial = match read_persisted(storage.as_ref()) {
            Ok(state) => state.unwrap_or_default(),
            Err(e) => {
                tracing::warn!("Ignoring unreadable persisted auth state: {}", e);
                AuthState::default()
            }
        };
        let (state, _) = watch::channel(initial);
        Self {
            backend,
            storage,
            state,
            last_written: Mutex::new(None),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn token(&self) -> Option<String> {
        self.state.borrow().token.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    fn persist(&self, state: &AuthState) {
        let envelope = PersistedAuth {
            state: state.clone(),
            version: PERSIST_VERSION,
        };
        let result = serde_json::to_string(&envelope)
            .map_err(Into::into)
            .and_then(|raw| -> AppResult<String> {
                self.storage.set(AUTH_STORAGE_KEY, &raw)?;
                Ok(raw)
            });
        match result {
            Ok(raw) => self.remember_write(Some(raw)),
            Err(e) => tracing::warn!("Failed to persist auth state: {}", e),
        }
    }

    fn remember_write(&self, raw: Option<String>) {
        if let Ok(mut last) = self.last_written.lock() {
            *last = Some(raw);
        }
    }

    /// Events echoing this instance's own write, or describing a value that
    /// storage no longer holds, carry nothing new.
    fn is_own_or_stale(&self, event: &StorageEvent) -> bool {
        let own = self
            .last_written
            .lock()
            .map(|last| last.as_ref() == Some(&event.new_value))
            .unwrap_or(false);
        if own {
            return true;
        }
        match self.storage.get(AUTH_STORAGE_KEY) {
            Ok(current) => current != event.new_value,
            Err(e) => {
                tracing::warn!("Failed to re-read auth storage: {}", e);
                false
            }
        }
    }

    fn set_state(&self, next: AuthState) {
        self.persist(&next);
        self.state.send_replace(next);
    }

    /// Asks the server whether the cookie session is still valid. Does
    /// nothing once a previous call has completed.
    #[tracing::instrument(skip(self))]
    pub async fn initialize_auth(&self) {
        if self.state.borrow().initialization_status == InitializationStatus::Completed {
            return;
        }

        let mut loading = self.state();
        loading.initialization_status = InitializationStatus::Loading;
        self.set_state(loading);

        let next = match self.backend.auth_status().await {
            Ok(status) if status.is_authenticated => AuthState {
                role: status.role(),
                is_authenticated: true,
                token: status.access.clone().or_else(|| self.token()),
                initialization_status: InitializationStatus::Completed,
            },
            Ok(_) => AuthState::signed_out(InitializationStatus::Completed),
            Err(e) => {
                tracing::warn!("Auth status check failed: {}", e);
                AuthState::signed_out(InitializationStatus::Error)
            }
        };
        self.set_state(next);
    }

    #[tracing::instrument(skip(self, password))]
    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<AccountRole>, UserFacingError> {
        let credentials = LoginRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
        };

        match self.backend.login(&credentials).await {
            Ok(response) => {
                let role = response.user.role.clone();
                self.set_state(AuthState {
                    role: role.clone(),
                    is_authenticated: true,
                    token: Some(response.access),
                    initialization_status: InitializationStatus::Completed,
                });
                Ok(role)
            }
            Err(e) => {
                tracing::warn!("Login failed: {}", e);
                if self.state.borrow().is_authenticated {
                    self.set_state(AuthState::signed_out(InitializationStatus::Completed));
                }
                Err(error_messages::login_error(&e))
            }
        }
    }

    /// Clears the token, role and persisted record whether or not the server
    /// call succeeds. This is deliberate: a failed `/logout/` still ends the
    /// local session, and the server error is returned to the caller.
    #[tracing::instrument(skip(self))]
    pub async fn logout(&self) -> AppResult<()> {
        let result = self.backend.logout().await;
        if let Err(e) = &result {
            tracing::warn!("Logout request failed, clearing local session anyway: {}", e);
        }

        match self.storage.remove(AUTH_STORAGE_KEY) {
            Ok(()) => self.remember_write(None),
            Err(e) => tracing::warn!("Failed to remove persisted auth state: {}", e),
        }
        self.state
            .send_replace(AuthState::signed_out(InitializationStatus::Completed));
        result
    }

    /// Exchanges the refresh cookie for a new access token. A rejected
    /// refresh signs the session out.
    #[tracing::instrument(skip(self))]
    pub async fn refresh_session(&self) -> AppResult<()> {
        match self.backend.refresh().await {
            Ok(response) => {
                let mut next = self.state();
                next.token = Some(response.access);
                self.set_state(next);
                Ok(())
            }
            Err(e) => {
                if matches!(e.status(), Some(401) | Some(403)) {
                    tracing::info!("Refresh rejected, signing out");
                    self.set_state(AuthState::signed_out(InitializationStatus::Completed));
                }
                Err(e)
            }
        }
    }

    /// Refreshes when the held token expires within the leeway. Returns
    /// whether a refresh happened.
    pub async fn ensure_fresh_token(&self) -> AppResult<bool> {
        let Some(token) = self.token() else {
            return Ok(false);
        };
        let Some(expiry) = token_expiry(&token) else {
            return Ok(false);
        };
        if expiry - Utc::now() > Duration::seconds(REFRESH_LEEWAY_SECS) {
            return Ok(false);
        }
        tracing::debug!("Access token expires at {}, refreshing", expiry);
        self.refresh_session().await?;
        Ok(true)
    }

    /// Re-hydrates from a change made by another instance. Returns whether
    /// the live state changed. Never writes back to storage.
    pub fn handle_storage_event(&self, event: &StorageEvent) -> bool {
        if event.key != AUTH_STORAGE_KEY {
            return false;
        }
        if self.is_own_or_stale(event) {
            tracing::debug!("Skipping own or superseded auth storage event");
            return false;
        }

        let next = match event.new_value.as_deref() {
            None => AuthState::signed_out(InitializationStatus::Completed),
            Some(raw) => match parse_persisted(raw) {
                Ok(state) => state,
                Err(e) => {
                    tracing::warn!("Ignoring unreadable auth storage event: {}", e);
                    return false;
                }
            },
        };

        let changed = self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
        if changed {
            tracing::info!("Auth state updated from another instance");
        }
        changed
    }
}

impl<B: AuthBackend + 'static> AuthStore<B> {
    /// Applies every event from `events` until the stream ends.
    pub fn spawn_storage_sync<S>(self: Arc<Self>, events: S) -> JoinHandle<()>
    where
        S: Stream<Item = StorageEvent> + Send + 'static,
    {
        tokio::spawn(async move {
            let mut events = Box::pin(events);
            while let Some(event) = events.next().await {
                self.handle_storage_event(&event);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ApiErrorBody, AppError};
    use crate::error_messages::INVALID_CREDENTIALS_MESSAGE;
    use crate::models::{AuthStatusResponse, LoginResponse, RefreshResponse, UserSummary};
    use crate::storage::{watch_key, FileStorage, MemoryStorage};
    use async_trait::async_trait;
    use jsonwebtoken::{EncodingKey, Header};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeBackend {
        reject_login: bool,
        status_fails: bool,
        logout_fails: bool,
        refresh_token: Option<String>,
        status_calls: AtomicUsize,
        refresh_calls: AtomicUsize,
    }

    fn rejected(status: u16, json: &str) -> AppError {
        AppError::Api {
            status,
            body: ApiErrorBody::parse(json),
        }
    }

    #[async_trait]
    impl AuthBackend for FakeBackend {
        async fn login(&self, credentials: &LoginRequest) -> AppResult<LoginResponse> {
            if self.reject_login {
                return Err(rejected(401, ""));
            }
            Ok(LoginResponse {
                access: format!("token-for-{}", credentials.email),
                user: UserSummary {
                    role: Some(AccountRole::Member),
                    ..UserSummary::default()
                },
            })
        }

        async fn refresh(&self) -> AppResult<RefreshResponse> {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            match &self.refresh_token {
                Some(access) => Ok(RefreshResponse {
                    access: access.clone(),
                }),
                None => Err(rejected(401, r#"{"detail": "Token is invalid or expired"}"#)),
            }
        }

        async fn logout(&self) -> AppResult<()> {
            if self.logout_fails {
                return Err(rejected(503, ""));
            }
            Ok(())
        }

        async fn auth_status(&self) -> AppResult<AuthStatusResponse> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            if self.status_fails {
                return Err(rejected(500, ""));
            }
            Ok(AuthStatusResponse {
                is_authenticated: true,
                user: None,
                role: Some(AccountRole::Store),
                access: Some("status-token".to_string()),
            })
        }
    }

    fn jwt_expiring_in(seconds: i64) -> String {
        #[derive(Serialize)]
        struct Claims {
            exp: i64,
        }
        let claims = Claims {
            exp: (Utc::now() + Duration::seconds(seconds)).timestamp(),
        };
        jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(b"k")).unwrap()
    }

    #[tokio::test]
    async fn test_login_persists_envelope() {
        let storage = Arc::new(MemoryStorage::new());
        let store = AuthStore::new(FakeBackend::default(), storage.clone());

        let role = store.login(" ann@example.com ", "pw").await.unwrap();
        assert_eq!(role, Some(AccountRole::Member));

        let raw = storage.get(AUTH_STORAGE_KEY).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["version"], 0);
        assert_eq!(value["state"]["isAuthenticated"], true);
        assert_eq!(value["state"]["role"], "member");
        assert_eq!(value["state"]["token"], "token-for-ann@example.com");
        assert_eq!(value["state"]["initializationStatus"], "completed");
    }

    #[tokio::test]
    async fn test_invalid_credentials() {
        let storage = Arc::new(MemoryStorage::new());
        let backend = FakeBackend {
            reject_login: true,
            ..FakeBackend::default()
        };
        let store = AuthStore::new(backend, storage);

        let err = store.login("ann@example.com", "wrong").await.unwrap_err();
        assert_eq!(err.message, INVALID_CREDENTIALS_MESSAGE);
        assert!(!store.state().is_authenticated);
    }

    #[tokio::test]
    async fn test_initialize_is_noop_once_completed() {
        let storage = Arc::new(MemoryStorage::new());
        let store = AuthStore::new(FakeBackend::default(), storage);

        store.initialize_auth().await;
        let state = store.state();
        assert!(state.is_authenticated);
        assert_eq!(state.role, Some(AccountRole::Store));
        assert_eq!(state.token.as_deref(), Some("status-token"));

        store.initialize_auth().await;
        assert_eq!(store.backend().status_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_initialize_failure_signs_out_with_error() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .set(
                AUTH_STORAGE_KEY,
                r#"{"state":{"role":"member","isAuthenticated":true,"token":"old","initializationStatus":"loading"},"version":0}"#,
            )
            .unwrap();
        let backend = FakeBackend {
            status_fails: true,
            ..FakeBackend::default()
        };
        let store = AuthStore::new(backend, storage);
        assert!(store.state().is_authenticated);

        store.initialize_auth().await;
        assert_eq!(
            store.state(),
            AuthState::signed_out(InitializationStatus::Error)
        );
    }

    #[tokio::test]
    async fn test_logout_elsewhere_signs_out_here() {
        let storage = Arc::new(MemoryStorage::new());
        let first = AuthStore::new(FakeBackend::default(), storage.clone());
        let second = Arc::new(AuthStore::new(FakeBackend::default(), storage.clone()));
        let sync = second.clone().spawn_storage_sync(storage.subscribe());
        let mut observed = second.subscribe();

        first.login("ann@example.com", "pw").await.unwrap();
        observed.wait_for(|s| s.is_authenticated).await.unwrap();

        first.logout().await.unwrap();
        observed.wait_for(|s| !s.is_authenticated).await.unwrap();

        assert_eq!(storage.get(AUTH_STORAGE_KEY).unwrap(), None);
        let state = second.state();
        assert_eq!(state.token, None);
        assert_eq!(state.role, None);
        sync.abort();
    }

    #[tokio::test]
    async fn test_queued_own_write_does_not_undo_logout() {
        let dir = tempfile::tempdir().unwrap();
        let storage: Arc<dyn SessionStorage> = Arc::new(FileStorage::new(dir.path()).unwrap());
        let store = AuthStore::new(FakeBackend::default(), storage.clone());
        let mut events = watch_key(
            storage.clone(),
            AUTH_STORAGE_KEY,
            std::time::Duration::from_millis(10),
        );

        store.login("ann@example.com", "pw").await.unwrap();
        let signed_in = events.next().await.unwrap();
        assert!(signed_in.new_value.is_some());

        store.logout().await.unwrap();
        assert!(!store.handle_storage_event(&signed_in));
        assert_eq!(store.state(), AuthState::signed_out(InitializationStatus::Completed));

        let removed = events.next().await.unwrap();
        assert_eq!(removed.new_value, None);
        assert!(!store.handle_storage_event(&removed));

        // Own login echoed back is skipped; a removal from another process is not.
        store.login("ann@example.com", "pw").await.unwrap();
        let echoed = events.next().await.unwrap();
        assert!(!store.handle_storage_event(&echoed));
        assert!(store.state().is_authenticated);

        FileStorage::new(dir.path()).unwrap().remove(AUTH_STORAGE_KEY).unwrap();
        let removed_elsewhere = events.next().await.unwrap();
        assert!(store.handle_storage_event(&removed_elsewhere));
        assert!(!store.state().is_authenticated);
        assert_eq!(store.token(), None);
    }

    #[tokio::test]
    async fn test_superseded_loading_event_is_ignored() {
        let storage = Arc::new(MemoryStorage::new());
        let events = storage.subscribe();
        tokio::pin!(events);
        let store = AuthStore::new(FakeBackend::default(), storage.clone());

        store.initialize_auth().await;
        let loading = events.next().await.unwrap();
        let loaded = parse_persisted(loading.new_value.as_deref().unwrap()).unwrap();
        assert_eq!(loaded.initialization_status, InitializationStatus::Loading);

        assert!(!store.handle_storage_event(&loading));
        assert_eq!(store.state().initialization_status, InitializationStatus::Completed);
    }

    #[tokio::test]
    async fn test_failed_logout_still_clears_session() {
        let storage = Arc::new(MemoryStorage::new());
        let backend = FakeBackend {
            logout_fails: true,
            ..FakeBackend::default()
        };
        let store = AuthStore::new(backend, storage.clone());
        store.login("ann@example.com", "pw").await.unwrap();

        let err = store.logout().await.unwrap_err();
        assert_eq!(err.status(), Some(503));
        assert_eq!(store.state(), AuthState::signed_out(InitializationStatus::Completed));
        assert_eq!(storage.get(AUTH_STORAGE_KEY).unwrap(), None);
    }

    #[test]
    fn test_storage_event_for_other_key_is_ignored() {
        let store = AuthStore::new(FakeBackend::default(), Arc::new(MemoryStorage::new()));
        let changed = store.handle_storage_event(&StorageEvent {
            key: "theme".to_string(),
            old_value: None,
            new_value: Some("dark".to_string()),
        });
        assert!(!changed);
    }

    #[test]
    fn test_token_expiry_reads_exp_claim() {
        let token = jwt_expiring_in(3600);
        let expiry = token_expiry(&token).unwrap();
        assert!(expiry > Utc::now() + Duration::seconds(3500));
        assert!(token_expiry("not-a-jwt").is_none());
    }

    #[tokio::test]
    async fn test_refresh_only_near_expiry() {
        let storage = Arc::new(MemoryStorage::new());
        let backend = FakeBackend {
            refresh_token: Some("fresh".to_string()),
            ..FakeBackend::default()
        };
        let store = AuthStore::new(backend, storage);

        store.set_state(AuthState {
            token: Some(jwt_expiring_in(3600)),
            is_authenticated: true,
            ..AuthState::default()
        });
        assert!(!store.ensure_fresh_token().await.unwrap());

        store.set_state(AuthState {
            token: Some(jwt_expiring_in(30)),
            is_authenticated: true,
            ..AuthState::default()
        });
        assert!(store.ensure_fresh_token().await.unwrap());
        assert_eq!(store.token().as_deref(), Some("fresh"));
        assert_eq!(store.backend().refresh_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rejected_refresh_signs_out() {
        let storage = Arc::new(MemoryStorage::new());
        let store = AuthStore::new(FakeBackend::default(), storage);
        store.login("ann@example.com", "pw").await.unwrap();

        assert!(store.refresh_session().await.is_err());
        assert!(!store.state().is_authenticated);
    }
}
