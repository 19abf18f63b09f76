use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::Config;
use crate::error::Result;
use crate::models::session::Session;
use crate::models::user::NewUser;
use crate::repositories::user::UserDirectory;
use crate::services::auth::AuthConfig;
use crate::services::blobs::BlobGateway;
use crate::storage;

/// Server-side sessions keyed by the token in the `session_id` cookie.
///
/// Entries are never evicted: the map grows by one for every visitor that
/// reaches a route without a valid cookie, until the process restarts.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, Session>>>,
}

impl SessionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts an anonymous session and returns its token.
    pub async fn create(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.sessions.write().await.insert(id, Session::anonymous());
        id
    }

    /// Returns a snapshot of the session, if it exists.
    pub async fn get(&self, id: &Uuid) -> Option<Session> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Replaces the session `previous` with a fresh authenticated one bound
    /// to `user_id`, returning the new token.
    pub async fn log_in(&self, previous: &Uuid, user_id: u64) -> Uuid {
        let id = Uuid::new_v4();
        let mut sessions = self.sessions.write().await;
        sessions.remove(previous);
        sessions.insert(
            id,
            Session {
                logged_in: true,
                user_id: Some(user_id),
                ..Session::anonymous()
            },
        );
        id
    }

    /// Returns the session to the anonymous state.
    pub async fn log_out(&self, id: &Uuid) {
        if let Some(session) = self.sessions.write().await.get_mut(id) {
            session.logged_in = false;
            session.user_id = None;
        }
    }

    /// The number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// The application's state.
#[derive(Clone)]
pub struct AppState {
    /// The application's configuration.
    pub config: Arc<Config>,
    /// The wiring of the login and registration flow.
    pub auth: Arc<AuthConfig>,
    /// The user directory, owned here and shared with the handlers.
    pub users: Arc<RwLock<UserDirectory>>,
    /// Server-side sessions.
    pub sessions: SessionStore,
    /// Blob operations on the configured container.
    pub blobs: BlobGateway,
}

impl AppState {
    /// Creates a new `AppState` with storage clients built from the configuration.
    pub fn new(config: &Config) -> Result<Self> {
        let clients = storage::create_clients(config)?;
        let blobs = BlobGateway::new(clients.store, clients.admin, config.container_name.clone());
        tracing::info!("✅ Blob gateway initialized for container '{}'", config.container_name);

        Ok(Self::with_gateway(config, blobs))
    }

    /// Creates a new `AppState` around an existing blob gateway.
    ///
    /// The user directory starts with the configured seed account.
    pub fn with_gateway(config: &Config, blobs: BlobGateway) -> Self {
        let mut users = UserDirectory::new();
        let seeded = users.add_user(NewUser {
            login: config.seed_login.clone(),
            password: config.seed_password.clone(),
        });
        tracing::info!("✅ User directory seeded with '{}' ({})", seeded.login, seeded.id);

        Self {
            config: Arc::new(config.clone()),
            auth: Arc::new(AuthConfig::new(config.locals_delay)),
            users: Arc::new(RwLock::new(users)),
            sessions: SessionStore::new(),
            blobs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sessions_start_anonymous_and_toggle() {
        let store = SessionStore::new();
        let id = store.create().await;

        assert!(!store.get(&id).await.unwrap().logged_in);

        let rotated = store.log_in(&id, 7).await;
        assert_ne!(rotated, id);
        assert!(store.get(&id).await.is_none());

        let session = store.get(&rotated).await.unwrap();
        assert!(session.logged_in);
        assert_eq!(session.user_id, Some(7));

        store.log_out(&rotated).await;
        assert!(!store.get(&rotated).await.unwrap().logged_in);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn unknown_token_has_no_session() {
        let store = SessionStore::new();
        assert!(store.get(&Uuid::new_v4()).await.is_none());
    }

    #[test]
    fn state_seeds_one_user() {
        let state = AppState::new(&Config::in_memory()).unwrap();
        let users = state.users.try_read().unwrap();
        assert_eq!(users.len(), 1);
        assert!(users.lookup_by_login("finomial").is_some());
    }
}
