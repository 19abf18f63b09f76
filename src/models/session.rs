use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Represents a server-side session.
///
/// Sessions live in memory only and never expire; they are lost on restart.
#[derive(Debug, Clone)]
pub struct Session {
    /// Whether the session has completed login or registration.
    pub logged_in: bool,
    /// The ID of the user this session is bound to, once authenticated.
    pub user_id: Option<u64>,
    /// The timestamp when the session was created.
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// A fresh, unauthenticated session.
    pub fn anonymous() -> Self {
        Self {
            logged_in: false,
            user_id: None,
            created_at: Utc::now(),
        }
    }
}

/// The session attached to the current request by the session middleware.
#[derive(Debug, Clone)]
pub struct CurrentSession {
    /// The token carried in the `session_id` cookie.
    pub id: Uuid,
    /// A snapshot of the session taken when the request arrived.
    pub session: Session,
}

impl CurrentSession {
    /// Whether the request may reach protected routes.
    pub fn is_logged_in(&self) -> bool {
        self.session.logged_in
    }
}
