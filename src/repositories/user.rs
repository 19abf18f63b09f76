use std::collections::HashMap;

use crate::models::user::{NewUser, User};

/// In-memory directory of users, keyed by id and by login.
///
/// Not synchronised on its own; the application state wraps it in a lock and
/// callers hold the write guard across any check-then-insert sequence.
#[derive(Debug, Default)]
pub struct UserDirectory {
    users_by_id: HashMap<u64, User>,
    ids_by_login: HashMap<String, u64>,
    next_id: u64,
}

impl UserDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a new user under the next sequential id and returns it.
    ///
    /// Login uniqueness is the caller's concern; a repeated login rebinds the
    /// login index to the newest record.
    pub fn add_user(&mut self, new_user: NewUser) -> User {
        self.next_id += 1;
        let user = User {
            id: self.next_id,
            login: new_user.login,
            password: new_user.password,
        };

        self.ids_by_login.insert(user.login.clone(), user.id);
        self.users_by_id.insert(user.id, user.clone());

        tracing::debug!("User added to directory: {} ({})", user.login, user.id);
        user
    }

    /// Finds a user by their login.
    pub fn lookup_by_login(&self, login: &str) -> Option<&User> {
        self.ids_by_login
            .get(login)
            .and_then(|id| self.users_by_id.get(id))
    }

    /// Finds a user by their id.
    pub fn find_by_id(&self, id: u64) -> Option<&User> {
        self.users_by_id.get(&id)
    }

    /// The number of users stored.
    pub fn len(&self) -> usize {
        self.users_by_id.len()
    }

    /// Whether no users are stored.
    pub fn is_empty(&self) -> bool {
        self.users_by_id.is_empty()
    }
}
