/// Represents a user in the system.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    /// The sequential identifier assigned by the user directory.
    pub id: u64,
    /// The login the user signs in with.
    pub login: String,
    /// The user's password, stored as entered.
    pub password: String,
}

/// The attributes submitted when registering a new user.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NewUser {
    /// The requested login.
    pub login: String,
    /// The requested password.
    pub password: String,
}
