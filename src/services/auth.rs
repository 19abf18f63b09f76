use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use subtle::ConstantTimeEq;
use tokio::sync::RwLock;

use crate::models::user::{NewUser, User};
use crate::repositories::user::UserDirectory;
use crate::validation::auth::{
    missing_credentials, LOGIN_TAKEN, PASSWORD_FAILED, USER_NOT_FOUND,
};

/// Values handed to a form view before it renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locals {
    /// The page title.
    pub title: String,
}

/// The form views of the auth flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthView {
    Login,
    Register,
}

/// Computes the locals of a form view, after the configured delay.
pub type LocalsProvider = fn(Duration) -> BoxFuture<'static, Locals>;

/// Checks submitted credentials, returning the user or the ordered error list.
pub type Authenticator = fn(&UserDirectory, &str, &str) -> Result<User, Vec<String>>;

/// Extends the errors collected so far for a registration attempt.
pub type RegistrationValidator = fn(&UserDirectory, &NewUser, Vec<String>) -> Vec<String>;

/// Stores a validated registration and returns the created user.
pub type UserFactory = fn(&mut UserDirectory, NewUser) -> User;

/// Everything the login, registration and logout handlers are wired with.
#[derive(Clone)]
pub struct AuthConfig {
    /// The form field carrying the login.
    pub login_field: &'static str,
    /// The form field carrying the password.
    pub password_field: &'static str,
    pub get_login_path: &'static str,
    pub post_login_path: &'static str,
    pub get_register_path: &'static str,
    pub post_register_path: &'static str,
    pub logout_path: &'static str,
    pub login_view: AuthView,
    pub register_view: AuthView,
    pub login_locals: LocalsProvider,
    pub register_locals: LocalsProvider,
    /// How long the locals providers wait before resolving.
    pub locals_delay: Duration,
    pub authenticate: Authenticator,
    pub validate_registration: RegistrationValidator,
    pub register_user: UserFactory,
    pub login_success_redirect: &'static str,
    pub register_success_redirect: &'static str,
    pub logout_redirect: &'static str,
}

impl AuthConfig {
    /// The standard wiring with the given locals delay.
    pub fn new(locals_delay: Duration) -> Self {
        Self {
            login_field: "login",
            password_field: "password",
            get_login_path: "/login",
            post_login_path: "/login",
            get_register_path: "/register",
            post_register_path: "/register",
            logout_path: "/logout",
            login_view: AuthView::Login,
            register_view: AuthView::Register,
            login_locals: delayed_login_locals,
            register_locals: delayed_register_locals,
            locals_delay,
            authenticate,
            validate_registration,
            register_user,
            login_success_redirect: "/",
            register_success_redirect: "/",
            logout_redirect: "/",
        }
    }
}

fn delayed_locals(delay: Duration, title: &'static str) -> BoxFuture<'static, Locals> {
    async move {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Locals {
            title: title.to_string(),
        }
    }
    .boxed()
}

/// Locals of the login form.
pub fn delayed_login_locals(delay: Duration) -> BoxFuture<'static, Locals> {
    delayed_locals(delay, "Login")
}

/// Locals of the registration form.
pub fn delayed_register_locals(delay: Duration) -> BoxFuture<'static, Locals> {
    delayed_locals(delay, "Register")
}

/// Checks credentials against the directory.
///
/// Presence checks run first and both are reported; only when both fields are
/// present does the lookup run, followed by the password comparison.
pub fn authenticate(
    users: &UserDirectory,
    login: &str,
    password: &str,
) -> Result<User, Vec<String>> {
    let errors = missing_credentials(login, password);
    if !errors.is_empty() {
        return Err(errors);
    }

    let user = users
        .lookup_by_login(login)
        .ok_or_else(|| vec![USER_NOT_FOUND.to_string()])?;

    let matches: bool = user.password.as_bytes().ct_eq(password.as_bytes()).into();
    if !matches {
        return Err(vec![PASSWORD_FAILED.to_string()]);
    }

    Ok(user.clone())
}

/// Rejects a registration whose login is already taken.
pub fn validate_registration(
    users: &UserDirectory,
    new_user: &NewUser,
    mut errors: Vec<String>,
) -> Vec<String> {
    if users.lookup_by_login(&new_user.login).is_some() {
        errors.push(LOGIN_TAKEN.to_string());
    }
    errors
}

/// Stores the new user in the directory.
pub fn register_user(users: &mut UserDirectory, new_user: NewUser) -> User {
    users.add_user(new_user)
}

/// Runs the configured authenticator under a read guard.
pub async fn login(
    config: &AuthConfig,
    users: &RwLock<UserDirectory>,
    login: &str,
    password: &str,
) -> Result<User, Vec<String>> {
    let users = users.read().await;
    (config.authenticate)(&users, login, password)
}

/// Validates and stores a registration.
///
/// The write guard is held from the first check to the insert, so two
/// concurrent registrations of one login cannot both pass validation.
///
/// # Arguments
///
/// * `config` - The auth wiring providing the validator and user factory.
/// * `users` - The shared user directory.
/// * `new_user` - The submitted login and password.
///
/// # Returns
///
/// The created `User`, or every error collected by the checks.
pub async fn register(
    config: &AuthConfig,
    users: &RwLock<UserDirectory>,
    new_user: NewUser,
) -> Result<User, Vec<String>> {
    let mut users = users.write().await;

    let errors = missing_credentials(&new_user.login, &new_user.password);
    let errors = (config.validate_registration)(&users, &new_user, errors);
    if !errors.is_empty() {
        return Err(errors);
    }

    let user = (config.register_user)(&mut users, new_user);
    tracing::info!("✅ User registered: {} ({})", user.login, user.id);
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory_with(login: &str, password: &str) -> RwLock<UserDirectory> {
        let mut users = UserDirectory::new();
        users.add_user(NewUser {
            login: login.to_string(),
            password: password.to_string(),
        });
        RwLock::new(users)
    }

    #[tokio::test]
    async fn empty_credentials_report_both_errors() {
        let config = AuthConfig::new(Duration::ZERO);
        let users = directory_with("finomial", "finomial");

        let errors = login(&config, &users, "", "").await.unwrap_err();
        assert_eq!(errors, vec!["Missing login", "Missing password"]);
    }

    #[tokio::test]
    async fn unknown_login_is_not_found() {
        let config = AuthConfig::new(Duration::ZERO);
        let users = directory_with("finomial", "finomial");

        let errors = login(&config, &users, "nobody", "pw").await.unwrap_err();
        assert_eq!(errors, vec!["User not found"]);
    }

    #[tokio::test]
    async fn wrong_password_fails() {
        let config = AuthConfig::new(Duration::ZERO);
        let users = directory_with("finomial", "finomial");

        let errors = login(&config, &users, "finomial", "finomia").await.unwrap_err();
        assert_eq!(errors, vec!["Password failed"]);
    }

    #[tokio::test]
    async fn correct_credentials_return_user() {
        let config = AuthConfig::new(Duration::ZERO);
        let users = directory_with("finomial", "finomial");

        let user = login(&config, &users, "finomial", "finomial").await.unwrap();
        assert_eq!(user.id, 1);
        assert_eq!(user.login, "finomial");
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected_without_insert() {
        let config = AuthConfig::new(Duration::ZERO);
        let users = directory_with("finomial", "finomial");

        let errors = register(
            &config,
            &users,
            NewUser {
                login: "finomial".to_string(),
                password: "other".to_string(),
            },
        )
        .await
        .unwrap_err();

        assert!(errors.contains(&"Login already taken".to_string()));
        assert_eq!(users.read().await.len(), 1);
    }

    #[tokio::test]
    async fn registration_assigns_next_id() {
        let config = AuthConfig::new(Duration::ZERO);
        let users = directory_with("finomial", "finomial");

        let user = register(
            &config,
            &users,
            NewUser {
                login: "alice".to_string(),
                password: "wonderland".to_string(),
            },
        )
        .await
        .unwrap();

        assert_eq!(user.id, 2);
        assert!(users.read().await.lookup_by_login("alice").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn locals_resolve_after_delay() {
        let started = tokio::time::Instant::now();
        let locals = delayed_login_locals(Duration::from_millis(200)).await;

        assert_eq!(locals.title, "Login");
        assert!(started.elapsed() >= Duration::from_millis(200));
    }
}
