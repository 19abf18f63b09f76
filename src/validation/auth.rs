/// Error shown when the login field is empty.
pub const MISSING_LOGIN: &str = "Missing login";
/// Error shown when the password field is empty.
pub const MISSING_PASSWORD: &str = "Missing password";
/// Error shown when no user has the submitted login.
pub const USER_NOT_FOUND: &str = "User not found";
/// Error shown when the password does not match.
pub const PASSWORD_FAILED: &str = "Password failed";
/// Error shown when registering a login that already exists.
pub const LOGIN_TAKEN: &str = "Login already taken";

/// Checks that both credentials are present.
///
/// Every missing field is reported, login first, so the form can show all of
/// them at once.
pub fn missing_credentials(login: &str, password: &str) -> Vec<String> {
    let mut errors = Vec::new();

    if login.is_empty() {
        errors.push(MISSING_LOGIN.to_string());
    }

    if password.is_empty() {
        errors.push(MISSING_PASSWORD.to_string());
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_both_missing_fields_in_order() {
        assert_eq!(
            missing_credentials("", ""),
            vec!["Missing login".to_string(), "Missing password".to_string()]
        );
    }

    #[test]
    fn reports_single_missing_field() {
        assert_eq!(missing_credentials("alice", ""), vec![MISSING_PASSWORD.to_string()]);
        assert_eq!(missing_credentials("", "pw"), vec![MISSING_LOGIN.to_string()]);
        assert!(missing_credentials("alice", "pw").is_empty());
    }
}
