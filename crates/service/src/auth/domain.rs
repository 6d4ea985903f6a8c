use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::AuthError;

pub const EMAIL_MIN_LEN: usize = 5;
pub const PASSWORD_MIN_LEN: usize = 16;
pub const PASSWORD_MAX_LEN: usize = 64;

/// Login/registration input. Never persisted; the password is dropped after hashing or comparison.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self { email: email.into(), password: password.into() }
    }

    /// Field-level input checks run by the transport before the session service is reached.
    pub fn validate(&self) -> Result<(), AuthError> {
        let email = self.email.trim();
        if email.chars().count() < EMAIL_MIN_LEN {
            return Err(AuthError::validation("email", format!("must be at least {EMAIL_MIN_LEN} characters")));
        }
        if !is_email_shaped(email) {
            return Err(AuthError::validation("email", "must be an email address"));
        }
        let len = self.password.chars().count();
        if !(PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&len) {
            return Err(AuthError::validation(
                "password",
                format!("must be between {PASSWORD_MIN_LEN} and {PASSWORD_MAX_LEN} characters"),
            ));
        }
        Ok(())
    }
}

/// `local@domain.tld` with no whitespace, exactly one `@` and a dotted domain.
pub fn is_email_shaped(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else { return false };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|l| !l.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserStatus {
    Active,
    Inactive,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "ACTIVE",
            UserStatus::Inactive => "INACTIVE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ACTIVE" => Some(UserStatus::Active),
            "INACTIVE" => Some(UserStatus::Inactive),
            _ => None,
        }
    }
}

/// Directory user record. Deliberately not `Serialize`: the hash must not leave the service.
#[derive(Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub status: UserStatus,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    pub fn identity(&self) -> AuthenticatedIdentity {
        AuthenticatedIdentity { id: self.id, email: self.email.clone() }
    }
}

/// Public projection of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedIdentity {
    pub id: Uuid,
    pub email: String,
}

/// Token pair handed out by login and refresh. Replaced wholesale, never mutated.
/// `expires_at` is the access token expiry in milliseconds since the Unix epoch, `0` when empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionResult {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: i64,
}

impl SessionResult {
    pub fn empty() -> Self {
        Self { access_token: None, refresh_token: None, expires_at: 0 }
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn password(n: usize) -> String {
        "x".repeat(n)
    }

    #[test]
    fn accepts_well_formed_credentials() {
        assert!(Credentials::new("a@example.com", password(16)).validate().is_ok());
        assert!(Credentials::new("a@example.com", password(64)).validate().is_ok());
    }

    #[test]
    fn password_length_bounds() {
        let short = Credentials::new("a@example.com", password(15)).validate();
        let long = Credentials::new("a@example.com", password(65)).validate();
        for res in [short, long] {
            match res {
                Err(AuthError::ValidationFailed { field, .. }) => assert_eq!(field, "password"),
                other => panic!("expected password validation error, got {other:?}"),
            }
        }
    }

    #[test]
    fn email_shape() {
        for bad in ["a@b", "ab.cd", "a b@example.com", "a@@example.com", "@example.com", "a@example.", "a@.com"] {
            assert!(!is_email_shaped(bad), "{bad} should be rejected");
        }
        assert!(is_email_shaped("first.last@mail.example.org"));
        match Credentials::new("a@b", password(20)).validate() {
            Err(AuthError::ValidationFailed { field, .. }) => assert_eq!(field, "email"),
            other => panic!("expected email validation error, got {other:?}"),
        }
    }

    #[test]
    fn debug_output_hides_secrets() {
        let creds = Credentials::new("a@example.com", "super-secret-password");
        assert!(!format!("{creds:?}").contains("super-secret"));

        let user = User { id: Uuid::new_v4(), email: "a@example.com".into(), password_hash: "$argon2id$hash".into(), status: UserStatus::Inactive };
        assert!(!format!("{user:?}").contains("argon2id"));
    }

    #[test]
    fn status_round_trips_through_strings() {
        for s in [UserStatus::Active, UserStatus::Inactive] {
            assert_eq!(UserStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(UserStatus::parse("active"), None);
    }

    #[test]
    fn empty_session_shape() {
        let s = SessionResult::empty();
        assert!(!s.is_authenticated());
        assert_eq!(s.expires_at, 0);
        assert!(s.refresh_token.is_none());
    }
}
