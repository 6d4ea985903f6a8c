use std::fmt;

use thiserror::Error;

/// Why a request was refused authentication. Logged server-side; clients only see the
/// coarse `public_code` so that "no such user" and "wrong password" look identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnauthenticatedReason {
    BadCredentials,
    MissingToken,
    TokenInvalid,
    UnknownUser,
    InactiveUser,
}

impl fmt::Display for UnauthenticatedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnauthenticatedReason::BadCredentials => "bad credentials",
            UnauthenticatedReason::MissingToken => "missing token",
            UnauthenticatedReason::TokenInvalid => "invalid token",
            UnauthenticatedReason::UnknownUser => "unknown user",
            UnauthenticatedReason::InactiveUser => "inactive user",
        };
        f.write_str(s)
    }
}

/// Business errors for auth workflows
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("validation failed on {field}: {message}")]
    ValidationFailed { field: &'static str, message: String },
    #[error("registration failed")]
    RegistrationFailed,
    #[error("unauthenticated: {0}")]
    Unauthenticated(UnauthenticatedReason),
    #[error("hashing error: {0}")]
    Hash(String),
    #[error("token error: {0}")]
    Token(#[from] TokenError),
    #[error("directory error: {0}")]
    Directory(#[from] DirectoryError),
}

impl AuthError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        AuthError::ValidationFailed { field, message: message.into() }
    }

    /// Stable numeric code for external mapping/logging
    pub fn code(&self) -> u16 {
        match self {
            AuthError::ValidationFailed { .. } => 1001,
            AuthError::RegistrationFailed => 1002,
            AuthError::Unauthenticated(_) => 1004,
            AuthError::Hash(_) => 1101,
            AuthError::Token(_) => 1102,
            AuthError::Directory(_) => 1200,
        }
    }

    /// Client-facing error code.
    pub fn public_code(&self) -> &'static str {
        match self {
            AuthError::ValidationFailed { .. } => "VALIDATION",
            AuthError::RegistrationFailed => "AUTH_REGISTRATION",
            AuthError::Unauthenticated(UnauthenticatedReason::BadCredentials) => "AUTH_CREDENTIALS",
            AuthError::Unauthenticated(_) => "AUTH_TOKEN",
            AuthError::Hash(_) | AuthError::Token(_) | AuthError::Directory(_) => "SERVER_ERROR",
        }
    }
}

/// Token codec failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("invalid token signature")]
    InvalidToken,
    #[error("token expired")]
    Expired,
    #[error("malformed token")]
    Malformed,
    #[error("token codec misconfigured: {0}")]
    Misconfigured(String),
    #[error("token signing failed: {0}")]
    Signing(String),
}

/// User directory failures. Absence is `Ok(None)`, never an error.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("email already registered")]
    Duplicate,
    #[error("user not found")]
    NotFound,
    #[error("directory backend error: {0}")]
    Backend(String),
}

impl From<models::errors::ModelError> for DirectoryError {
    fn from(e: models::errors::ModelError) -> Self {
        use models::errors::ModelError;
        match e {
            ModelError::Duplicate(_) => DirectoryError::Duplicate,
            ModelError::Validation(msg) | ModelError::Db(msg) => DirectoryError::Backend(msg),
        }
    }
}
