//! Per-request admission decision.
//!
//! The transport resolves which `Access` an operation requires and which token it presented,
//! then asks the guard. Public operations are admitted without identity; everything else
//! needs a token that verifies for the expected kind and belongs to an existing, active user.

use std::sync::Arc;

use tracing::{debug, instrument};

use super::domain::{AuthenticatedIdentity, User};
use super::errors::{AuthError, UnauthenticatedReason};
use super::repository::UserDirectory;
use super::token::{TokenCodec, TokenKind};

/// Capability flag attached to each operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// No verification at all.
    Public,
    /// Access token from the `Authorization: Bearer` header.
    Bearer,
    /// Refresh token from the refresh cookie.
    RefreshCookie,
}

impl Access {
    pub fn token_kind(&self) -> Option<TokenKind> {
        match self {
            Access::Public => None,
            Access::Bearer => Some(TokenKind::Access),
            Access::RefreshCookie => Some(TokenKind::Refresh),
        }
    }
}

#[derive(Debug, Clone)]
pub enum GuardDecision {
    Public,
    Authorized(User),
}

impl GuardDecision {
    pub fn identity(&self) -> Option<AuthenticatedIdentity> {
        match self {
            GuardDecision::Public => None,
            GuardDecision::Authorized(user) => Some(user.identity()),
        }
    }
}

/// Token from an `Authorization` header value. Scheme match is case-insensitive.
pub fn extract_bearer(header: Option<&str>) -> Option<&str> {
    let value = header?.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[derive(Clone)]
pub struct RequestGuard {
    codec: Arc<TokenCodec>,
    directory: Arc<dyn UserDirectory>,
}

impl RequestGuard {
    pub fn new(codec: Arc<TokenCodec>, directory: Arc<dyn UserDirectory>) -> Self {
        Self { codec, directory }
    }

    /// Admit or reject. Rejections are `AuthError::Unauthenticated`; directory faults
    /// propagate as `AuthError::Directory`.
    #[instrument(skip(self, token), fields(has_token = token.is_some()))]
    pub async fn authorize(&self, access: Access, token: Option<&str>) -> Result<GuardDecision, AuthError> {
        let Some(kind) = access.token_kind() else {
            return Ok(GuardDecision::Public);
        };
        let token = token
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::Unauthenticated(UnauthenticatedReason::MissingToken))?;
        let claims = self.codec.verify(kind, token).map_err(|e| {
            debug!(%kind, reason = %e, "token rejected");
            AuthError::Unauthenticated(UnauthenticatedReason::TokenInvalid)
        })?;
        let user = self
            .directory
            .find_by_id(claims.user_id)
            .await?
            .ok_or(AuthError::Unauthenticated(UnauthenticatedReason::UnknownUser))?;
        if !user.is_active() {
            debug!(user_id = %user.id, "token belongs to inactive user");
            return Err(AuthError::Unauthenticated(UnauthenticatedReason::InactiveUser));
        }
        Ok(GuardDecision::Authorized(user))
    }
}
