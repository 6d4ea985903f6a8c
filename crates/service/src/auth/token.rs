//! Signed, expiring tokens for the two session token classes.
//!
//! Access and refresh tokens are HS256 JWTs signed with separate secrets, so a token of one
//! class never verifies as the other.

use std::fmt;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::TokenError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Access => f.write_str("access"),
            TokenKind::Refresh => f.write_str("refresh"),
        }
    }
}

/// Secrets and lifetimes injected at construction.
#[derive(Clone)]
pub struct TokenConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

/// Claims carried by both token classes. `jti` keeps tokens issued in the same second distinct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenClaims {
    pub user_id: Uuid,
    pub iat: u64,
    pub exp: u64,
    pub jti: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    /// Seconds since the Unix epoch.
    pub expires_at: u64,
}

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl Keys {
    fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }
}

/// Upper bound on token lifetimes (100 years), so expiries stay representable in
/// milliseconds as `i64`.
pub const MAX_TTL_SECS: u64 = 100 * 365 * 24 * 3600;

pub struct TokenCodec {
    access: Keys,
    refresh: Keys,
}

impl TokenCodec {
    pub fn new(cfg: TokenConfig) -> Result<Self, TokenError> {
        if cfg.access_secret.is_empty() || cfg.refresh_secret.is_empty() {
            return Err(TokenError::Misconfigured("secrets must not be empty".into()));
        }
        if cfg.access_secret == cfg.refresh_secret {
            return Err(TokenError::Misconfigured("access and refresh secrets must differ".into()));
        }
        if cfg.access_ttl.is_zero() || cfg.refresh_ttl.is_zero() {
            return Err(TokenError::Misconfigured("token lifetimes must be positive".into()));
        }
        for ttl in [cfg.access_ttl, cfg.refresh_ttl] {
            if ttl.as_secs() > MAX_TTL_SECS {
                return Err(TokenError::Misconfigured(format!(
                    "token lifetime of {}s exceeds the maximum of {MAX_TTL_SECS}s",
                    ttl.as_secs()
                )));
            }
        }
        Ok(Self {
            access: Keys::new(&cfg.access_secret, cfg.access_ttl),
            refresh: Keys::new(&cfg.refresh_secret, cfg.refresh_ttl),
        })
    }

    fn keys(&self, kind: TokenKind) -> &Keys {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    pub fn ttl(&self, kind: TokenKind) -> Duration {
        self.keys(kind).ttl
    }

    /// Fresh claims for `user_id` issued at `now` (seconds since epoch).
    pub fn claims_for(&self, kind: TokenKind, user_id: Uuid, now: u64) -> TokenClaims {
        TokenClaims { user_id, iat: now, exp: now.saturating_add(self.ttl(kind).as_secs()), jti: Uuid::new_v4() }
    }

    /// Sign `claims` with the secret of `kind`. Identical claims yield identical tokens.
    pub fn sign(&self, kind: TokenKind, claims: &TokenClaims) -> Result<String, TokenError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.keys(kind).encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    pub fn issue(&self, kind: TokenKind, user_id: Uuid) -> Result<IssuedToken, TokenError> {
        let claims = self.claims_for(kind, user_id, now_secs());
        let token = self.sign(kind, &claims)?;
        Ok(IssuedToken { token, expires_at: claims.exp })
    }

    /// Check signature and expiry against the secret of `kind`.
    pub fn verify(&self, kind: TokenKind, token: &str) -> Result<TokenClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp"]);
        jsonwebtoken::decode::<TokenClaims>(token, &self.keys(kind).decoding, &validation)
            .map(|data| data.claims)
            .map_err(map_jwt_error)
    }

    /// Read the claims of an access token without enforcing expiry. The signature is still
    /// checked: a stale token is tolerated, a forged one is not.
    pub fn decode(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_required_spec_claims::<&str>(&[]);
        jsonwebtoken::decode::<TokenClaims>(token, &self.access.decoding, &validation)
            .map(|data| data.claims)
            .map_err(map_jwt_error)
    }
}

fn map_jwt_error(e: jsonwebtoken::errors::Error) -> TokenError {
    match e.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidSignature => TokenError::InvalidToken,
        ErrorKind::InvalidToken
        | ErrorKind::Base64(_)
        | ErrorKind::Json(_)
        | ErrorKind::Utf8(_)
        | ErrorKind::MissingRequiredClaim(_) => TokenError::Malformed,
        _ => TokenError::InvalidToken,
    }
}

pub fn now_secs() -> u64 {
    Utc::now().timestamp().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> TokenCodec {
        TokenCodec::new(TokenConfig {
            access_secret: "access-secret".into(),
            refresh_secret: "refresh-secret".into(),
            access_ttl: Duration::from_secs(900),
            refresh_ttl: Duration::from_secs(86_400),
        })
        .expect("codec")
    }

    #[test]
    fn issued_tokens_verify_only_with_their_own_kind() {
        let codec = codec();
        let user = Uuid::new_v4();
        let access = codec.issue(TokenKind::Access, user).unwrap();
        let refresh = codec.issue(TokenKind::Refresh, user).unwrap();

        assert_eq!(codec.verify(TokenKind::Access, &access.token).unwrap().user_id, user);
        assert_eq!(codec.verify(TokenKind::Refresh, &refresh.token).unwrap().user_id, user);
        assert_eq!(codec.verify(TokenKind::Refresh, &access.token), Err(TokenError::InvalidToken));
        assert_eq!(codec.verify(TokenKind::Access, &refresh.token), Err(TokenError::InvalidToken));
    }

    #[test]
    fn lifetimes_follow_kind() {
        let codec = codec();
        let user = Uuid::new_v4();
        let access = codec.claims_for(TokenKind::Access, user, 1_000);
        let refresh = codec.claims_for(TokenKind::Refresh, user, 1_000);
        assert_eq!(access.exp, 1_900);
        assert_eq!(refresh.exp, 87_400);
    }

    #[test]
    fn signing_is_deterministic_for_identical_claims() {
        let codec = codec();
        let claims = codec.claims_for(TokenKind::Access, Uuid::new_v4(), now_secs());
        assert_eq!(codec.sign(TokenKind::Access, &claims).unwrap(), codec.sign(TokenKind::Access, &claims).unwrap());
    }

    #[test]
    fn tokens_issued_back_to_back_differ() {
        let codec = codec();
        let user = Uuid::new_v4();
        let a = codec.issue(TokenKind::Access, user).unwrap();
        let b = codec.issue(TokenKind::Access, user).unwrap();
        assert_ne!(a.token, b.token);
    }

    #[test]
    fn expired_token_is_rejected_as_expired() {
        let codec = codec();
        let now = now_secs();
        let claims = TokenClaims { user_id: Uuid::new_v4(), iat: now - 100, exp: now - 10, jti: Uuid::new_v4() };
        let token = codec.sign(TokenKind::Refresh, &claims).unwrap();
        assert_eq!(codec.verify(TokenKind::Refresh, &token), Err(TokenError::Expired));
    }

    #[test]
    fn garbage_is_malformed() {
        let codec = codec();
        assert_eq!(codec.verify(TokenKind::Access, "not-a-jwt"), Err(TokenError::Malformed));
        assert_eq!(codec.decode("a.b.c"), Err(TokenError::Malformed));
    }

    #[test]
    fn decode_tolerates_expiry_but_not_forgery() {
        let codec = codec();
        let now = now_secs();
        let user = Uuid::new_v4();
        let stale = TokenClaims { user_id: user, iat: now - 7200, exp: now - 3600, jti: Uuid::new_v4() };
        let token = codec.sign(TokenKind::Access, &stale).unwrap();
        assert_eq!(codec.decode(&token).unwrap(), stale);

        let forged = codec.sign(TokenKind::Refresh, &stale).unwrap();
        assert_eq!(codec.decode(&forged), Err(TokenError::InvalidToken));
    }

    #[test]
    fn rejects_shared_or_empty_secrets() {
        let base = TokenConfig {
            access_secret: "same".into(),
            refresh_secret: "same".into(),
            access_ttl: Duration::from_secs(60),
            refresh_ttl: Duration::from_secs(60),
        };
        assert!(matches!(TokenCodec::new(base.clone()), Err(TokenError::Misconfigured(_))));
        let empty = TokenConfig { access_secret: String::new(), ..base };
        assert!(matches!(TokenCodec::new(empty), Err(TokenError::Misconfigured(_))));
    }

    #[test]
    fn rejects_unrepresentable_lifetimes() {
        let huge = TokenConfig {
            access_secret: "access".into(),
            refresh_secret: "refresh".into(),
            access_ttl: Duration::from_secs(u64::MAX),
            refresh_ttl: Duration::from_secs(60),
        };
        assert!(matches!(TokenCodec::new(huge.clone()), Err(TokenError::Misconfigured(_))));
        let huge_refresh = TokenConfig { access_ttl: Duration::from_secs(60), refresh_ttl: Duration::from_secs(MAX_TTL_SECS + 1), ..huge };
        assert!(matches!(TokenCodec::new(huge_refresh), Err(TokenError::Misconfigured(_))));

        let longest = TokenCodec::new(TokenConfig {
            access_secret: "access".into(),
            refresh_secret: "refresh".into(),
            access_ttl: Duration::from_secs(MAX_TTL_SECS),
            refresh_ttl: Duration::from_secs(MAX_TTL_SECS),
        })
        .unwrap();
        let issued = longest.issue(TokenKind::Access, Uuid::new_v4()).unwrap();
        assert!(i64::try_from(issued.expires_at).unwrap().checked_mul(1000).is_some());
        assert!(longest.verify(TokenKind::Access, &issued.token).is_ok());
    }

    #[test]
    fn claims_use_user_id_field_name() {
        let claims = codec().claims_for(TokenKind::Access, Uuid::nil(), 0);
        let json = serde_json::to_value(&claims).unwrap();
        assert!(json.get("userId").is_some());
    }
}
