use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::domain::{AuthenticatedIdentity, Credentials, SessionResult, User, UserStatus};
use super::errors::{AuthError, DirectoryError};
use super::hasher::CredentialHasher;
use super::repository::UserDirectory;
use super::token::{TokenCodec, TokenKind};

/// Signup, login, logout, refresh and token-to-identity resolution, independent of web framework.
///
/// Stateless between calls: the only shared state is what the directory owns.
pub struct SessionService {
    directory: Arc<dyn UserDirectory>,
    hasher: Arc<dyn CredentialHasher>,
    codec: Arc<TokenCodec>,
    /// Hash checked against when the email is unknown, so both misses cost one verification.
    decoy_hash: OnceCell<String>,
}

const DECOY_PASSWORD: &str = "decoy-password-never-assigned";

impl SessionService {
    pub fn new(directory: Arc<dyn UserDirectory>, hasher: Arc<dyn CredentialHasher>, codec: Arc<TokenCodec>) -> Self {
        Self { directory, hasher, codec, decoy_hash: OnceCell::new() }
    }

    pub fn codec(&self) -> &Arc<TokenCodec> {
        &self.codec
    }

    pub fn directory(&self) -> &Arc<dyn UserDirectory> {
        &self.directory
    }

    /// Register a new user with a hashed password.
    ///
    /// Every directory failure, duplicates included, becomes `RegistrationFailed`.
    ///
    /// # Examples
    /// ```
    /// use std::{sync::Arc, time::Duration};
    /// use service::auth::{SessionService, TokenCodec, TokenConfig};
    /// use service::auth::domain::Credentials;
    /// use service::auth::hasher::Argon2Hasher;
    /// use service::auth::repository::memory::MemoryUserDirectory;
    ///
    /// let codec = TokenCodec::new(TokenConfig {
    ///     access_secret: "access".into(),
    ///     refresh_secret: "refresh".into(),
    ///     access_ttl: Duration::from_secs(900),
    ///     refresh_ttl: Duration::from_secs(86_400),
    /// }).unwrap();
    /// let svc = SessionService::new(
    ///     Arc::new(MemoryUserDirectory::new()),
    ///     Arc::new(Argon2Hasher::with_params(1024, 1, 1).unwrap()),
    ///     Arc::new(codec),
    /// );
    /// let user = tokio_test::block_on(svc.signup(Credentials::new("user@example.com", "a-long-enough-password"))).unwrap();
    /// assert_eq!(user.email, "user@example.com");
    /// ```
    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    pub async fn signup(&self, credentials: Credentials) -> Result<User, AuthError> {
        let hash = self.hasher.hash(&credentials.password).await?;
        match self.directory.create_user(credentials.email.trim(), &hash).await {
            Ok(user) => {
                info!(user_id = %user.id, "user_registered");
                Ok(user)
            }
            Err(DirectoryError::Duplicate) => {
                debug!("registration rejected: email already registered");
                Err(AuthError::RegistrationFailed)
            }
            Err(e) => {
                warn!(error = %e, "registration rejected by directory");
                Err(AuthError::RegistrationFailed)
            }
        }
    }

    /// Look up the user by email and compare the password. Unknown email and wrong password
    /// are both `Ok(None)`.
    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    pub async fn validate_credentials(&self, credentials: &Credentials) -> Result<Option<User>, AuthError> {
        let Some(user) = self.directory.find_by_email(credentials.email.trim()).await? else {
            debug!("no user for email");
            let decoy = self.decoy_hash.get_or_try_init(|| self.hasher.hash(DECOY_PASSWORD)).await?;
            self.hasher.verify(&credentials.password, decoy).await?;
            return Ok(None);
        };
        if !self.hasher.verify(&credentials.password, &user.password_hash).await? {
            debug!(user_id = %user.id, "password mismatch");
            return Ok(None);
        }
        Ok(Some(user))
    }

    /// Activate the user if needed and issue a fresh token pair.
    ///
    /// # Examples
    /// ```
    /// use std::{sync::Arc, time::Duration};
    /// use service::auth::{SessionService, TokenCodec, TokenConfig};
    /// use service::auth::domain::{Credentials, UserStatus};
    /// use service::auth::hasher::Argon2Hasher;
    /// use service::auth::repository::memory::MemoryUserDirectory;
    ///
    /// let codec = TokenCodec::new(TokenConfig {
    ///     access_secret: "access".into(),
    ///     refresh_secret: "refresh".into(),
    ///     access_ttl: Duration::from_secs(900),
    ///     refresh_ttl: Duration::from_secs(86_400),
    /// }).unwrap();
    /// let svc = SessionService::new(
    ///     Arc::new(MemoryUserDirectory::new()),
    ///     Arc::new(Argon2Hasher::with_params(1024, 1, 1).unwrap()),
    ///     Arc::new(codec),
    /// );
    /// let creds = Credentials::new("u@example.com", "another-long-password");
    /// let user = tokio_test::block_on(svc.signup(creds.clone())).unwrap();
    /// assert_eq!(user.status, UserStatus::Inactive);
    /// let session = tokio_test::block_on(svc.login(&user)).unwrap();
    /// assert!(session.access_token.is_some());
    /// assert!(session.refresh_token.is_some());
    /// ```
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn login(&self, user: &User) -> Result<SessionResult, AuthError> {
        if user.status != UserStatus::Active {
            self.directory.update_status(user.id, UserStatus::Active).await?;
            info!("user_activated");
        }
        let session = self.issue_pair(user.id)?;
        info!("login_succeeded");
        Ok(session)
    }

    /// Stateless: nothing is revoked server-side, the transport clears the refresh cookie.
    pub fn logout(&self) -> SessionResult {
        debug!("logout");
        SessionResult::empty()
    }

    /// Exchange a refresh token for a brand-new pair. A token that fails verification
    /// yields an empty session, not an error.
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh(&self, refresh_token: &str) -> Result<SessionResult, AuthError> {
        let claims = match self.codec.verify(TokenKind::Refresh, refresh_token) {
            Ok(claims) => claims,
            Err(e) => {
                info!(reason = %e, "refresh_rejected");
                return Ok(SessionResult::empty());
            }
        };
        let session = self.issue_pair(claims.user_id)?;
        info!(user_id = %claims.user_id, "refresh_rotated");
        Ok(session)
    }

    /// Best-effort "who is this token for". Expired access tokens are accepted, forged or
    /// malformed ones and tokens of deleted users resolve to `None`.
    /// Not an authorization check: use the request guard for that.
    #[instrument(skip(self, token))]
    pub async fn resolve_identity_from_token(&self, token: &str) -> Result<Option<AuthenticatedIdentity>, AuthError> {
        let claims = match self.codec.decode(token) {
            Ok(claims) => claims,
            Err(e) => {
                debug!(reason = %e, "token not decodable");
                return Ok(None);
            }
        };
        Ok(self.find_user_by_id(claims.user_id).await?.map(|u| u.identity()))
    }

    pub async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, AuthError> {
        Ok(self.directory.find_by_id(user_id).await?)
    }

    fn issue_pair(&self, user_id: Uuid) -> Result<SessionResult, AuthError> {
        let access = self.codec.issue(TokenKind::Access, user_id)?;
        let refresh = self.codec.issue(TokenKind::Refresh, user_id)?;
        Ok(SessionResult {
            access_token: Some(access.token),
            refresh_token: Some(refresh.token),
            expires_at: (access.expires_at as i64).saturating_mul(1000),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::auth::repository::memory::MemoryUserDirectory;
    use crate::auth::token::{now_secs, TokenClaims};
    use crate::test_support::{credentials, session_service, test_codec};

    /// Counts status transitions on top of the in-memory directory.
    #[derive(Default)]
    struct CountingDirectory {
        inner: MemoryUserDirectory,
        status_updates: AtomicUsize,
    }

    #[async_trait]
    impl UserDirectory for CountingDirectory {
        async fn create_user(&self, email: &str, password_hash: &str) -> Result<User, DirectoryError> {
            self.inner.create_user(email, password_hash).await
        }
        async fn find_by_email(&self, email: &str) -> Result<Option<User>, DirectoryError> {
            self.inner.find_by_email(email).await
        }
        async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DirectoryError> {
            self.inner.find_by_id(id).await
        }
        async fn update_status(&self, id: Uuid, status: UserStatus) -> Result<User, DirectoryError> {
            self.status_updates.fetch_add(1, Ordering::SeqCst);
            self.inner.update_status(id, status).await
        }
    }

    struct UnavailableDirectory;

    #[async_trait]
    impl UserDirectory for UnavailableDirectory {
        async fn create_user(&self, _: &str, _: &str) -> Result<User, DirectoryError> {
            Err(DirectoryError::Backend("connection refused".into()))
        }
        async fn find_by_email(&self, _: &str) -> Result<Option<User>, DirectoryError> {
            Err(DirectoryError::Backend("connection refused".into()))
        }
        async fn find_by_id(&self, _: Uuid) -> Result<Option<User>, DirectoryError> {
            Err(DirectoryError::Backend("connection refused".into()))
        }
        async fn update_status(&self, _: Uuid, _: UserStatus) -> Result<User, DirectoryError> {
            Err(DirectoryError::Backend("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn signup_then_validate_returns_same_user() {
        let svc = session_service(Arc::new(MemoryUserDirectory::new()));
        let creds = credentials("a@example.com");
        let user = svc.signup(creds.clone()).await.unwrap();
        let validated = svc.validate_credentials(&creds).await.unwrap().expect("valid credentials");
        assert_eq!(validated.id, user.id);
        assert_ne!(validated.password_hash, creds.password);
    }

    #[tokio::test]
    async fn duplicate_signup_fails_without_second_record() {
        let dir = Arc::new(MemoryUserDirectory::new());
        let svc = session_service(dir.clone());
        svc.signup(credentials("dup@example.com")).await.unwrap();
        let again = svc.signup(credentials("dup@example.com")).await;
        assert!(matches!(again, Err(AuthError::RegistrationFailed)));
        assert_eq!(dir.len().await, 1);
    }

    #[tokio::test]
    async fn directory_outage_on_signup_is_registration_failed() {
        let svc = session_service(Arc::new(UnavailableDirectory));
        let res = svc.signup(credentials("x@example.com")).await;
        assert!(matches!(res, Err(AuthError::RegistrationFailed)));
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_are_none() {
        let svc = session_service(Arc::new(MemoryUserDirectory::new()));
        svc.signup(credentials("b@example.com")).await.unwrap();

        let wrong = Credentials::new("b@example.com", "definitely-not-the-password");
        assert!(svc.validate_credentials(&wrong).await.unwrap().is_none());
        assert!(svc.validate_credentials(&credentials("nobody@example.com")).await.unwrap().is_none());
    }

    /// Counts hasher calls on top of the fast test hasher.
    #[derive(Default)]
    struct CountingHasher {
        inner: crate::auth::hasher::Argon2Hasher,
        hashes: AtomicUsize,
        verifies: AtomicUsize,
    }

    #[async_trait]
    impl CredentialHasher for CountingHasher {
        async fn hash(&self, plaintext: &str) -> Result<String, AuthError> {
            self.hashes.fetch_add(1, Ordering::SeqCst);
            self.inner.hash(plaintext).await
        }
        async fn verify(&self, plaintext: &str, password_hash: &str) -> Result<bool, AuthError> {
            self.verifies.fetch_add(1, Ordering::SeqCst);
            self.inner.verify(plaintext, password_hash).await
        }
    }

    #[tokio::test]
    async fn unknown_email_still_pays_for_a_verification() {
        let hasher = Arc::new(CountingHasher { inner: crate::test_support::fast_hasher(), ..Default::default() });
        let svc = SessionService::new(Arc::new(MemoryUserDirectory::new()), hasher.clone(), Arc::new(test_codec()));

        assert!(svc.validate_credentials(&credentials("ghost@example.com")).await.unwrap().is_none());
        assert_eq!(hasher.verifies.load(Ordering::SeqCst), 1);

        // the decoy hash is computed once and reused
        let hashes = hasher.hashes.load(Ordering::SeqCst);
        assert!(svc.validate_credentials(&credentials("ghost2@example.com")).await.unwrap().is_none());
        assert_eq!(hasher.hashes.load(Ordering::SeqCst), hashes);
        assert_eq!(hasher.verifies.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn directory_outage_on_lookup_is_a_hard_error() {
        let svc = session_service(Arc::new(UnavailableDirectory));
        let res = svc.validate_credentials(&credentials("x@example.com")).await;
        assert!(matches!(res, Err(AuthError::Directory(_))));
    }

    #[tokio::test]
    async fn login_activates_exactly_once() {
        let dir = Arc::new(CountingDirectory::default());
        let svc = session_service(dir.clone());
        let creds = credentials("c@example.com");
        let user = svc.signup(creds.clone()).await.unwrap();
        assert_eq!(user.status, UserStatus::Inactive);

        svc.login(&user).await.unwrap();
        let after_first = svc.find_user_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(after_first.status, UserStatus::Active);

        svc.login(&after_first).await.unwrap();
        let after_second = svc.find_user_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(after_second.status, UserStatus::Active);
        assert_eq!(dir.status_updates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn login_issues_verifiable_pair() {
        let svc = session_service(Arc::new(MemoryUserDirectory::new()));
        let user = svc.signup(credentials("d@example.com")).await.unwrap();
        let session = svc.login(&user).await.unwrap();

        let access = session.access_token.as_deref().unwrap();
        let refresh = session.refresh_token.as_deref().unwrap();
        let codec = svc.codec();
        assert_eq!(codec.verify(TokenKind::Access, access).unwrap().user_id, user.id);
        assert_eq!(codec.verify(TokenKind::Refresh, refresh).unwrap().user_id, user.id);
        assert!(codec.verify(TokenKind::Refresh, access).is_err());
        assert!(codec.verify(TokenKind::Access, refresh).is_err());
        assert!(session.expires_at > (now_secs() as i64) * 1000);
    }

    #[tokio::test]
    async fn refresh_rotates_tokens() {
        let svc = session_service(Arc::new(MemoryUserDirectory::new()));
        let user = svc.signup(credentials("e@example.com")).await.unwrap();
        let first = svc.login(&user).await.unwrap();

        let second = svc.refresh(first.refresh_token.as_deref().unwrap()).await.unwrap();
        assert!(second.is_authenticated());
        assert_ne!(second.access_token, first.access_token);
        assert_ne!(second.refresh_token, first.refresh_token);

        let third = svc.refresh(second.refresh_token.as_deref().unwrap()).await.unwrap();
        assert_ne!(third.access_token, first.access_token);
        assert_ne!(third.access_token, second.access_token);
    }

    #[tokio::test]
    async fn refresh_with_bad_tokens_is_empty() {
        let svc = session_service(Arc::new(MemoryUserDirectory::new()));
        let user = svc.signup(credentials("f@example.com")).await.unwrap();
        let session = svc.login(&user).await.unwrap();

        // access token presented as refresh token
        assert_eq!(svc.refresh(session.access_token.as_deref().unwrap()).await.unwrap(), SessionResult::empty());
        assert_eq!(svc.refresh("garbage").await.unwrap(), SessionResult::empty());

        let now = now_secs();
        let expired = TokenClaims { user_id: user.id, iat: now - 100, exp: now - 50, jti: Uuid::new_v4() };
        let stale = svc.codec().sign(TokenKind::Refresh, &expired).unwrap();
        assert_eq!(svc.refresh(&stale).await.unwrap(), SessionResult::empty());

        let other = test_codec_with_other_secrets();
        let forged = other.issue(TokenKind::Refresh, user.id).unwrap();
        assert_eq!(svc.refresh(&forged.token).await.unwrap(), SessionResult::empty());
    }

    fn test_codec_with_other_secrets() -> TokenCodec {
        TokenCodec::new(crate::auth::token::TokenConfig {
            access_secret: "attacker-access".into(),
            refresh_secret: "attacker-refresh".into(),
            access_ttl: std::time::Duration::from_secs(60),
            refresh_ttl: std::time::Duration::from_secs(60),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn logout_returns_empty_session() {
        let svc = session_service(Arc::new(MemoryUserDirectory::new()));
        let out = svc.logout();
        assert_eq!(out.access_token, None);
        assert_eq!(out.expires_at, 0);
    }

    #[tokio::test]
    async fn resolve_identity_tolerates_expiry_only() {
        let dir = Arc::new(MemoryUserDirectory::new());
        let svc = session_service(dir.clone());
        let user = svc.signup(credentials("g@example.com")).await.unwrap();

        let now = now_secs();
        let stale = TokenClaims { user_id: user.id, iat: now - 7200, exp: now - 3600, jti: Uuid::new_v4() };
        let token = svc.codec().sign(TokenKind::Access, &stale).unwrap();
        let identity = svc.resolve_identity_from_token(&token).await.unwrap().unwrap();
        assert_eq!(identity, AuthenticatedIdentity { id: user.id, email: "g@example.com".into() });

        let forged = test_codec_with_other_secrets().issue(TokenKind::Access, user.id).unwrap();
        assert!(svc.resolve_identity_from_token(&forged.token).await.unwrap().is_none());
        assert!(svc.resolve_identity_from_token("nope").await.unwrap().is_none());

        dir.remove(user.id).await;
        assert!(svc.resolve_identity_from_token(&token).await.unwrap().is_none());
    }

    #[test]
    fn shared_codec_is_exposed() {
        let svc = session_service(Arc::new(MemoryUserDirectory::new()));
        assert_eq!(svc.codec().ttl(TokenKind::Refresh), test_codec().ttl(TokenKind::Refresh));
    }
}
