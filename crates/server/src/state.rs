use std::sync::Arc;

use service::auth::hasher::CredentialHasher;
use service::auth::repository::UserDirectory;
use service::auth::{RequestGuard, SessionService, TokenCodec};

use crate::cookies::CookieSettings;

/// Shared handler state. Everything inside is immutable or internally synchronised.
#[derive(Clone)]
pub struct ServerState {
    pub sessions: Arc<SessionService>,
    pub guard: RequestGuard,
    pub cookies: Arc<CookieSettings>,
}

impl ServerState {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        hasher: Arc<dyn CredentialHasher>,
        codec: Arc<TokenCodec>,
        cookies: CookieSettings,
    ) -> Self {
        let guard = RequestGuard::new(Arc::clone(&codec), Arc::clone(&directory));
        let sessions = Arc::new(SessionService::new(directory, hasher, codec));
        Self { sessions, guard, cookies: Arc::new(cookies) }
    }
}
