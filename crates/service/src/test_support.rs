#![cfg(test)]
use std::sync::Arc;
use std::time::Duration;

use crate::auth::domain::Credentials;
use crate::auth::hasher::Argon2Hasher;
use crate::auth::repository::UserDirectory;
use crate::auth::token::{TokenCodec, TokenConfig};
use crate::auth::SessionService;

pub fn test_codec() -> TokenCodec {
    TokenCodec::new(TokenConfig {
        access_secret: "test-access-secret".into(),
        refresh_secret: "test-refresh-secret".into(),
        access_ttl: Duration::from_secs(900),
        refresh_ttl: Duration::from_secs(86_400),
    })
    .expect("test codec")
}

/// Cheap argon2 parameters; production keeps the library defaults.
pub fn fast_hasher() -> Argon2Hasher {
    Argon2Hasher::with_params(1024, 1, 1).expect("argon2 params")
}

pub fn session_service(directory: Arc<dyn UserDirectory>) -> SessionService {
    SessionService::new(directory, Arc::new(fast_hasher()), Arc::new(test_codec()))
}

pub fn credentials(email: &str) -> Credentials {
    Credentials::new(email, "a-sufficiently-long-password")
}
