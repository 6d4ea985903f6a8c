use argon2::password_hash::{self, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, PasswordHash, Version};
use async_trait::async_trait;
use rand::rngs::OsRng;

use super::errors::AuthError;

/// One-way salted password hashing.
#[async_trait]
pub trait CredentialHasher: Send + Sync {
    async fn hash(&self, plaintext: &str) -> Result<String, AuthError>;
    /// `Ok(false)` on mismatch; errors only for unreadable hashes or worker failures.
    async fn verify(&self, plaintext: &str, password_hash: &str) -> Result<bool, AuthError>;
}

/// Argon2id hasher producing PHC strings. Work runs on the blocking pool.
#[derive(Debug, Clone, Default)]
pub struct Argon2Hasher {
    params: Params,
}

impl Argon2Hasher {
    /// Custom cost parameters (memory in KiB, iterations, lanes).
    pub fn with_params(m_cost: u32, t_cost: u32, p_cost: u32) -> Result<Self, AuthError> {
        let params = Params::new(m_cost, t_cost, p_cost, None).map_err(|e| AuthError::Hash(e.to_string()))?;
        Ok(Self { params })
    }

    fn argon(params: Params) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
    }
}

#[async_trait]
impl CredentialHasher for Argon2Hasher {
    async fn hash(&self, plaintext: &str) -> Result<String, AuthError> {
        let params = self.params.clone();
        let plaintext = plaintext.to_owned();
        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            Self::argon(params)
                .hash_password(plaintext.as_bytes(), &salt)
                .map(|h| h.to_string())
                .map_err(|e| AuthError::Hash(e.to_string()))
        })
        .await
        .map_err(|e| AuthError::Hash(e.to_string()))?
    }

    async fn verify(&self, plaintext: &str, password_hash: &str) -> Result<bool, AuthError> {
        let params = self.params.clone();
        let plaintext = plaintext.to_owned();
        let password_hash = password_hash.to_owned();
        tokio::task::spawn_blocking(move || {
            let parsed = PasswordHash::new(&password_hash).map_err(|e| AuthError::Hash(e.to_string()))?;
            match Self::argon(params).verify_password(plaintext.as_bytes(), &parsed) {
                Ok(()) => Ok(true),
                Err(password_hash::Error::Password) => Ok(false),
                Err(e) => Err(AuthError::Hash(e.to_string())),
            }
        })
        .await
        .map_err(|e| AuthError::Hash(e.to_string()))?
    }
}
