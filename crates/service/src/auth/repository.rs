use async_trait::async_trait;
use uuid::Uuid;

use super::domain::{User, UserStatus};
use super::errors::DirectoryError;

/// User directory: owns identity records, unique emails and status transitions.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Persist a new `INACTIVE` user. Duplicate emails yield `DirectoryError::Duplicate`.
    async fn create_user(&self, email: &str, password_hash: &str) -> Result<User, DirectoryError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DirectoryError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DirectoryError>;
    async fn update_status(&self, id: Uuid, status: UserStatus) -> Result<User, DirectoryError>;
}

/// In-memory directory for tests and database-less local runs.
pub mod memory {
    use std::collections::HashMap;

    use tokio::sync::RwLock;

    use super::*;

    #[derive(Default)]
    struct Inner {
        by_id: HashMap<Uuid, User>,
        by_email: HashMap<String, Uuid>,
    }

    #[derive(Default)]
    pub struct MemoryUserDirectory {
        inner: RwLock<Inner>,
    }

    impl MemoryUserDirectory {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn len(&self) -> usize {
            self.inner.read().await.by_id.len()
        }

        pub async fn is_empty(&self) -> bool {
            self.len().await == 0
        }

        /// Drop a user record; returns whether it existed.
        pub async fn remove(&self, id: Uuid) -> bool {
            let mut inner = self.inner.write().await;
            match inner.by_id.remove(&id) {
                Some(user) => {
                    inner.by_email.remove(&user.email);
                    true
                }
                None => false,
            }
        }
    }

    #[async_trait]
    impl UserDirectory for MemoryUserDirectory {
        async fn create_user(&self, email: &str, password_hash: &str) -> Result<User, DirectoryError> {
            let email = email.trim().to_string();
            let mut inner = self.inner.write().await;
            if inner.by_email.contains_key(&email) {
                return Err(DirectoryError::Duplicate);
            }
            let user = User {
                id: Uuid::new_v4(),
                email: email.clone(),
                password_hash: password_hash.to_string(),
                status: UserStatus::Inactive,
            };
            inner.by_email.insert(email, user.id);
            inner.by_id.insert(user.id, user.clone());
            Ok(user)
        }

        async fn find_by_email(&self, email: &str) -> Result<Option<User>, DirectoryError> {
            let inner = self.inner.read().await;
            Ok(inner.by_email.get(email).and_then(|id| inner.by_id.get(id)).cloned())
        }

        async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DirectoryError> {
            Ok(self.inner.read().await.by_id.get(&id).cloned())
        }

        async fn update_status(&self, id: Uuid, status: UserStatus) -> Result<User, DirectoryError> {
            let mut inner = self.inner.write().await;
            let user = inner.by_id.get_mut(&id).ok_or(DirectoryError::NotFound)?;
            user.status = status;
            Ok(user.clone())
        }
    }

}
