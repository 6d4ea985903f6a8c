use sea_orm::DatabaseConnection;
use tracing::warn;
use uuid::Uuid;

use crate::auth::domain::{User, UserStatus};
use crate::auth::errors::DirectoryError;
use crate::auth::repository::UserDirectory;

/// Postgres-backed directory over the `user` table.
pub struct SeaOrmUserDirectory {
    pub db: DatabaseConnection,
}

impl SeaOrmUserDirectory {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn to_domain(m: models::user::Model) -> Result<User, DirectoryError> {
    let status = UserStatus::parse(&m.status).ok_or_else(|| {
        warn!(user_id = %m.id, status = %m.status, "unknown user status in directory");
        DirectoryError::Backend(format!("unknown status {}", m.status))
    })?;
    Ok(User { id: m.id, email: m.email, password_hash: m.password_hash, status })
}

#[async_trait::async_trait]
impl UserDirectory for SeaOrmUserDirectory {
    async fn create_user(&self, email: &str, password_hash: &str) -> Result<User, DirectoryError> {
        let created = models::user::create(&self.db, email, password_hash).await?;
        to_domain(created)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DirectoryError> {
        models::user::find_by_email(&self.db, email).await?.map(to_domain).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DirectoryError> {
        models::user::find_by_id(&self.db, id).await?.map(to_domain).transpose()
    }

    async fn update_status(&self, id: Uuid, status: UserStatus) -> Result<User, DirectoryError> {
        let updated = models::user::set_status(&self.db, id, status.as_str())
            .await?
            .ok_or(DirectoryError::NotFound)?;
        to_domain(updated)
    }
}
