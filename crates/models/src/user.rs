use chrono::Utc;
use sea_orm::{entity::prelude::*, DatabaseConnection, Set};
use uuid::Uuid;

use crate::errors::ModelError;

pub const STATUS_ACTIVE: &str = "ACTIVE";
pub const STATUS_INACTIVE: &str = "INACTIVE";

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub email: String,
    pub password_hash: String,
    pub status: String,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Insert a new, not yet activated user. Duplicate emails surface as `ModelError::Duplicate`.
pub async fn create(db: &DatabaseConnection, email: &str, password_hash: &str) -> Result<Model, ModelError> {
    if email.trim().is_empty() { return Err(ModelError::Validation("email required".into())); }
    if password_hash.trim().is_empty() { return Err(ModelError::Validation("password hash required".into())); }
    let now = Utc::now().into();
    let am = ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email.trim().to_string()),
        password_hash: Set(password_hash.to_string()),
        status: Set(STATUS_INACTIVE.into()),
        created_at: Set(now),
        updated_at: Set(now),
    };
    Ok(am.insert(db).await?)
}

pub async fn find_by_email(db: &DatabaseConnection, email: &str) -> Result<Option<Model>, ModelError> {
    Ok(Entity::find().filter(Column::Email.eq(email)).one(db).await?)
}

pub async fn find_by_id(db: &DatabaseConnection, id: Uuid) -> Result<Option<Model>, ModelError> {
    Ok(Entity::find_by_id(id).one(db).await?)
}

/// Change the status of user `id`. `Ok(None)` when no such user exists.
pub async fn set_status(db: &DatabaseConnection, id: Uuid, status: &str) -> Result<Option<Model>, ModelError> {
    if status != STATUS_ACTIVE && status != STATUS_INACTIVE {
        return Err(ModelError::Validation(format!("unknown status {status}")));
    }
    let Some(found) = Entity::find_by_id(id).one(db).await? else {
        return Ok(None);
    };
    let mut am: ActiveModel = found.into();
    am.status = Set(status.to_string());
    am.updated_at = Set(Utc::now().into());
    Ok(Some(am.update(db).await?))
}
