use serde::Serialize;
use utoipa::OpenApi;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(ToSchema)]
pub struct HealthResponse { pub status: String }

#[derive(ToSchema)]
pub struct GreetingDoc { pub message: String }

#[derive(ToSchema)]
pub struct CredentialsDoc { pub email: String, pub password: String }

#[derive(ToSchema)]
pub struct TokenInputDoc { pub token: String }

#[derive(ToSchema)]
pub struct IdentityDoc { pub id: Uuid, pub email: String }

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenDoc {
    pub access_token: Option<String>,
    /// Access token expiry, milliseconds since the Unix epoch.
    pub expires_at: i64,
}

#[derive(ToSchema)]
pub struct ErrorDoc {
    pub error: String,
    pub field: Option<String>,
    pub message: Option<String>,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health,
        crate::routes::welcome,
        crate::routes::goodbye,
        crate::routes::auth::register,
        crate::routes::auth::login,
        crate::routes::auth::logout,
        crate::routes::auth::refresh,
        crate::routes::auth::user,
        crate::routes::auth::me,
    ),
    components(
        schemas(
            HealthResponse,
            GreetingDoc,
            CredentialsDoc,
            TokenInputDoc,
            IdentityDoc,
            TokenDoc,
            ErrorDoc,
        )
    ),
    tags(
        (name = "health"),
        (name = "greeting"),
        (name = "auth")
    )
)]
pub struct ApiDoc;
