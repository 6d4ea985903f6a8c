use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use service::auth::errors::AuthError;
use thiserror::Error;
use tracing::{debug, error, warn};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("too many requests")]
    Throttled,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Auth(AuthError::ValidationFailed { .. }) => StatusCode::BAD_REQUEST,
            ApiError::Auth(AuthError::RegistrationFailed) => StatusCode::CONFLICT,
            ApiError::Auth(AuthError::Unauthenticated(_)) => StatusCode::UNAUTHORIZED,
            ApiError::Auth(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Throttled => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

const BODY_FIELDS: [&str; 3] = ["email", "password", "token"];

/// Field named by a JSON extraction failure, `body` when none can be identified.
fn rejected_field(detail: &str) -> &'static str {
    BODY_FIELDS
        .into_iter()
        .find(|f| detail.contains(&format!("`{f}`")) || detail.contains(&format!("target type: {f}:")))
        .unwrap_or("body")
}

/// Unreadable request bodies (wrong content type, bad JSON, missing or mistyped fields)
/// are validation failures like any other bad input.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let detail = rejection.body_text();
        debug!(status = %rejection.status(), %detail, "request body rejected");
        ApiError::Auth(AuthError::validation(rejected_field(&detail), detail))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Auth(AuthError::ValidationFailed { field, message }) => {
                serde_json::json!({"error": "VALIDATION", "field": field, "message": message})
            }
            ApiError::Auth(e @ AuthError::Unauthenticated(reason)) => {
                warn!(%reason, code = e.code(), "request unauthenticated");
                serde_json::json!({"error": e.public_code()})
            }
            ApiError::Auth(e) => {
                if status.is_server_error() {
                    error!(error = %e, code = e.code(), "auth failure");
                }
                serde_json::json!({"error": e.public_code()})
            }
            ApiError::Throttled => serde_json::json!({"error": "THROTTLED"}),
        };
        (status, Json(body)).into_response()
    }
}
