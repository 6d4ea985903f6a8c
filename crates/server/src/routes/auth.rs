use axum::extract::{Extension, State};
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};
use service::auth::domain::{AuthenticatedIdentity, Credentials, SessionResult};
use service::auth::errors::{AuthError, UnauthenticatedReason};

use crate::errors::ApiError;
use crate::metrics;
use crate::state::ServerState;

/// Token response body. The refresh token travels only in the cookie.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenOutput {
    pub access_token: Option<String>,
    pub expires_at: i64,
}

impl From<&SessionResult> for TokenOutput {
    fn from(s: &SessionResult) -> Self {
        Self { access_token: s.access_token.clone(), expires_at: s.expires_at }
    }
}

#[derive(Debug, Deserialize)]
pub struct TokenInput {
    pub token: String,
}

#[utoipa::path(post, path = "/auth/register", tag = "auth", request_body = crate::openapi::CredentialsDoc, responses((status = 200, description = "Registered", body = crate::openapi::IdentityDoc), (status = 400, description = "Validation failed"), (status = 409, description = "Registration failed")))]
pub async fn register(State(state): State<ServerState>, WithRejection(Json(input), _): WithRejection<Json<Credentials>, ApiError>) -> Result<Json<AuthenticatedIdentity>, ApiError> {
    input.validate()?;
    match state.sessions.signup(input).await {
        Ok(user) => {
            metrics::record("register", "success");
            Ok(Json(user.identity()))
        }
        Err(e) => {
            metrics::record("register", "failure");
            Err(e.into())
        }
    }
}

#[utoipa::path(post, path = "/auth/login", tag = "auth", request_body = crate::openapi::CredentialsDoc, responses((status = 200, description = "Logged in; refresh cookie set", body = crate::openapi::TokenDoc), (status = 401, description = "Unauthenticated")))]
pub async fn login(State(state): State<ServerState>, jar: CookieJar, WithRejection(Json(input), _): WithRejection<Json<Credentials>, ApiError>) -> Result<(CookieJar, Json<TokenOutput>), ApiError> {
    input.validate()?;
    let Some(user) = state.sessions.validate_credentials(&input).await? else {
        metrics::record("login", "failure");
        return Err(AuthError::Unauthenticated(UnauthenticatedReason::BadCredentials).into());
    };
    let session = state.sessions.login(&user).await?;
    let jar = match session.refresh_token.clone() {
        Some(token) => state.cookies.set_refresh_cookie(jar, token),
        None => jar,
    };
    metrics::record("login", "success");
    Ok((jar, Json(TokenOutput::from(&session))))
}

#[utoipa::path(post, path = "/auth/logout", tag = "auth", responses((status = 200, description = "Refresh cookie cleared", body = crate::openapi::TokenDoc)))]
pub async fn logout(State(state): State<ServerState>, jar: CookieJar) -> (CookieJar, Json<TokenOutput>) {
    let session = state.sessions.logout();
    metrics::record("logout", "success");
    (state.cookies.clear_refresh_cookie(jar), Json(TokenOutput::from(&session)))
}

/// Guarded by the refresh cookie; rotates both tokens.
#[utoipa::path(post, path = "/auth/refresh", tag = "auth", responses((status = 200, description = "Rotated; refresh cookie replaced", body = crate::openapi::TokenDoc), (status = 401, description = "Refresh token rejected")))]
pub async fn refresh(State(state): State<ServerState>, jar: CookieJar) -> Result<(CookieJar, Json<TokenOutput>), ApiError> {
    let token = state
        .cookies
        .read_refresh_cookie(&jar)
        .ok_or(AuthError::Unauthenticated(UnauthenticatedReason::MissingToken))?;
    let session = state.sessions.refresh(&token).await?;
    let Some(new_refresh) = session.refresh_token.clone() else {
        metrics::record("refresh", "failure");
        return Err(AuthError::Unauthenticated(UnauthenticatedReason::TokenInvalid).into());
    };
    metrics::record("refresh", "success");
    Ok((state.cookies.set_refresh_cookie(jar, new_refresh), Json(TokenOutput::from(&session))))
}

/// Who a token belongs to. Tolerates expired access tokens; not an authorization check.
#[utoipa::path(post, path = "/auth/user", tag = "auth", request_body = crate::openapi::TokenInputDoc, responses((status = 200, description = "Token owner", body = crate::openapi::IdentityDoc), (status = 401, description = "Unknown token")))]
pub async fn user(State(state): State<ServerState>, WithRejection(Json(input), _): WithRejection<Json<TokenInput>, ApiError>) -> Result<Json<AuthenticatedIdentity>, ApiError> {
    state
        .sessions
        .resolve_identity_from_token(&input.token)
        .await?
        .map(Json)
        .ok_or_else(|| AuthError::Unauthenticated(UnauthenticatedReason::TokenInvalid).into())
}

#[utoipa::path(get, path = "/auth/me", tag = "auth", responses((status = 200, description = "Authenticated identity", body = crate::openapi::IdentityDoc), (status = 401, description = "Unauthenticated")))]
pub async fn me(Extension(identity): Extension<AuthenticatedIdentity>) -> Json<AuthenticatedIdentity> {
    Json(identity)
}
