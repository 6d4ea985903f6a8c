use axum::{
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Serialize;
use service::auth::domain::AuthenticatedIdentity;
use service::auth::Access;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use utoipa::OpenApi;

use common::types::Health;

use crate::guard::{self, GuardContext};
use crate::metrics;
use crate::openapi::ApiDoc;
use crate::state::ServerState;
use crate::throttle::{self, RateLimiter};

pub mod auth;

#[derive(Debug, Serialize)]
pub struct Greeting {
    pub message: String,
}

#[utoipa::path(get, path = "/health", tag = "health", responses((status = 200, description = "Service is up", body = crate::openapi::HealthResponse)))]
pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

#[utoipa::path(get, path = "/welcome", tag = "greeting", responses((status = 200, description = "Public greeting", body = crate::openapi::GreetingDoc)))]
pub async fn welcome() -> Json<Greeting> {
    Json(Greeting { message: "Welcome!".to_string() })
}

#[utoipa::path(get, path = "/goodbye", tag = "greeting", responses((status = 200, description = "Greeting for the authenticated user", body = crate::openapi::GreetingDoc), (status = 401, description = "Unauthenticated")))]
pub async fn goodbye(Extension(identity): Extension<AuthenticatedIdentity>) -> Json<Greeting> {
    Json(Greeting { message: format!("Goodbye, {}!", identity.email) })
}

async fn metrics_handler() -> impl IntoResponse {
    metrics::encode_metrics()
}

async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

/// Build the application router. Every route sits in exactly one access group.
pub fn build_router(state: ServerState, limiter: RateLimiter, cors: CorsLayer) -> Router {
    let guarded = |access: Access| middleware::from_fn_with_state(GuardContext::new(state.clone(), access), guard::enforce);

    let public = Router::new()
        .route("/health", get(health))
        .route("/welcome", get(welcome))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/user", post(auth::user))
        .route("/metrics", get(metrics_handler))
        .route("/api-docs/openapi.json", get(openapi_json))
        .route_layer(guarded(Access::Public));

    let bearer = Router::new()
        .route("/goodbye", get(goodbye))
        .route("/auth/me", get(auth::me))
        .route_layer(guarded(Access::Bearer));

    let refresh = Router::new()
        .route("/auth/refresh", post(auth::refresh))
        .route_layer(guarded(Access::RefreshCookie));

    public
        .merge(bearer)
        .merge(refresh)
        .with_state(state)
        .layer(middleware::from_fn_with_state(limiter, throttle::limit))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO).include_headers(false))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO).include_headers(false))
                .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
        )
}
