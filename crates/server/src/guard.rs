//! Request guard middleware: resolves the token source for the route's `Access` flag,
//! delegates the decision to `service::auth::RequestGuard`, and attaches the identity.

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use service::auth::guard::extract_bearer;
use service::auth::{Access, GuardDecision};

use crate::errors::ApiError;
use crate::metrics;
use crate::state::ServerState;

#[derive(Clone)]
pub struct GuardContext {
    pub state: ServerState,
    pub access: Access,
}

impl GuardContext {
    pub fn new(state: ServerState, access: Access) -> Self {
        Self { state, access }
    }
}

fn presented_token(ctx: &GuardContext, req: &Request) -> Option<String> {
    match ctx.access {
        Access::Public => None,
        Access::Bearer => {
            let header = req.headers().get(AUTHORIZATION).and_then(|v| v.to_str().ok());
            extract_bearer(header).map(str::to_owned)
        }
        Access::RefreshCookie => ctx.state.cookies.read_from_headers(req.headers()),
    }
}

/// On success the `User` and its `AuthenticatedIdentity` are available as request extensions.
pub async fn enforce(State(ctx): State<GuardContext>, mut req: Request, next: Next) -> Result<Response, ApiError> {
    let token = presented_token(&ctx, &req);
    match ctx.state.guard.authorize(ctx.access, token.as_deref()).await {
        Ok(GuardDecision::Authorized(user)) => {
            req.extensions_mut().insert(user.identity());
            req.extensions_mut().insert(user);
        }
        Ok(GuardDecision::Public) => {}
        Err(e) => {
            metrics::record("guard", "rejected");
            tracing::info!(path = %req.uri().path(), access = ?ctx.access, reason = %e, "request rejected by guard");
            return Err(e.into());
        }
    }
    Ok(next.run(req).await)
}
