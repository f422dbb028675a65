//! Route policy enforcement for every matched request.

use axum::{
    extract::{Extension, MatchedPath, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::error;

use super::{error::ApiError, state::AppState};
use crate::identity::{Access, AuthError};

/// Look up the matched route in the policy table and run the guard.
///
/// Protected routes get the admitted [`Identity`](crate::identity::Identity)
/// as a request extension. A route without a table entry is refused.
pub async fn enforce_route_policy(
    Extension(state): Extension<Arc<AppState>>,
    matched: Option<MatchedPath>,
    mut request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = matched.as_ref().map_or("", MatchedPath::as_str);

    match state.routes.lookup(&method, path) {
        Some(Access::Public) => next.run(request).await,
        Some(Access::Protected(capability)) => {
            match state.guard.authorize(request.headers(), capability) {
                Ok(identity) => {
                    request.extensions_mut().insert(identity);
                    next.run(request).await
                }
                Err(err) => ApiError::from(err).into_response(),
            }
        }
        None => {
            error!(%method, path, "route has no access policy, refusing");
            ApiError::from(AuthError::Forbidden).into_response()
        }
    }
}
