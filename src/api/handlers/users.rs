//! User profiles, password changes and role management.

use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;

use super::{MIN_PASSWORD_CHARS, blocking, valid_password};
use crate::{
    api::{
        error::{ApiError, ErrorBody},
        state::AppState,
    },
    identity::{AuthError, Capability, Identity, Role, UnauthenticatedReason, UserProfile},
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct PasswordChangeRequest {
    /// Required when changing your own password.
    #[schema(value_type = Option<String>, format = Password)]
    pub current_password: Option<SecretString>,
    #[schema(value_type = String, format = Password)]
    pub new_password: SecretString,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RoleChangeRequest {
    pub role: Role,
}

#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Profile of the caller", body = UserProfile),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn me(
    Extension(state): Extension<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<UserProfile>, ApiError> {
    let user = state
        .store
        .find_by_id(identity.user_id)?
        .ok_or(AuthError::Unauthenticated(UnauthenticatedReason::UnknownSubject))?;
    Ok(Json(user.profile()))
}

#[utoipa::path(
    get,
    path = "/api/users",
    responses(
        (status = 200, description = "All users", body = [UserProfile]),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Caller is not an admin", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn list_users(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Vec<UserProfile>>, ApiError> {
    Ok(Json(state.store.list()?))
}

#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "User profile", body = UserProfile),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Not the caller's own profile", body = ErrorBody),
        (status = 404, description = "No such user (admins only)", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn get_user(
    Extension(state): Extension<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> Result<Json<UserProfile>, ApiError> {
    // Ownership needs no lookup, so a non-admin never learns whether `id` exists.
    state.guard.check(&identity, Capability::OwnerOrAdmin(id))?;
    let user = state.store.find_by_id(id)?.ok_or(AuthError::NotFound)?;
    Ok(Json(user.profile()))
}

#[utoipa::path(
    put,
    path = "/api/users/{id}/password",
    params(("id" = i64, Path, description = "User id")),
    request_body = PasswordChangeRequest,
    responses(
        (status = 204, description = "Password replaced"),
        (status = 400, description = "New password too short", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Not permitted, or current password wrong", body = ErrorBody),
        (status = 404, description = "No such user (admins only)", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
#[instrument(skip_all)]
pub async fn change_password(
    Extension(state): Extension<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
    payload: Option<Json<PasswordChangeRequest>>,
) -> Result<StatusCode, ApiError> {
    state.guard.check(&identity, Capability::OwnerOrAdmin(id))?;
    let Some(Json(request)) = payload else {
        return Err(ApiError::validation("Missing payload"));
    };
    if !valid_password(request.new_password.expose_secret()) {
        return Err(ApiError::validation(format!(
            "Password must be at least {MIN_PASSWORD_CHARS} characters"
        )));
    }

    let user = state.store.find_by_id(id)?.ok_or(AuthError::NotFound)?;
    let own_account = identity.user_id == id;
    let store = state.store.clone();
    blocking(move || {
        if own_account {
            let current = request.current_password.ok_or_else(|| {
                ApiError::validation("Current password is required")
            })?;
            if !store.verify_password(&user, current.expose_secret()) {
                return Err(AuthError::Forbidden.into());
            }
        }
        Ok(store.update_password(user.id(), request.new_password.expose_secret())?)
    })
    .await?;

    info!(user_id = id, "password changed");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    put,
    path = "/api/users/{id}/role",
    params(("id" = i64, Path, description = "User id")),
    request_body = RoleChangeRequest,
    responses(
        (status = 200, description = "Role updated; takes effect for admin checks immediately", body = UserProfile),
        (status = 400, description = "Invalid role, or an admin demoting themselves", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Caller is not an admin", body = ErrorBody),
        (status = 404, description = "No such user", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
#[instrument(skip_all)]
pub async fn set_role(
    Extension(state): Extension<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
    payload: Option<Json<RoleChangeRequest>>,
) -> Result<Json<UserProfile>, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::validation("Expected {\"role\": \"admin\" | \"user\"}"));
    };
    if id == identity.user_id && !request.role.is_admin() {
        return Err(ApiError::validation("Admins cannot demote themselves"));
    }

    let profile = state.store.update_role(id, request.role)?;
    info!(user_id = id, role = %profile.role, "role changed");
    Ok(Json(profile))
}
