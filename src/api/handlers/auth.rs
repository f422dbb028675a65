//! Login and self-registration.
//!
//! Flow Overview:
//! 1) Parse the JSON body; an unreadable login body is treated as bad credentials.
//! 2) Hand the Argon2 work to the blocking pool.
//! 3) Return the issued token or a profile, never the stored hash.

use axum::{Json, extract::Extension, http::StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;

use super::{blocking, valid_email, valid_password, valid_username};
use crate::{
    api::{
        error::{ApiError, ErrorBody},
        state::AppState,
    },
    identity::{AuthError, IssuedToken, NewUser, Role, UserProfile},
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    #[schema(value_type = String, format = Password)]
    pub password: SecretString,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    #[schema(value_type = String, format = Password)]
    pub password: SecretString,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegisterResponse {
    pub user: UserProfile,
}

#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Credentials accepted; bearer token issued", body = IssuedToken),
        (status = 401, description = "Invalid credentials", body = ErrorBody),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn login(
    Extension(state): Extension<Arc<AppState>>,
    payload: Option<Json<LoginRequest>>,
) -> Result<Json<IssuedToken>, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(AuthError::InvalidCredentials.into());
    };

    let authenticator = state.authenticator.clone();
    let issued = blocking(move || {
        Ok(authenticator.login(&request.username, request.password.expose_secret())?)
    })
    .await?;

    Ok(Json(issued))
}

#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created with the user role", body = RegisterResponse),
        (status = 400, description = "Invalid username, email or password", body = ErrorBody),
        (status = 409, description = "Username already exists", body = ErrorBody),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn register(
    Extension(state): Extension<Arc<AppState>>,
    payload: Option<Json<RegisterRequest>>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::validation("Missing payload"));
    };

    let username = request.username.trim().to_string();
    let email = request.email.trim().to_lowercase();
    if !valid_username(&username) {
        return Err(ApiError::validation(
            "Username must be 3-32 characters of letters, digits, '.', '_' or '-'",
        ));
    }
    if !valid_email(&email) {
        return Err(ApiError::validation("Invalid email"));
    }
    if !valid_password(request.password.expose_secret()) {
        return Err(ApiError::validation(format!(
            "Password must be at least {} characters",
            super::MIN_PASSWORD_CHARS
        )));
    }

    let store = state.store.clone();
    let user = blocking(move || {
        Ok(store.create_user(NewUser {
            username,
            email,
            password: request.password,
            role: Role::User,
        })?)
    })
    .await?;

    info!(user_id = user.id, "user registered");
    Ok((StatusCode::CREATED, Json(RegisterResponse { user })))
}
