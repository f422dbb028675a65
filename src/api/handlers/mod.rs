//! API handlers and shared helpers.
//!
//! Handlers run behind [`enforce_route_policy`](super::guard::enforce_route_policy):
//! protected ones can take `Extension<Identity>` and rely on it being present.

pub mod auth;
pub mod docs;
pub mod health;
pub mod root;
pub mod tasks;
pub mod users;

use regex::Regex;

use super::{error::ApiError, state::AppState};
use crate::identity::{AuthError, Capability, Identity};

pub const MIN_PASSWORD_CHARS: usize = 8;

pub(crate) fn valid_username(username: &str) -> bool {
    Regex::new(r"^[A-Za-z0-9_.-]{3,32}$").is_ok_and(|regex| regex.is_match(username))
}

/// Basic email format check on already-normalized input.
pub(crate) fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email))
}

pub(crate) fn valid_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_CHARS
}

/// Run Argon2 work on the blocking pool.
pub(crate) async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await?
}

/// True when the caller is an admin right now, according to the store.
pub(crate) fn is_current_admin(state: &AppState, identity: &Identity) -> Result<bool, ApiError> {
    match state.guard.check(identity, Capability::Admin) {
        Ok(()) => Ok(true),
        Err(AuthError::Forbidden) => Ok(false),
        Err(err) => Err(err.into()),
    }
}

/// Error for a resource that does not exist.
///
/// Only admins learn that it is missing; everyone else gets the same answer as
/// for a resource they do not own.
pub(crate) fn missing_resource(state: &AppState, identity: &Identity) -> ApiError {
    match is_current_admin(state, identity) {
        Ok(true) => AuthError::NotFound.into(),
        Ok(false) => AuthError::Forbidden.into(),
        Err(err) => err,
    }
}
