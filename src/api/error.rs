use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinError;
use tracing::{debug, error};
use utoipa::ToSchema;

use crate::identity::{AuthError, StoreError};

/// JSON error body. Always one coarse message.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("conflict: {0}")]
    Conflict(String),
}

impl ApiError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Auth(AuthError::InvalidCredentials | AuthError::Unauthenticated(_)) => {
                StatusCode::UNAUTHORIZED
            }
            Self::Auth(AuthError::Forbidden) => StatusCode::FORBIDDEN,
            Self::Auth(AuthError::NotFound) => StatusCode::NOT_FOUND,
            Self::Auth(AuthError::Internal(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::Auth(AuthError::InvalidCredentials) => "Invalid credentials".to_string(),
            Self::Auth(AuthError::Unauthenticated(_)) => "Authentication required".to_string(),
            Self::Auth(AuthError::Forbidden) => "Forbidden".to_string(),
            Self::Auth(AuthError::NotFound) => "Not found".to_string(),
            Self::Auth(AuthError::Internal(_)) => "Internal server error".to_string(),
            Self::Validation(message) | Self::Conflict(message) => message.clone(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict => Self::Conflict("Username already exists".to_string()),
            other => Self::Auth(other.into()),
        }
    }
}

impl From<JoinError> for ApiError {
    fn from(err: JoinError) -> Self {
        Self::Auth(AuthError::Internal(anyhow::Error::new(err)))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let Self::Auth(AuthError::Internal(source)) = &self {
            error!("request failed: {source:#}");
        } else {
            debug!(status = status.as_u16(), "request failed: {self}");
        }
        let body = ErrorBody {
            error: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}
