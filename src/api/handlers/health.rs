use axum::{
    extract::Extension,
    http::{HeaderMap, HeaderValue},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};
use utoipa::ToSchema;

use crate::{
    GIT_COMMIT_HASH,
    api::{
        error::{ApiError, ErrorBody},
        state::AppState,
    },
};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    commit: String,
    name: String,
    version: String,
    users: usize,
    tasks: usize,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is up; includes build info and record counts", body = Health),
        (status = 500, description = "A store is unusable", body = ErrorBody),
    ),
    tag = "health"
)]
pub async fn health(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let health = Health {
        commit: GIT_COMMIT_HASH.to_string(),
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        users: state.store.list()?.len(),
        tasks: state.tasks.count()?,
    };

    let short_hash = health.commit.get(..7).unwrap_or_default();

    let mut headers = HeaderMap::new();
    match HeaderValue::from_str(&format!("{}:{}:{}", health.name, health.version, short_hash)) {
        Ok(value) => {
            debug!("X-App header: {:?}", value);
            headers.insert("X-App", value);
        }
        Err(err) => error!("Failed to build X-App header: {}", err),
    }

    Ok((headers, Json(health)))
}
