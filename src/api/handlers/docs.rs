use axum::Json;

#[utoipa::path(
    get,
    path = "/openapi.json",
    responses(
        (status = 200, description = "OpenAPI document for this service"),
    ),
    tag = "health"
)]
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(crate::api::openapi())
}
