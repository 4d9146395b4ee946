//! Entity query endpoints.

use axum::{extract::State, http::HeaderMap, routing::post, Json, Router};

use entigate_core::RequestContext;
use entigate_proto::{EntitiesRequest, EntitiesResponse};

use crate::error::AppError;
use crate::json::CountResponse;
use crate::AppState;

/// Header carrying the caller's tenant.
pub const TENANT_ID_HEADER: &str = "x-tenant-id";

/// Entity routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/entities", post(handle_entities))
        .route("/entities/count", post(handle_count))
}

/// Request context from the tenant header. Other `x-` headers are passed
/// through to the backends.
pub(crate) fn request_context(headers: &HeaderMap) -> Result<RequestContext, AppError> {
    let tenant_id = headers
        .get(TENANT_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::BadRequest(format!("missing {} header", TENANT_ID_HEADER)))?;

    let mut ctx = RequestContext::new(tenant_id);
    for (name, value) in headers {
        if name.as_str().starts_with("x-") && name.as_str() != TENANT_ID_HEADER {
            if let Ok(value) = value.to_str() {
                ctx = ctx.with_header(name.as_str(), value);
            }
        }
    }
    Ok(ctx)
}

async fn handle_entities(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<EntitiesRequest>,
) -> Result<Json<EntitiesResponse>, AppError> {
    let ctx = request_context(&headers)?;
    let response = state.executor.execute(&ctx, request).await?;
    Ok(Json(response))
}

async fn handle_count(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<EntitiesRequest>,
) -> Result<Json<CountResponse>, AppError> {
    let ctx = request_context(&headers)?;
    let total = state.executor.count(&ctx, request).await?;
    Ok(Json(CountResponse { total }))
}
