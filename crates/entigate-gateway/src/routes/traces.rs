//! Trace listing endpoint.

use axum::{extract::State, http::HeaderMap, routing::post, Json, Router};

use entigate_proto::{TracesRequest, TracesResponse};

use super::entities::request_context;
use crate::error::AppError;
use crate::AppState;

/// Trace routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/traces", post(handle_traces))
}

async fn handle_traces(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<TracesRequest>,
) -> Result<Json<TracesResponse>, AppError> {
    let ctx = request_context(&headers)?;
    let response = state.traces.get_traces(&ctx, &request).await?;
    Ok(Json(response))
}
