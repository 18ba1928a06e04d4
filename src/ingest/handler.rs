use crate::analytics::service::AnalyticsService;
use crate::error::AppResult;
use crate::ingest::identity::ClientIdentity;
use axum::extract::{Path, State};
use axum::Json;
use std::sync::Arc;

/// POST /v1/resources/:id/views - Record one view from the calling client.
pub async fn record_view(
    State(service): State<Arc<AnalyticsService>>,
    Path(resource_id): Path<i64>,
    ClientIdentity(identity): ClientIdentity,
) -> AppResult<Json<serde_json::Value>> {
    service.record_view(resource_id, &identity).await?;
    Ok(Json(serde_json::json!({ "status": "recorded" })))
}
