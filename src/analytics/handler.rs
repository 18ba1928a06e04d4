use crate::analytics::service::AnalyticsService;
use crate::error::AppResult;
use crate::types::AnalyticsResponse;
use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

/// GET /v1/resources/:id/analytics
pub async fn get_analytics(
    State(service): State<Arc<AnalyticsService>>,
    Path(resource_id): Path<i64>,
) -> AppResult<Json<AnalyticsResponse>> {
    Ok(Json(service.get_analytics(resource_id).await?))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub time: String,
    pub cache_ok: bool,
}

/// GET /health - Liveness plus a bounded cache backend probe.
pub async fn health(State(service): State<Arc<AnalyticsService>>) -> Json<HealthResponse> {
    let cache_ok = service.cache_healthy().await;
    Json(HealthResponse {
        status: if cache_ok {
            "ok".into()
        } else {
            "degraded".into()
        },
        time: service.clock().now().to_rfc3339(),
        cache_ok,
    })
}
