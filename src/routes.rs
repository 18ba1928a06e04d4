use crate::analytics;
use crate::analytics::AnalyticsService;
use crate::ingest;
use crate::registry::{self, InMemoryRegistry};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Assemble the HTTP adapter over the analytics core.
///
/// Serve with `into_make_service_with_connect_info::<SocketAddr>()` so the
/// peer address is available as a client identity fallback.
pub fn build_router(service: Arc<AnalyticsService>, registry: Arc<InMemoryRegistry>) -> Router {
    // ── Resource registry (collaborator) ──
    let registry_routes = Router::new()
        .route("/v1/resources", post(registry::create_resource))
        .route("/v1/resources/{id}", get(registry::get_resource))
        .with_state(registry);

    // ── Write path ──
    let ingest_routes = Router::new()
        .route(
            "/v1/resources/{id}/views",
            post(ingest::handler::record_view),
        )
        .with_state(service.clone());

    // ── Read path + health ──
    let analytics_routes = Router::new()
        .route(
            "/v1/resources/{id}/analytics",
            get(analytics::handler::get_analytics),
        )
        .route("/health", get(analytics::handler::health))
        .with_state(service);

    Router::new()
        .merge(registry_routes)
        .merge(ingest_routes)
        .merge(analytics_routes)
        .layer(TraceLayer::new_for_http())
}
