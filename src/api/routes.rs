use crate::api::{handlers, AppState};
use crate::metrics::MetricsMiddleware;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

/// Build the main API router
pub fn build_router(state: AppState) -> Router {
    let metrics_enabled = state.metrics_enabled;

    let mut router = Router::new()
        // Liveness
        .route("/", get(handlers::index).fallback(handlers::method_not_allowed))
        .route(
            "/health",
            get(handlers::health_check).fallback(handlers::method_not_allowed),
        )
        // Prediction; message length is never capped
        .route(
            "/predict",
            post(handlers::predict)
                .fallback(handlers::method_not_allowed)
                .layer(DefaultBodyLimit::disable()),
        );

    if metrics_enabled {
        router = router.route(
            "/metrics",
            get(handlers::metrics).fallback(handlers::method_not_allowed),
        );
    }

    router = router.fallback(handlers::not_found);

    if metrics_enabled {
        router = router.layer(MetricsMiddleware::layer());
    }

    router
        // Add state
        .with_state(state)
        // Add middleware
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CorsLayer::permissive())
}
