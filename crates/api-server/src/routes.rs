//! API routes definition.

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::{self, SharedState};

/// Create the API router with shared state.
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Graph read path
        .route("/lexical/graph", get(handlers::lexical_graph))
        // Explicit augmentation
        .route("/lexical/augment/{id}", post(handlers::lexical_augment))
        .with_state(state)
}

/// Create router with CORS and logging middleware.
pub fn create_router_with_middleware(state: SharedState) -> Router {
    use tower_http::cors::{Any, CorsLayer};
    use tower_http::trace::TraceLayer;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
