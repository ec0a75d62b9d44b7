use axum::{
    http::Method,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod approvals;
pub mod availability;
pub mod error;
pub mod state;

pub use state::AppState;

use voya_store::Store;

pub fn app<S: Store>(state: AppState<S>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    Router::new()
        .route("/health", get(health))
        .route("/v1/requests/{id}/approve", post(approvals::approve_request::<S>))
        .route("/v1/requests/approve-batch", post(approvals::approve_batch::<S>))
        .route(
            "/v1/allocations/{id}/release",
            post(approvals::release_allocation::<S>),
        )
        .route(
            "/v1/availability/{provider_type}/{item_id}",
            get(availability::availability::<S>),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
