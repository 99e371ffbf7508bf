//! HTTP API server for the storefront.
//!
//! Exposes the category tree, the product catalog, order placement and
//! account endpoints, with structured logging (tracing) and Prometheus
//! metrics.

pub mod config;
pub mod error;
pub mod identity;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use notifications::{LogDispatcher, NotifierHandle};
use store::RecordStore;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use state::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: RecordStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
    config: &Config,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/categories",
            post(routes::categories::create::<S>).get(routes::categories::list::<S>),
        )
        .route(
            "/categories/{id}",
            get(routes::categories::get::<S>).put(routes::categories::update::<S>),
        )
        .route(
            "/categories/{id}/average-price",
            get(routes::categories::average_price::<S>),
        )
        .route(
            "/products",
            post(routes::products::create::<S>).get(routes::products::list::<S>),
        )
        .route(
            "/products/{id}",
            get(routes::products::get::<S>)
                .put(routes::products::update::<S>)
                .delete(routes::products::delete::<S>),
        )
        .route(
            "/orders",
            post(routes::orders::create::<S>).get(routes::orders::list::<S>),
        )
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route(
            "/users/me",
            get(routes::users::me::<S>).put(routes::users::update_me::<S>),
        )
        .route("/password-reset", post(routes::users::request_reset::<S>))
        .route(
            "/password-reset/confirm",
            post(routes::users::confirm_reset::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&config.allowed_origins)),
        )
}

/// Any origin when none are configured, otherwise exactly the listed ones.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring malformed CORS origin");
                None
            }
        })
        .collect();

    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Creates the application state with a logging dispatcher behind the
/// notification workers.
pub fn create_default_state<S: RecordStore + 'static>(
    store: S,
    config: &Config,
) -> (Arc<AppState<S>>, NotifierHandle) {
    let dispatcher = Arc::new(LogDispatcher::new(
        config.admin_email.clone(),
        config.client_url.clone(),
    ));
    AppState::new(store, dispatcher, config.notifier())
}
