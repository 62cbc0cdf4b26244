//! HTTP application wiring.
//!
//! # Purpose
//! Builds the axum router, attaches the authentication middleware to the
//! search surface, and defines the shared application state injected into
//! handlers.
use crate::api;
use crate::api::openapi::ApiDoc;
use crate::config::Config;
use crate::federated::FederationCoordinator;
use crate::observability;
use crate::rbac;
use crate::store::Database;
use axum::Router;
use axum::routing::{get, post};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_opentelemetry::OpenTelemetrySpanExt;
use utoipa::OpenApi;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Arc<dyn Database>,
    pub cache: Arc<rbac::Cache>,
    pub federation: Option<Arc<FederationCoordinator>>,
}

pub fn build_router(state: AppState) -> Router {
    let trace_layer =
        TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
            let parent = observability::trace_context_from_headers(request.headers());
            let span = tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version()
            );
            span.set_parent(parent);
            span
        });

    // Everything except the health probe requires an authenticated caller.
    let protected = Router::new()
        .route("/searchapi/search", post(api::search::search))
        .route("/searchapi/count", post(api::search::count))
        .route("/searchapi/federated", post(api::search::federated))
        .route(
            "/searchapi/disabled-clusters",
            get(api::search::disabled_clusters),
        )
        .route("/searchapi/schema", get(api::schema::schema))
        .route("/searchapi/complete", post(api::complete::complete))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            rbac::middleware::authenticate,
        ));

    Router::new()
        .route("/searchapi/health", get(api::search::health))
        .merge(protected)
        .merge(
            utoipa_swagger_ui::SwaggerUi::new("/docs").url("/v1/openapi.json", ApiDoc::openapi()),
        )
        .layer(trace_layer)
        .with_state(state)
}
