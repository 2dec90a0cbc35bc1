//! HTTP routes for Signal Relay.
//!
//! Defines the Axum router and application state.

use crate::config::Config;
use crate::handlers;
use crate::observability::{health_router, HealthState};
use crate::signaling::Hub;

use axum::http::{header, Method};
use axum::{routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

/// Preflight cache lifetime advertised to browsers.
const CORS_MAX_AGE: Duration = Duration::from_secs(86_400);

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Room registry.
    pub hub: Arc<Hub>,

    /// Service configuration.
    pub config: Config,

    /// Liveness/readiness flags.
    pub health: Arc<HealthState>,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/ws` - WebSocket upgrade into a signaling session
/// - `/api/health` - Liveness probe (plain `OK`)
/// - `/ready` - Readiness probe
/// - `/api/rooms` - Active room ids
/// - `/metrics` - Prometheus metrics, when a handle is supplied
/// - `/` - `index.html` from `config.static_dir`
/// - `/static/*` - Assets from `config.static_dir`
/// - CORS mirroring the request origin, with credentials
/// - TraceLayer for request logging
pub fn build_routes(state: Arc<AppState>, metrics_handle: Option<PrometheusHandle>) -> Router {
    let api_routes = Router::new()
        .route("/ws", get(handlers::ws_handler))
        .route("/api/rooms", get(handlers::list_rooms))
        .with_state(Arc::clone(&state));

    let mut app = api_routes.merge(health_router(Arc::clone(&state.health)));

    if let Some(handle) = metrics_handle {
        let metrics_routes = Router::new()
            .route("/metrics", get(handlers::metrics_handler))
            .with_state(handle);
        app = app.merge(metrics_routes);
    }

    let static_dir = Path::new(&state.config.static_dir);
    app.route_service("/", ServeFile::new(static_dir.join("index.html")))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
}

/// Permissive CORS for browser clients served from any origin.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(CORS_MAX_AGE)
}
