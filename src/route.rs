//! Route definitions for the service registry API
//!
//! This module configures all HTTP routes and maps them to their respective
//! handlers and authorization layers.

use axum::middleware;
use axum::routing::get;
use axum::Router;

use crate::handler::{
    admin_list_services, create_service, delete_service, get_service, health, list_services, me,
    service_config, subdomain_availability, update_service,
};
use crate::middleware::{admin_middleware, auth_middleware};
use crate::state::AppState;

/// Creates and configures the Axum application router with all routes
///
/// # Route Definitions
///
/// - `GET /health` - Liveness probe (public)
/// - `GET /api/services` - Lists the caller's services
/// - `POST /api/services` - Registers a service
/// - `GET|PUT|DELETE /api/services/{id}` - Reads, replaces or deletes a service
/// - `GET /api/services/{id}/config` - frpc config and startup script
/// - `GET /api/subdomains/{subdomain}` - Subdomain availability
/// - `GET /api/me` - Caller identity and quota usage
/// - `GET /api/admin/services` - Every service (ADMIN only)
///
/// Every matched route under `/api` requires a bearer token. Unknown paths
/// fall through to the default 404 without being authenticated.
pub fn create_app(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route("/services", get(admin_list_services))
        .route_layer(middleware::from_fn(admin_middleware));

    // Layers run bottom-up: the caller is resolved before the admin check
    let api_routes = Router::new()
        .route("/services", get(list_services).post(create_service))
        .route(
            "/services/{id}",
            get(get_service).put(update_service).delete(delete_service),
        )
        .route("/services/{id}/config", get(service_config))
        .route("/subdomains/{subdomain}", get(subdomain_availability))
        .route("/me", get(me))
        .nest("/admin", admin_routes)
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/health", get(health))
        .nest("/api", api_routes)
        .with_state(state)
}
