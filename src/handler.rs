//! HTTP request handlers for the service registry API
//!
//! Handlers are thin: they pull the authenticated caller and the request
//! payload out of the request and delegate to [`ServiceRegistry`]. Every
//! failure is an [`AppError`], which renders itself as
//! `{ "error": ..., "code": ..., "details"?: ... }`.
//!
//! [`ServiceRegistry`]: crate::registry::ServiceRegistry

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde_json::json;

use crate::error::AppError;
use crate::model::{Caller, ServiceRequest};
use crate::state::AppState;

/// Turns an unreadable JSON body into a field-scoped validation error
fn request_body(
    payload: Result<Json<ServiceRequest>, JsonRejection>,
) -> Result<ServiceRequest, AppError> {
    payload
        .map(|Json(request)| request)
        .map_err(|rejection| AppError::invalid("body", rejection.body_text()))
}

/// Liveness probe
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Lists the caller's services, newest first
///
/// `GET /api/services`
pub async fn list_services(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, AppError> {
    let services = state.registry.list_by_owner(&caller).await?;
    Ok(Json(services))
}

/// Registers a new service
///
/// `POST /api/services`
///
/// # Request Body
///
/// ```json
/// {
///   "name": "svc-A",
///   "description": "a valid description here",
///   "localPort": 8080,
///   "subdomain": "alpha",
///   "frpType": "http"
/// }
/// ```
///
/// # Response
///
/// - **201 Created** - Service stored, body is the service with its `publicUrl`
/// - **400 Bad Request** - Validation failed, `details` maps fields to messages
/// - **403 Forbidden** - Tunnel quota of the caller's role is used up
/// - **409 Conflict** - Subdomain already taken
pub async fn create_service(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    payload: Result<Json<ServiceRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let request = request_body(payload)?;
    let service = state.registry.create(&caller, &request).await?;
    Ok((StatusCode::CREATED, Json(service)))
}

/// `GET /api/services/{id}`
pub async fn get_service(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let service = state.registry.get(&caller, &id).await?;
    Ok(Json(service))
}

/// Replaces a service's mutable fields
///
/// `PUT /api/services/{id}`
///
/// Takes the same body as create; the whole payload is validated again.
pub async fn update_service(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
    payload: Result<Json<ServiceRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let request = request_body(payload)?;
    let service = state.registry.update(&caller, &id, &request).await?;
    Ok(Json(service))
}

/// `DELETE /api/services/{id}`
///
/// - **200 OK** - Service deleted
/// - **404 Not Found** - Service does not exist or belongs to someone else
pub async fn delete_service(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let service = state.registry.delete(&caller, &id).await?;
    Ok(Json(json!({
        "message": "Service deleted successfully",
        "deletedId": service.record.id,
    })))
}

/// frpc configuration and startup script for a service
///
/// `GET /api/services/{id}/config`
pub async fn service_config(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let artifacts = state.registry.client_artifacts(&caller, &id).await?;
    Ok(Json(artifacts))
}

/// `GET /api/subdomains/{subdomain}`
pub async fn subdomain_availability(
    State(state): State<AppState>,
    Path(subdomain): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let availability = state.registry.subdomain_availability(&subdomain).await?;
    Ok(Json(availability))
}

/// Caller identity and tunnel quota usage
///
/// `GET /api/me`
pub async fn me(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, AppError> {
    let usage = state.registry.usage(&caller).await?;
    Ok(Json(usage))
}

/// Every registered service (admin only)
///
/// `GET /api/admin/services`
pub async fn admin_list_services(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, AppError> {
    let services = state.registry.list_all(&caller).await?;
    Ok(Json(services))
}
