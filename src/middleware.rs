use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
    Extension,
};

use crate::auth::require_role;
use crate::error::AppError;
use crate::model::{Caller, Role};
use crate::state::AppState;

/// Middleware that resolves the caller from an `Authorization: Bearer` header
///
/// On success the [`Caller`] is inserted into the request extensions, where
/// handlers pick it up with `Extension<Caller>`. A missing header, a header
/// without the `Bearer ` scheme, or a token that fails verification all
/// produce `401 Unauthorized`.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AppError::Unauthenticated)?;

    let caller = state.guard.authenticate(token)?;
    tracing::debug!(caller_id = %caller.id, role = %caller.role, "authenticated request");

    request.extensions_mut().insert(caller);
    Ok(next.run(request).await)
}

/// Middleware that only lets ADMIN callers through
///
/// Must run after [`auth_middleware`]; an authenticated caller without the
/// role gets `403 Forbidden`.
pub async fn admin_middleware(
    Extension(caller): Extension<Caller>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    require_role(&caller, Role::Admin)?;
    Ok(next.run(request).await)
}
