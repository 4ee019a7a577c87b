//! Application state shared across all request handlers

use std::sync::Arc;

use crate::auth::TokenGuard;
use crate::registry::ServiceRegistry;

/// Cloned into every handler by the Axum router
#[derive(Clone)]
pub struct AppState {
    /// Service lifecycle operations backed by the embedded database
    pub registry: ServiceRegistry,

    /// Resolves bearer tokens into callers
    pub guard: Arc<TokenGuard>,
}
