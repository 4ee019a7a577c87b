//! Error taxonomy for registry operations and its HTTP mapping

use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::database::StoreError;

/// Field-scoped validation messages, keyed by the request field name
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation failed")]
    ValidationFailed(FieldErrors),

    #[error("Subdomain '{0}' is already taken. Please choose another.")]
    DuplicateSubdomain(String),

    #[error("Tunnel limit reached: your plan allows at most {limit} services")]
    QuotaExceeded { limit: u32 },

    #[error("Authentication required")]
    Unauthenticated,

    #[error("You are not allowed to perform this action")]
    Forbidden,

    #[error("Service not found")]
    NotFound,

    #[error("Internal server error")]
    Internal(#[source] anyhow::Error),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationFailed(_) => "validation_failed",
            AppError::DuplicateSubdomain(_) => "duplicate_subdomain",
            AppError::QuotaExceeded { .. } => "quota_exceeded",
            AppError::Unauthenticated => "unauthenticated",
            AppError::Forbidden => "forbidden",
            AppError::NotFound => "not_found",
            AppError::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            AppError::DuplicateSubdomain(_) => StatusCode::CONFLICT,
            AppError::QuotaExceeded { .. } => StatusCode::FORBIDDEN,
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Single-field validation failure
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.add(field, message);
        AppError::ValidationFailed(errors)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self {
            AppError::ValidationFailed(details) => json!({
                "error": self.to_string(),
                "code": self.code(),
                "details": details,
            }),
            AppError::Internal(source) => {
                // Full context stays in the server log, the caller gets an opaque message
                tracing::error!(error = ?source, "internal failure");
                json!({
                    "error": self.to_string(),
                    "code": self.code(),
                })
            }
            _ => json!({
                "error": self.to_string(),
                "code": self.code(),
            }),
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::SubdomainTaken(subdomain) => AppError::DuplicateSubdomain(subdomain),
            StoreError::QuotaExceeded(limit) => AppError::QuotaExceeded { limit },
            StoreError::NotFound => AppError::NotFound,
            other => AppError::Internal(other.into()),
        }
    }
}
