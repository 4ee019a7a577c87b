//! Bearer token issuing and verification
//!
//! Tokens are HS256 JWTs signed with the shared `JWT_SECRET`. Verification
//! is stateless: a token is accepted when its signature matches and its
//! expiry has not passed.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::model::{Caller, Role};

/// Claims carried by a bearer token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Issued at (timestamp)
    pub iat: i64,
    /// Expiration time (timestamp)
    pub exp: i64,
}

impl Claims {
    pub fn new(user_id: impl Into<String>, role: Role, validity: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id.into(),
            role,
            email: None,
            iat: now.timestamp(),
            exp: (now + validity).timestamp(),
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// Resolves callers from bearer tokens
pub struct TokenGuard {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    admin_email: Option<String>,
}

impl TokenGuard {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            admin_email: None,
        }
    }

    /// Callers presenting this e-mail are always resolved as ADMIN
    pub fn with_admin_email(mut self, email: Option<String>) -> Self {
        self.admin_email = email.filter(|e| !e.is_empty());
        self
    }

    /// Signs a token for the given claims
    pub fn issue(&self, claims: &Claims) -> Result<String, AppError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(e.into()))
    }

    /// Verifies a token and resolves the caller it identifies
    ///
    /// Malformed, expired and badly signed tokens all map to `Unauthenticated`.
    pub fn authenticate(&self, token: &str) -> Result<Caller, AppError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                tracing::debug!(error = %e, "rejected bearer token");
                AppError::Unauthenticated
            })?
            .claims;

        if claims.sub.is_empty() {
            return Err(AppError::Unauthenticated);
        }

        let is_bootstrap_admin = match (&self.admin_email, &claims.email) {
            (Some(admin), Some(email)) => admin.eq_ignore_ascii_case(email),
            _ => false,
        };

        Ok(Caller {
            id: claims.sub,
            role: if is_bootstrap_admin { Role::Admin } else { claims.role },
            email: claims.email,
        })
    }
}

/// Ensures the caller holds `role`; ADMIN satisfies every role
pub fn require_role(caller: &Caller, role: Role) -> Result<(), AppError> {
    if caller.role == role || caller.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}
