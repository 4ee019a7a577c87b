//! Environment-driven configuration
//!
//! Values are read from the process environment (after `dotenvy` has loaded
//! an optional `.env` file in `main`).
//!
//! # Environment Variables
//!
//! - `PORT` - HTTP listen port (default: 8080)
//! - `DATABASE_URL` - Path to the database file (default: "data.db")
//! - `JWT_SECRET` - Shared secret used to verify bearer tokens (required)
//! - `ADMIN_EMAIL` - E-mail that is always granted the ADMIN role (optional)
//! - `FRP_SERVER_ADDR` - Tunnel server address written to client configs (default: "127.0.0.1")
//! - `FRP_SERVER_PORT` - Tunnel server bind port (default: 7000)
//! - `FRP_AUTH_TOKEN` - Shared tunnel auth token (required)
//! - `BASE_DOMAIN` - Fallback base domain for public URLs (default: "localhost")
//! - `PRIMARY_TUNNEL_HOST` - Preferred host for public URLs (optional)

use std::env;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value:?} is not a valid port")]
    InvalidPort { key: &'static str, value: String },
}

/// Static tunnel server parameters consumed by public URL derivation and
/// client config generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelSettings {
    pub server_addr: String,
    pub server_port: u16,
    pub auth_token: String,
    pub base_domain: String,
    pub primary_host: Option<String>,
}

impl TunnelSettings {
    /// Host that public URLs are built on: the primary tunnel host when
    /// configured, otherwise the base domain
    pub fn base_host(&self) -> &str {
        self.primary_host
            .as_deref()
            .filter(|h| !h.is_empty())
            .unwrap_or(&self.base_domain)
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub admin_email: Option<String>,
    pub tunnel: TunnelSettings,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values are treated the same as unset ones
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));
        let port = |key: &'static str, default: u16| match get(key) {
            None => Ok(default),
            Some(value) => value
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort { key, value }),
        };

        Ok(Self {
            port: port("PORT", 8080)?,
            database_url: get("DATABASE_URL").unwrap_or_else(|| "data.db".to_string()),
            jwt_secret: required("JWT_SECRET")?,
            admin_email: get("ADMIN_EMAIL"),
            tunnel: TunnelSettings {
                server_addr: get("FRP_SERVER_ADDR").unwrap_or_else(|| "127.0.0.1".to_string()),
                server_port: port("FRP_SERVER_PORT", 7000)?,
                auth_token: required("FRP_AUTH_TOKEN")?,
                base_domain: get("BASE_DOMAIN").unwrap_or_else(|| "localhost".to_string()),
                primary_host: get("PRIMARY_TUNNEL_HOST"),
            },
        })
    }
}
