//! Data models for the tunnel service registry
//!
//! This module defines the structures shared across the application:
//! the stored service record, its public view, the raw registration request,
//! tunnel protocols, user roles and the per-role quota table.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tunnel protocol understood by the external `frpc` client
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FrpType {
    Http,
    Https,
    Tcp,
    Udp,
    Stcp,
    Xtcp,
}

impl FrpType {
    pub const ALL: [FrpType; 6] = [
        FrpType::Http,
        FrpType::Https,
        FrpType::Tcp,
        FrpType::Udp,
        FrpType::Stcp,
        FrpType::Xtcp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FrpType::Http => "http",
            FrpType::Https => "https",
            FrpType::Tcp => "tcp",
            FrpType::Udp => "udp",
            FrpType::Stcp => "stcp",
            FrpType::Xtcp => "xtcp",
        }
    }

    /// TCP and UDP proxies are exposed on a server port instead of a vhost
    pub fn requires_remote_port(&self) -> bool {
        matches!(self, FrpType::Tcp | FrpType::Udp)
    }

    /// HTTP(S) proxies are routed by subdomain on the server's vhost port
    pub fn routes_by_subdomain(&self) -> bool {
        matches!(self, FrpType::Http | FrpType::Https)
    }

    /// Secret (stcp) and P2P (xtcp) proxies need a shared secret key on both ends
    pub fn needs_secret_key(&self) -> bool {
        matches!(self, FrpType::Stcp | FrpType::Xtcp)
    }
}

impl fmt::Display for FrpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FrpType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FrpType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or(())
    }
}

/// User role carried in the bearer credential
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Free,
    Premium,
    PremiumPlus,
    Endium,
    Admin,
}

impl Role {
    pub fn limits(&self) -> RoleLimits {
        match self {
            Role::Free => RoleLimits { max_tunnels: Some(3) },
            Role::Premium => RoleLimits { max_tunnels: Some(10) },
            Role::PremiumPlus => RoleLimits { max_tunnels: Some(25) },
            Role::Endium => RoleLimits { max_tunnels: Some(50) },
            Role::Admin => RoleLimits { max_tunnels: None },
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Free => "FREE",
            Role::Premium => "PREMIUM",
            Role::PremiumPlus => "PREMIUM_PLUS",
            Role::Endium => "ENDIUM",
            Role::Admin => "ADMIN",
        };
        f.write_str(name)
    }
}

/// Limits granted to a role
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoleLimits {
    /// Maximum number of registered services, `None` means unlimited
    pub max_tunnels: Option<u32>,
}

/// Authenticated caller resolved from a bearer credential
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub id: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Caller {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// A registered tunnel endpoint as stored in the database
///
/// The public URL is not part of the stored record: it is derived from the
/// subdomain and the configured base host every time the record is read.
///
/// # Example
/// ```json
/// {
///   "id": "5b0e3c1e-...",
///   "ownerId": "user_123",
///   "name": "svc-A",
///   "description": "a valid description here",
///   "localPort": 8080,
///   "subdomain": "alpha",
///   "frpType": "http",
///   "useEncryption": true,
///   "useCompression": false,
///   "createdAt": "2026-10-19T10:00:00Z"
/// }
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRecord {
    /// Generated at creation, immutable
    pub id: String,

    /// Owning user, immutable
    pub owner_id: String,

    pub name: String,
    pub description: String,
    pub local_port: u16,
    pub subdomain: String,
    pub frp_type: FrpType,

    /// Only present for TCP and UDP tunnels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_port: Option<u16>,

    pub use_encryption: bool,
    pub use_compression: bool,

    /// Set once at creation
    pub created_at: DateTime<Utc>,
}

impl ServiceRecord {
    pub fn from_input(
        id: String,
        owner_id: String,
        input: ServiceInput,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            owner_id,
            name: input.name,
            description: input.description,
            local_port: input.local_port,
            subdomain: input.subdomain,
            frp_type: input.frp_type,
            remote_port: input.remote_port,
            use_encryption: input.use_encryption,
            use_compression: input.use_compression,
            created_at,
        }
    }

    /// Overwrites every mutable field with the validated input
    pub fn apply(&mut self, input: ServiceInput) {
        self.name = input.name;
        self.description = input.description;
        self.local_port = input.local_port;
        self.subdomain = input.subdomain;
        self.frp_type = input.frp_type;
        self.remote_port = input.remote_port;
        self.use_encryption = input.use_encryption;
        self.use_compression = input.use_compression;
    }
}

/// A service as returned to callers, with the derived public URL
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    #[serde(flatten)]
    pub record: ServiceRecord,

    /// `http://{subdomain}.{baseHost}`
    pub public_url: String,
}

/// Raw registration payload for create and update
///
/// Every field is kept as raw JSON so a value of the wrong type is reported
/// on that field by the validator instead of failing the whole body. Ports
/// accept either JSON numbers or numeric strings.
///
/// # Example
/// ```json
/// {
///   "name": "game-server",
///   "description": "Minecraft server for friends",
///   "localPort": "25565",
///   "subdomain": "mc",
///   "frpType": "tcp",
///   "remotePort": 25565
/// }
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceRequest {
    pub name: Option<Value>,
    pub description: Option<Value>,
    pub local_port: Option<Value>,
    pub subdomain: Option<Value>,
    pub frp_type: Option<Value>,
    pub remote_port: Option<Value>,
    pub use_encryption: Option<Value>,
    pub use_compression: Option<Value>,
}

/// Validated, fully typed registration input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInput {
    pub name: String,
    pub description: String,
    pub local_port: u16,
    pub subdomain: String,
    pub frp_type: FrpType,
    pub remote_port: Option<u16>,
    pub use_encryption: bool,
    pub use_compression: bool,
}

/// Result of a subdomain availability query
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubdomainAvailability {
    pub subdomain: String,
    pub available: bool,
    pub public_url: String,
}

/// Quota usage of the calling user
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    #[serde(flatten)]
    pub caller: Caller,
    pub max_tunnels: Option<u32>,
    pub used: usize,
}
