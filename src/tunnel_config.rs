//! Client-side artifacts for the external `frpc` tunnel client
//!
//! Both artifacts are pure functions of a stored service and the static
//! tunnel settings: the same inputs always render byte-identical text.

use serde::{Deserialize, Serialize};
use toml::Value;

use crate::config::TunnelSettings;
use crate::model::ServiceRecord;

const LOCAL_IP: &str = "127.0.0.1";

const STARTUP_SCRIPT_TEMPLATE: &str = r#"#!/usr/bin/env bash
# Tunnel launcher for {{SERVICE_NAME}}
#   protocol:      {{PROTOCOL}}
#   local service: 127.0.0.1:{{LOCAL_PORT}}
#   public url:    http://{{SUBDOMAIN}}.{{BASE_HOST}}
set -euo pipefail

CONFIG_FILE="${1:-{{CONFIG_FILE}}}"
FRPC_BIN="${FRPC_BIN:-frpc}"

if ! command -v "$FRPC_BIN" >/dev/null 2>&1; then
  echo "frpc not found: install it from https://github.com/fatedier/frp/releases or set FRPC_BIN" >&2
  exit 1
fi

if [ ! -f "$CONFIG_FILE" ]; then
  echo "config file $CONFIG_FILE not found" >&2
  exit 1
fi

echo "Starting {{PROTOCOL}} tunnel '{{SERVICE_NAME}}' for local port {{LOCAL_PORT}}"
exec "$FRPC_BIN" -c "$CONFIG_FILE"
"#;

/// Generated files for one service
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClientArtifacts {
    pub config_file_name: String,
    pub config: String,
    pub script_file_name: String,
    pub script: String,
}

pub fn config_file_name(service: &ServiceRecord) -> String {
    format!("{}.toml", service.name)
}

pub fn script_file_name(service: &ServiceRecord) -> String {
    format!("start-{}.sh", service.name)
}

/// One `key = value` line, with the value encoded by the TOML serializer
fn entry(key: &str, value: impl Into<Value>) -> String {
    format!("{key} = {}", value.into())
}

/// Renders the frpc TOML configuration for a service
///
/// Dotted `auth.*` and `transport.*` keys and the `[[proxies]]` array are
/// written line by line to keep the layout frpc documents.
pub fn render_client_config(service: &ServiceRecord, settings: &TunnelSettings) -> String {
    let mut lines = vec![
        entry("serverAddr", settings.server_addr.as_str()),
        entry("serverPort", i64::from(settings.server_port)),
        entry("auth.method", "token"),
        entry("auth.token", settings.auth_token.as_str()),
        String::new(),
        "[[proxies]]".to_string(),
        entry("name", service.name.as_str()),
        entry("type", service.frp_type.as_str()),
        entry("localIP", LOCAL_IP),
        entry("localPort", i64::from(service.local_port)),
    ];

    if service.frp_type.routes_by_subdomain() {
        lines.push(entry("subdomain", service.subdomain.as_str()));
    }
    if service.frp_type.requires_remote_port() {
        if let Some(port) = service.remote_port {
            lines.push(entry("remotePort", i64::from(port)));
        }
    }
    if service.frp_type.needs_secret_key() {
        lines.push("# Visitors must present the same secret key, choose one and keep it private:".to_string());
        lines.push("# secretKey = \"<your-shared-secret>\"".to_string());
    }

    lines.push(entry("transport.useEncryption", service.use_encryption));
    lines.push(entry("transport.useCompression", service.use_compression));

    let mut config = lines.join("\n");
    config.push('\n');
    config
}

/// Renders the startup script by substituting the template placeholders
pub fn render_startup_script(service: &ServiceRecord, settings: &TunnelSettings) -> String {
    STARTUP_SCRIPT_TEMPLATE
        .replace("{{SERVICE_NAME}}", &service.name)
        .replace("{{PROTOCOL}}", &service.frp_type.as_str().to_uppercase())
        .replace("{{LOCAL_PORT}}", &service.local_port.to_string())
        .replace("{{SUBDOMAIN}}", &service.subdomain)
        .replace("{{BASE_HOST}}", settings.base_host())
        .replace("{{CONFIG_FILE}}", &config_file_name(service))
}

pub fn generate(service: &ServiceRecord, settings: &TunnelSettings) -> ClientArtifacts {
    ClientArtifacts {
        config_file_name: config_file_name(service),
        config: render_client_config(service, settings),
        script_file_name: script_file_name(service),
        script: render_startup_script(service, settings),
    }
}
