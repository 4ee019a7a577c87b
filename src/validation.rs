//! Declarative validation of service registration requests
//!
//! Every rule runs on every call so the caller receives all field errors at
//! once. The output is either a fully typed [`ServiceInput`] or the collected
//! [`FieldErrors`], never a partial value.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::FieldErrors;
use crate::model::{FrpType, ServiceInput, ServiceRequest};

static NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap());

static SUBDOMAIN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?$").unwrap());

const NAME_MIN: usize = 3;
const DESCRIPTION_MIN: usize = 10;
const DESCRIPTION_MAX: usize = 200;
const SUBDOMAIN_MIN: usize = 3;

/// Why a port value was rejected
#[derive(Debug, PartialEq, Eq)]
enum PortError {
    Missing,
    NotNumber,
    OutOfRange,
}

/// Coerces a JSON number or numeric string into a port
///
/// `null` and blank strings count as missing, which is how HTML forms submit
/// an untouched optional field.
fn coerce_port(value: Option<&Value>) -> Result<u16, PortError> {
    let number = match value {
        None | Some(Value::Null) => return Err(PortError::Missing),
        Some(Value::String(s)) if s.trim().is_empty() => return Err(PortError::Missing),
        Some(Value::String(s)) => s.trim().parse::<i64>().map_err(|_| PortError::NotNumber)?,
        Some(Value::Number(n)) => match n.as_i64() {
            Some(i) => i,
            None => match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => f as i64,
                _ => return Err(PortError::NotNumber),
            },
        },
        Some(_) => return Err(PortError::NotNumber),
    };

    if (1..=65535).contains(&number) {
        Ok(number as u16)
    } else {
        Err(PortError::OutOfRange)
    }
}

fn port_message(label: &str, err: &PortError) -> String {
    match err {
        PortError::Missing => format!("{label} is required"),
        PortError::NotNumber => format!("{label} must be a number"),
        PortError::OutOfRange => format!("{label} must be between 1 and 65535"),
    }
}

/// Reads an optional text field
///
/// Missing and `null` read as empty. Any other non-string value is reported
/// on the field and yields `None` so no further rule piles onto it.
fn text_field(
    errors: &mut FieldErrors,
    value: Option<&Value>,
    field: &str,
    label: &str,
) -> Option<String> {
    match value {
        None | Some(Value::Null) => Some(String::new()),
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            errors.add(field, format!("{label} must be a string"));
            None
        }
    }
}

fn flag_field(
    errors: &mut FieldErrors,
    value: Option<&Value>,
    field: &str,
    label: &str,
    default: bool,
) -> bool {
    match value {
        None | Some(Value::Null) => default,
        Some(Value::Bool(flag)) => *flag,
        Some(_) => {
            errors.add(field, format!("{label} must be true or false"));
            default
        }
    }
}

/// Checks a subdomain label, returning the first problem found
pub fn check_subdomain(subdomain: &str) -> Result<(), String> {
    if subdomain.len() < SUBDOMAIN_MIN {
        return Err(format!(
            "Subdomain must be at least {SUBDOMAIN_MIN} characters"
        ));
    }
    if !SUBDOMAIN_RE.is_match(subdomain) {
        return Err(
            "Subdomain can only contain lowercase letters, numbers and hyphens, and cannot start or end with a hyphen"
                .to_string(),
        );
    }
    Ok(())
}

/// Validates and normalizes a raw registration request
pub fn validate_service(request: &ServiceRequest) -> Result<ServiceInput, FieldErrors> {
    let mut errors = FieldErrors::new();

    let name = text_field(&mut errors, request.name.as_ref(), "name", "Name");
    if let Some(name) = &name {
        if name.is_empty() {
            errors.add("name", "Name is required");
        } else {
            if name.chars().count() < NAME_MIN {
                errors.add("name", format!("Name must be at least {NAME_MIN} characters"));
            }
            if !NAME_RE.is_match(name) {
                errors.add(
                    "name",
                    "Name can only contain letters, numbers, hyphens and underscores",
                );
            }
        }
    }

    let description = text_field(
        &mut errors,
        request.description.as_ref(),
        "description",
        "Description",
    );
    if let Some(description) = &description {
        let description_len = description.chars().count();
        if description_len < DESCRIPTION_MIN {
            errors.add(
                "description",
                format!("Description must be at least {DESCRIPTION_MIN} characters"),
            );
        } else if description_len > DESCRIPTION_MAX {
            errors.add(
                "description",
                format!("Description must be at most {DESCRIPTION_MAX} characters"),
            );
        }
    }

    let local_port = match coerce_port(request.local_port.as_ref()) {
        Ok(port) => Some(port),
        Err(e) => {
            errors.add("localPort", port_message("Local port", &e));
            None
        }
    };

    let subdomain = text_field(
        &mut errors,
        request.subdomain.as_ref(),
        "subdomain",
        "Subdomain",
    );
    if let Some(subdomain) = &subdomain {
        if subdomain.is_empty() {
            errors.add("subdomain", "Subdomain is required");
        } else if let Err(message) = check_subdomain(subdomain) {
            errors.add("subdomain", message);
        }
    }

    let frp_type = match request.frp_type.as_ref() {
        None | Some(Value::Null) => {
            errors.add("frpType", "Tunnel type is required");
            None
        }
        Some(Value::String(raw)) if raw.is_empty() => {
            errors.add("frpType", "Tunnel type is required");
            None
        }
        Some(Value::String(raw)) => match raw.parse::<FrpType>() {
            Ok(t) => Some(t),
            Err(()) => {
                errors.add("frpType", "Invalid tunnel type");
                None
            }
        },
        Some(_) => {
            errors.add("frpType", "Invalid tunnel type");
            None
        }
    };

    // Only TCP and UDP carry a remote port; for every other type it is dropped.
    let remote_port = match frp_type {
        Some(t) if t.requires_remote_port() => {
            match coerce_port(request.remote_port.as_ref()) {
                Ok(port) => Some(port),
                Err(PortError::Missing) => {
                    errors.add("remotePort", "Remote port is required for TCP and UDP tunnels");
                    None
                }
                Err(e) => {
                    errors.add("remotePort", port_message("Remote port", &e));
                    None
                }
            }
        }
        _ => None,
    };

    let use_encryption = flag_field(
        &mut errors,
        request.use_encryption.as_ref(),
        "useEncryption",
        "Use encryption",
        true,
    );
    let use_compression = flag_field(
        &mut errors,
        request.use_compression.as_ref(),
        "useCompression",
        "Use compression",
        false,
    );

    match (name, description, local_port, subdomain, frp_type) {
        (Some(name), Some(description), Some(local_port), Some(subdomain), Some(frp_type))
            if errors.is_empty() =>
        {
            Ok(ServiceInput {
                name,
                description,
                local_port,
                subdomain,
                frp_type,
                remote_port,
                use_encryption,
                use_compression,
            })
        }
        _ => Err(errors),
    }
}
