//! Gateway vendor extensions shared by both document versions.

use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::domain::{Endpoint, EndpointKind, Labels};
use crate::{Error, Result};

pub const LABELS_EXTENSION: &str = "x-gateway-labels";
pub const BASE_PATH_EXTENSION: &str = "x-gateway-basepath";
pub const PRODUCTION_ENDPOINTS_EXTENSION: &str = "x-gateway-production-endpoints";
pub const SANDBOX_ENDPOINTS_EXTENSION: &str = "x-gateway-sandbox-endpoints";
pub const REQUEST_TIMEOUT_EXTENSION: &str = "x-gateway-request-timeout";
pub const PROVIDER_EXTENSION: &str = "x-gateway-provider";

const MAX_REQUEST_TIMEOUT_SECONDS: u64 = 3600;

/// API-level extension values, parsed once per document
#[derive(Debug, Clone, Default)]
pub struct ApiExtensions {
    pub labels: Labels,
    pub base_path: Option<String>,
    pub production_endpoints: Vec<Endpoint>,
    pub sandbox_endpoints: Vec<Endpoint>,
    pub request_timeout: Option<Duration>,
    pub provider: Option<String>,
    pub raw: BTreeMap<String, Value>,
}

/// Operation-level endpoint overrides
#[derive(Debug, Clone, Default)]
pub struct OperationExtensions {
    pub production_endpoints: Vec<Endpoint>,
    pub sandbox_endpoints: Vec<Endpoint>,
}

impl ApiExtensions {
    pub fn parse<'a, I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a String, &'a Value)>,
    {
        let raw: BTreeMap<String, Value> = entries
            .into_iter()
            .filter(|(key, _)| key.starts_with("x-"))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Ok(Self {
            labels: Labels::from_extension(raw.get(LABELS_EXTENSION), LABELS_EXTENSION)?,
            base_path: parse_string(raw.get(BASE_PATH_EXTENSION), BASE_PATH_EXTENSION)?,
            production_endpoints: parse_endpoints(
                raw.get(PRODUCTION_ENDPOINTS_EXTENSION),
                EndpointKind::Production,
                PRODUCTION_ENDPOINTS_EXTENSION,
            )?,
            sandbox_endpoints: parse_endpoints(
                raw.get(SANDBOX_ENDPOINTS_EXTENSION),
                EndpointKind::Sandbox,
                SANDBOX_ENDPOINTS_EXTENSION,
            )?,
            request_timeout: parse_timeout(raw.get(REQUEST_TIMEOUT_EXTENSION))?,
            provider: parse_string(raw.get(PROVIDER_EXTENSION), PROVIDER_EXTENSION)?,
            raw,
        })
    }
}

impl OperationExtensions {
    pub fn parse<'a>(lookup: impl Fn(&str) -> Option<&'a Value>) -> Result<Self> {
        Ok(Self {
            production_endpoints: parse_endpoints(
                lookup(PRODUCTION_ENDPOINTS_EXTENSION),
                EndpointKind::Production,
                PRODUCTION_ENDPOINTS_EXTENSION,
            )?,
            sandbox_endpoints: parse_endpoints(
                lookup(SANDBOX_ENDPOINTS_EXTENSION),
                EndpointKind::Sandbox,
                SANDBOX_ENDPOINTS_EXTENSION,
            )?,
        })
    }
}

/// Parse `{ "urls": [ ... ] }` into backend targets
pub fn parse_endpoints(
    value: Option<&Value>,
    kind: EndpointKind,
    field: &str,
) -> Result<Vec<Endpoint>> {
    let Some(value) = value else {
        return Ok(Vec::new());
    };

    let urls = value
        .as_object()
        .and_then(|object| object.get("urls"))
        .and_then(Value::as_array)
        .ok_or_else(|| {
            Error::input_format_field("endpoints must be an object with a 'urls' list", field)
        })?;

    urls.iter()
        .map(|url| {
            let raw = url.as_str().ok_or_else(|| {
                Error::input_format_field("endpoint URLs must be strings", field)
            })?;
            Endpoint::parse(raw, kind).map_err(|err| match err {
                Error::InputFormat { message, .. } => Error::input_format_field(message, field),
                other => other,
            })
        })
        .collect()
}

fn parse_string(value: Option<&Value>, field: &str) -> Result<Option<String>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(raw)) if raw.trim().is_empty() => Ok(None),
        Some(Value::String(raw)) => Ok(Some(raw.trim().to_string())),
        Some(_) => Err(Error::input_format_field("value must be a string", field)),
    }
}

fn parse_timeout(value: Option<&Value>) -> Result<Option<Duration>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(value) => match value.as_u64() {
            Some(seconds) if (1..=MAX_REQUEST_TIMEOUT_SECONDS).contains(&seconds) => {
                Ok(Some(Duration::from_secs(seconds)))
            }
            _ => Err(Error::input_format_field(
                format!(
                    "request timeout must be an integer between 1 and {} seconds",
                    MAX_REQUEST_TIMEOUT_SECONDS
                ),
                REQUEST_TIMEOUT_EXTENSION,
            )),
        },
    }
}

/// Normalize a base path to a leading slash and no trailing slash; the root is `/`
pub fn normalize_base_path(raw: &str) -> String {
    let segments: Vec<&str> = raw.split('/').filter(|segment| !segment.is_empty()).collect();
    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}
