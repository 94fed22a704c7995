//! Canonical API model
//!
//! Both Swagger 2 and OpenAPI 3 documents normalize into [`ApiDescriptor`].
//! A descriptor is built once per document and is not mutated afterwards.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::domain::Labels;
use crate::{Error, Result};

/// Identity of a deployed API
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ApiId {
    pub name: String,
    pub version: String,
}

impl ApiId {
    pub fn new<N: Into<String>, V: Into<String>>(name: N, version: V) -> Self {
        Self { name: name.into(), version: version.into() }
    }
}

impl fmt::Display for ApiId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.version)
    }
}

/// HTTP verbs an API resource can declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Put,
    Post,
    Delete,
    Options,
    Head,
    Patch,
    Trace,
}

impl HttpMethod {
    /// Order in which operations of one path item are emitted
    pub const DECLARATION_ORDER: [HttpMethod; 8] = [
        HttpMethod::Get,
        HttpMethod::Put,
        HttpMethod::Post,
        HttpMethod::Delete,
        HttpMethod::Options,
        HttpMethod::Head,
        HttpMethod::Patch,
        HttpMethod::Trace,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Put => "PUT",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Head => "HEAD",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Trace => "TRACE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which environment a backend target serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointKind {
    Production,
    Sandbox,
}

impl EndpointKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EndpointKind::Production => "production",
            EndpointKind::Sandbox => "sandbox",
        }
    }
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend target declared by a document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Endpoint {
    pub kind: EndpointKind,
    pub url: String,
    pub scheme: String,
    pub host: String,
    pub port: u16,
    /// Path prefix of the backend, without trailing slash; empty for the root
    pub path: String,
    pub tls: bool,
}

impl Endpoint {
    /// Parse a backend URL. A URL without a scheme is treated as plain HTTP.
    pub fn parse(raw: &str, kind: EndpointKind) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::input_format("endpoint URL cannot be empty"));
        }

        let candidate = if trimmed.contains("://") {
            trimmed.to_string()
        } else {
            format!("http://{}", trimmed)
        };

        let url = url::Url::parse(&candidate).map_err(|err| {
            Error::input_format(format!("invalid endpoint URL '{}': {}", trimmed, err))
        })?;

        let tls = match url.scheme() {
            "http" => false,
            "https" => true,
            other => {
                return Err(Error::input_format(format!(
                    "endpoint URL '{}' uses unsupported scheme '{}'",
                    trimmed, other
                )))
            }
        };

        let host = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| {
                Error::input_format(format!("endpoint URL '{}' does not contain a host", trimmed))
            })?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();

        let port = url.port_or_known_default().ok_or_else(|| {
            Error::input_format(format!("endpoint URL '{}' does not include a usable port", trimmed))
        })?;

        Ok(Self {
            kind,
            url: candidate,
            scheme: url.scheme().to_string(),
            host,
            port,
            path: url.path().trim_end_matches('/').to_string(),
            tls,
        })
    }
}

/// One operation of an API: a path template and a verb
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResource {
    pub path: String,
    pub method: HttpMethod,
    pub operation_id: Option<String>,
    pub summary: Option<String>,
    /// Operation-level override of the API production endpoints
    pub production_endpoints: Vec<Endpoint>,
    /// Operation-level override of the API sandbox endpoints
    pub sandbox_endpoints: Vec<Endpoint>,
}

impl ApiResource {
    pub fn new<P: Into<String>>(path: P, method: HttpMethod) -> Self {
        Self {
            path: path.into(),
            method,
            operation_id: None,
            summary: None,
            production_endpoints: Vec::new(),
            sandbox_endpoints: Vec::new(),
        }
    }

    pub fn has_endpoint_override(&self) -> bool {
        !self.production_endpoints.is_empty() || !self.sandbox_endpoints.is_empty()
    }
}

/// Canonical description of one API document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiDescriptor {
    pub name: String,
    pub version: String,
    pub base_path: String,
    pub resources: Vec<ApiResource>,
    pub production_endpoints: Vec<Endpoint>,
    pub sandbox_endpoints: Vec<Endpoint>,
    pub labels: Labels,
    pub request_timeout: Option<Duration>,
    pub provider: Option<String>,
    /// Top-level vendor extensions as declared
    pub extensions: BTreeMap<String, Value>,
}

impl ApiDescriptor {
    pub fn id(&self) -> ApiId {
        ApiId::new(self.name.clone(), self.version.clone())
    }
}
