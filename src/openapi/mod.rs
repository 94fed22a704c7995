//! # Spec Normalizer
//!
//! Turns a raw API document into the canonical [`ApiDescriptor`].
//!
//! YAML input is converted to JSON first. The decoded document is then probed
//! for its version discriminant (`swagger: "2.x"` or `openapi: "3.x"`) and
//! decoded against the matching schema. Decode failures are reported as
//! [`Error::InputFormat`]; a partially empty descriptor is never returned.

pub mod extensions;
mod openapi3;
mod swagger;

use serde::Deserialize;
use serde_json::Value;

use crate::domain::{ApiDescriptor, ApiResource, Endpoint, HttpMethod};
use crate::{Error, Result};

use extensions::{normalize_base_path, ApiExtensions, OperationExtensions};

/// Schema family a document belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecVersion {
    Swagger2,
    OpenApi3,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DocumentInfo {
    pub title: String,
    pub version: String,
}

/// Version-independent pieces extracted from one document
#[derive(Debug)]
pub(crate) struct DocumentParts {
    pub info: DocumentInfo,
    pub extensions: ApiExtensions,
    pub default_base_path: Option<String>,
    pub default_production: Vec<Endpoint>,
    pub operations: Vec<RawOperation>,
}

#[derive(Debug)]
pub(crate) struct RawOperation {
    pub path: String,
    pub method: HttpMethod,
    pub operation_id: Option<String>,
    pub summary: Option<String>,
    pub extensions: OperationExtensions,
}

/// Normalize a raw JSON or YAML document into an API descriptor
pub fn normalize(raw: &[u8]) -> Result<ApiDescriptor> {
    let document = decode_document(raw)?;

    let parts = match detect_version(&document)? {
        SpecVersion::Swagger2 => swagger::parse(document)?,
        SpecVersion::OpenApi3 => openapi3::parse(document)?,
    };

    assemble(parts)
}

/// Decode JSON, falling back to YAML
pub fn decode_document(raw: &[u8]) -> Result<Value> {
    match serde_json::from_slice::<Value>(raw) {
        Ok(value) => Ok(value),
        Err(json_err) => serde_yaml::from_slice::<Value>(raw).map_err(|yaml_err| {
            Error::input_format(format!(
                "document is neither valid JSON ({}) nor valid YAML ({})",
                json_err, yaml_err
            ))
        }),
    }
}

/// Probe the version discriminant of a decoded document
pub fn detect_version(document: &Value) -> Result<SpecVersion> {
    let object = document
        .as_object()
        .ok_or_else(|| Error::input_format("document root must be an object"))?;

    if let Some(version) = object.get("swagger") {
        return match version.as_str() {
            Some(v) if v.starts_with('2') => Ok(SpecVersion::Swagger2),
            _ => Err(Error::input_format_field(
                format!("unsupported specification version {}", version),
                "swagger",
            )),
        };
    }

    if let Some(version) = object.get("openapi") {
        return match version.as_str() {
            Some(v) if v.starts_with('3') => Ok(SpecVersion::OpenApi3),
            _ => Err(Error::input_format_field(
                format!("unsupported specification version {}", version),
                "openapi",
            )),
        };
    }

    Err(Error::input_format("document declares neither 'swagger' nor 'openapi' version"))
}

fn assemble(parts: DocumentParts) -> Result<ApiDescriptor> {
    let DocumentParts { info, extensions, default_base_path, default_production, operations } =
        parts;

    let name = info.title.trim().to_string();
    if name.is_empty() {
        return Err(Error::input_format_field("API title cannot be empty", "info.title"));
    }

    let version = info.version.trim().to_string();
    if version.is_empty() {
        return Err(Error::input_format_field("API version cannot be empty", "info.version"));
    }

    let base_path = normalize_base_path(
        extensions.base_path.as_deref().or(default_base_path.as_deref()).unwrap_or("/"),
    );

    let production_endpoints = if extensions.production_endpoints.is_empty() {
        default_production
    } else {
        extensions.production_endpoints
    };

    let resources = operations
        .into_iter()
        .map(|operation| ApiResource {
            path: normalize_resource_path(&operation.path),
            method: operation.method,
            operation_id: operation.operation_id,
            summary: operation.summary,
            production_endpoints: operation.extensions.production_endpoints,
            sandbox_endpoints: operation.extensions.sandbox_endpoints,
        })
        .collect();

    Ok(ApiDescriptor {
        name,
        version,
        base_path,
        resources,
        production_endpoints,
        sandbox_endpoints: extensions.sandbox_endpoints,
        labels: extensions.labels,
        request_timeout: extensions.request_timeout,
        provider: extensions.provider,
        extensions: extensions.raw,
    })
}

fn normalize_resource_path(path: &str) -> String {
    let trimmed = path.trim();
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}
