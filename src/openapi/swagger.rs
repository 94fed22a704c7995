//! Swagger 2.0 documents.
//!
//! `openapiv3` only models OpenAPI 3, so the subset of Swagger 2 the gateway
//! needs is described with local serde types.

use serde::Deserialize;
use serde_json::{Map, Value};

use super::extensions::{ApiExtensions, OperationExtensions};
use super::{DocumentInfo, DocumentParts, RawOperation};
use crate::domain::{Endpoint, EndpointKind, HttpMethod};
use crate::{Error, Result};

#[derive(Debug, Deserialize)]
struct SwaggerDocument {
    info: DocumentInfo,
    #[serde(default)]
    host: Option<String>,
    #[serde(default, rename = "basePath")]
    base_path: Option<String>,
    #[serde(default)]
    schemes: Vec<String>,
    #[serde(default)]
    paths: Map<String, Value>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct SwaggerOperation {
    #[serde(default, rename = "operationId")]
    operation_id: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

pub(super) fn parse(document: Value) -> Result<DocumentParts> {
    let document: SwaggerDocument = serde_json::from_value(document)
        .map_err(|err| Error::input_format(format!("invalid Swagger 2.0 document: {}", err)))?;

    let extensions = ApiExtensions::parse(document.rest.iter())?;

    let mut default_production = Vec::new();
    if let Some(host) = document.host.as_deref().filter(|host| !host.trim().is_empty()) {
        let scheme = document.schemes.first().map(String::as_str).unwrap_or("http");
        let url = format!(
            "{}://{}{}",
            scheme,
            host.trim(),
            document.base_path.as_deref().unwrap_or_default()
        );
        default_production.push(Endpoint::parse(&url, EndpointKind::Production)?);
    }

    let mut operations = Vec::new();
    for (path, item) in &document.paths {
        let item = item.as_object().ok_or_else(|| {
            Error::input_format_field("path item must be an object", path.clone())
        })?;

        if item.contains_key("$ref") {
            return Err(Error::input_format_field(
                "referenced path items are not supported",
                path.clone(),
            ));
        }

        for method in HttpMethod::DECLARATION_ORDER {
            let Some(raw) = item.get(&method.as_str().to_ascii_lowercase()) else {
                continue;
            };

            let operation: SwaggerOperation =
                serde_json::from_value(raw.clone()).map_err(|err| {
                    Error::input_format_field(
                        format!("invalid operation {} {}: {}", method, path, err),
                        path.clone(),
                    )
                })?;

            operations.push(RawOperation {
                path: path.clone(),
                method,
                operation_id: operation.operation_id,
                summary: operation.summary,
                extensions: OperationExtensions::parse(|key| operation.rest.get(key))?,
            });
        }
    }

    Ok(DocumentParts {
        info: document.info,
        extensions,
        default_base_path: document.base_path,
        default_production,
        operations,
    })
}
