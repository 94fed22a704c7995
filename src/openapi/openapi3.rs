//! OpenAPI 3.x documents, decoded with `openapiv3`.

use openapiv3::{OpenAPI, Operation, PathItem, ReferenceOr, Server};
use serde_json::Value;

use super::extensions::{ApiExtensions, OperationExtensions};
use super::{DocumentInfo, DocumentParts, RawOperation};
use crate::domain::{Endpoint, EndpointKind, HttpMethod};
use crate::{Error, Result};

pub(super) fn parse(document: Value) -> Result<DocumentParts> {
    let openapi: OpenAPI = serde_json::from_value(document)
        .map_err(|err| Error::input_format(format!("invalid OpenAPI 3 document: {}", err)))?;

    let extensions = ApiExtensions::parse(openapi.extensions.iter())?;

    let server_urls: Vec<String> = openapi.servers.iter().map(expand_server_url).collect();

    let default_production = server_urls
        .iter()
        .filter(|url| url.contains("://"))
        .map(|url| Endpoint::parse(url, EndpointKind::Production))
        .collect::<Result<Vec<_>>>()?;

    let default_base_path = server_urls.first().map(|url| server_path(url));

    let mut operations = Vec::new();
    for (path, item) in openapi.paths.paths.iter() {
        let item = match item {
            ReferenceOr::Item(item) => item,
            ReferenceOr::Reference { reference } => {
                return Err(Error::input_format_field(
                    format!("referenced path items are not supported ({})", reference),
                    path.clone(),
                ))
            }
        };

        for method in HttpMethod::DECLARATION_ORDER {
            let Some(operation) = operation_for(item, method) else {
                continue;
            };

            operations.push(RawOperation {
                path: path.clone(),
                method,
                operation_id: operation.operation_id.clone(),
                summary: operation.summary.clone(),
                extensions: OperationExtensions::parse(|key| operation.extensions.get(key))?,
            });
        }
    }

    Ok(DocumentParts {
        info: DocumentInfo { title: openapi.info.title, version: openapi.info.version },
        extensions,
        default_base_path,
        default_production,
        operations,
    })
}

fn operation_for(item: &PathItem, method: HttpMethod) -> Option<&Operation> {
    match method {
        HttpMethod::Get => item.get.as_ref(),
        HttpMethod::Put => item.put.as_ref(),
        HttpMethod::Post => item.post.as_ref(),
        HttpMethod::Delete => item.delete.as_ref(),
        HttpMethod::Options => item.options.as_ref(),
        HttpMethod::Head => item.head.as_ref(),
        HttpMethod::Patch => item.patch.as_ref(),
        HttpMethod::Trace => item.trace.as_ref(),
    }
}

/// Substitute server variables with their declared defaults
fn expand_server_url(server: &Server) -> String {
    let mut url = server.url.clone();
    if let Some(variables) = &server.variables {
        for (name, variable) in variables {
            url = url.replace(&format!("{{{}}}", name), &variable.default);
        }
    }
    url
}

fn server_path(url: &str) -> String {
    if url.contains("://") {
        url::Url::parse(url).map(|parsed| parsed.path().to_string()).unwrap_or_default()
    } else {
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn servers_provide_defaults() {
        let parts = parse(json!({
            "openapi": "3.0.3",
            "info": {"title": "Pets", "version": "v1"},
            "servers": [
                {
                    "url": "{scheme}://petstore:{port}/api",
                    "variables": {
                        "scheme": {"default": "http"},
                        "port": {"default": "8080"}
                    }
                },
                {"url": "/relative"}
            ],
            "paths": {}
        }))
        .unwrap();

        assert_eq!(parts.default_production.len(), 1);
        assert_eq!(parts.default_production[0].port, 8080);
        assert_eq!(parts.default_base_path.as_deref(), Some("/api"));
    }

    #[test]
    fn operations_carry_overrides() {
        let parts = parse(json!({
            "openapi": "3.0.0",
            "info": {"title": "Pets", "version": "v1"},
            "paths": {
                "/pets/{id}": {
                    "delete": {"responses": {}},
                    "get": {
                        "operationId": "getPet",
                        "summary": "Fetch one pet",
                        "responses": {},
                        "x-gateway-sandbox-endpoints": {"urls": ["http://sandbox:9000"]}
                    }
                }
            }
        }))
        .unwrap();

        assert_eq!(parts.operations.len(), 2);
        assert_eq!(parts.operations[0].method, HttpMethod::Get);
        assert_eq!(parts.operations[0].summary.as_deref(), Some("Fetch one pet"));
        assert_eq!(parts.operations[0].extensions.sandbox_endpoints[0].host, "sandbox");
        assert_eq!(parts.operations[1].method, HttpMethod::Delete);
    }

    #[test]
    fn structural_errors_propagate() {
        let err = parse(json!({
            "openapi": "3.0.0",
            "info": {"title": "Pets", "version": "v1"},
            "paths": {"/pets": {"get": {"responses": "nope"}}}
        }))
        .unwrap_err();
        assert!(matches!(err, Error::InputFormat { .. }));
    }
}
