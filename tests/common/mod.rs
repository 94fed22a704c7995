//! Shared fixtures for integration tests
#![allow(dead_code)]

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// OpenAPI 3 document with one `GET /pets/{id}` resource
pub fn petstore_yaml(labels: &[&str]) -> String {
    let labels = if labels.is_empty() {
        String::new()
    } else {
        format!("x-gateway-labels: [{}]\n", labels.join(", "))
    };

    format!(
        r#"openapi: 3.0.0
info:
  title: pets
  version: v1
x-gateway-basepath: /pets
{labels}x-gateway-production-endpoints:
  urls:
    - http://petstore:8080
paths:
  /pets/{{id}}:
    get:
      operationId: getPet
      responses:
        "200":
          description: ok
"#
    )
}

/// Swagger 2 document whose backend comes from `schemes`/`host`/`basePath`
pub fn orders_swagger_json() -> String {
    r#"{
        "swagger": "2.0",
        "info": {"title": "orders", "version": "2.1"},
        "schemes": ["https"],
        "host": "orders.internal",
        "basePath": "/orders",
        "x-gateway-labels": "edge",
        "paths": {
            "/items": {"get": {}, "post": {}},
            "/items/{itemId}": {"delete": {}}
        }
    }"#
    .to_string()
}

/// In-memory zip archive of `(entry name, contents)` pairs
pub fn zip_bundle(files: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents) in files {
        writer.start_file(*name, SimpleFileOptions::default()).expect("start zip entry");
        writer.write_all(contents.as_bytes()).expect("write zip entry");
    }
    writer.finish().expect("finish zip").into_inner()
}
