//! Admin API over HTTP

mod common;

use std::sync::Arc;

use axum::http::{header::AUTHORIZATION, HeaderValue, StatusCode};
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use base64::Engine;
use flowgate::api::{build_router, AdminCredentials, ErrorBody};
use flowgate::compiler::{CompilerOptions, ListenerSettings};
use flowgate::domain::Label;
use flowgate::services::ApiDeployer;
use flowgate::xds::SnapshotCache;
use serde_json::Value;

use common::{orders_swagger_json, petstore_yaml, zip_bundle};

const MAX_BUNDLE_BYTES: usize = 64 * 1024;

struct App {
    server: TestServer,
    deployer: Arc<ApiDeployer>,
}

fn app() -> App {
    let deployer = Arc::new(ApiDeployer::new(
        Arc::new(SnapshotCache::new()),
        CompilerOptions::default(),
        ListenerSettings::default(),
    ));
    let router = build_router(
        deployer.clone(),
        AdminCredentials::new("admin", "secret"),
        MAX_BUNDLE_BYTES,
    );
    App { server: TestServer::new(router).unwrap(), deployer }
}

fn basic(user: &str, password: &str) -> HeaderValue {
    let encoded =
        base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", user, password));
    HeaderValue::from_str(&format!("Basic {}", encoded)).unwrap()
}

fn admin() -> HeaderValue {
    basic("admin", "secret")
}

#[tokio::test]
async fn health_needs_no_credentials() {
    let app = app();
    let response = app.server.get("/health").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], flowgate::VERSION);
}

#[tokio::test]
async fn rejects_missing_and_wrong_credentials() {
    let app = app();

    let response = app.server.get("/apis").await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: ErrorBody = response.json();
    assert_eq!(body.code, "unauthorized");

    let response = app.server.get("/apis").add_header(AUTHORIZATION, basic("admin", "nope")).await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key("www-authenticate"));
}

#[tokio::test]
async fn raw_zip_upload_deploys_and_publishes() {
    let app = app();
    let bundle = zip_bundle(&[
        ("apis/pets.yaml", &petstore_yaml(&[])),
        ("apis/orders.json", &orders_swagger_json()),
    ]);

    let response = app
        .server
        .post("/apis")
        .add_header(AUTHORIZATION, admin())
        .content_type("application/zip")
        .bytes(bundle.into())
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["deployed"].as_array().unwrap().len(), 2);
    assert!(body["skipped"].as_array().unwrap().is_empty());

    let cache = app.deployer.cache();
    assert_eq!(cache.snapshot(&Label::default_label()).version, 1);
    assert_eq!(cache.snapshot(&Label::parse("edge").unwrap()).route_count(), 3);
}

#[tokio::test]
async fn multipart_upload_uses_file_field() {
    let app = app();
    let bundle = zip_bundle(&[("pets.yaml", &petstore_yaml(&[]))]);
    let form = MultipartForm::new().add_part(
        "file",
        Part::bytes(bundle).file_name("bundle.zip").mime_type("application/zip"),
    );

    let response =
        app.server.post("/apis").add_header(AUTHORIZATION, admin()).multipart(form).await;

    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["deployed"][0]["name"], "pets");
    assert_eq!(body["deployed"][0]["labels"][0], "default");
}

#[tokio::test]
async fn malformed_document_rejects_whole_bundle() {
    let app = app();
    let bundle = zip_bundle(&[
        ("pets.yaml", &petstore_yaml(&[])),
        ("broken.json", r#"{"swagger": "1.0", "info": {"title": "x", "version": "1"}}"#),
    ]);

    let response = app
        .server
        .post("/apis")
        .add_header(AUTHORIZATION, admin())
        .bytes(bundle.into())
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: ErrorBody = response.json();
    assert_eq!(body.code, "bad_request");
    assert!(body.description.contains("broken.json"));
    assert!(app.deployer.list_apis(None, None).await.is_empty());
    assert_eq!(app.deployer.cache().snapshot(&Label::default_label()).version, 0);
}

#[tokio::test]
async fn non_zip_body_is_bad_request() {
    let app = app();
    let response = app
        .server
        .post("/apis")
        .add_header(AUTHORIZATION, admin())
        .bytes("not a zip".into())
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn oversized_bundle_is_rejected() {
    let app = app();
    let response = app
        .server
        .post("/apis")
        .add_header(AUTHORIZATION, admin())
        .bytes(vec![0u8; MAX_BUNDLE_BYTES + 1].into())
        .await;

    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn redeploy_conflicts_unless_overwrite() {
    let app = app();
    let bundle = zip_bundle(&[("pets.yaml", &petstore_yaml(&[]))]);

    app.server
        .post("/apis")
        .add_header(AUTHORIZATION, admin())
        .bytes(bundle.clone().into())
        .await
        .assert_status(StatusCode::CREATED);

    let response = app
        .server
        .post("/apis")
        .add_header(AUTHORIZATION, admin())
        .bytes(bundle.clone().into())
        .await;
    response.assert_status(StatusCode::CONFLICT);
    let body: ErrorBody = response.json();
    assert_eq!(body.code, "conflict");

    app.server
        .post("/apis")
        .add_query_param("overwrite", true)
        .add_header(AUTHORIZATION, admin())
        .bytes(bundle.into())
        .await
        .assert_status(StatusCode::CREATED);

    assert_eq!(app.deployer.cache().snapshot(&Label::default_label()).version, 2);
}

#[tokio::test]
async fn provider_defaults_to_caller() {
    let app = app();
    let bundle = zip_bundle(&[("pets.yaml", &petstore_yaml(&[]))]);

    app.server
        .post("/apis")
        .add_header(AUTHORIZATION, admin())
        .bytes(bundle.into())
        .await
        .assert_status(StatusCode::CREATED);

    let listed: Value = app.server.get("/apis").add_header(AUTHORIZATION, admin()).await.json();
    assert_eq!(listed[0]["provider"], "admin");
    assert_eq!(listed[0]["basePath"], "/pets");
}

#[tokio::test]
async fn list_filters_by_query_and_limit() {
    let app = app();
    let bundle = zip_bundle(&[
        ("pets.yaml", &petstore_yaml(&[])),
        ("orders.json", &orders_swagger_json()),
    ]);
    app.server
        .post("/apis")
        .add_header(AUTHORIZATION, admin())
        .bytes(bundle.into())
        .await
        .assert_status(StatusCode::CREATED);

    let listed: Value = app
        .server
        .get("/apis")
        .add_query_param("query", "ORD")
        .add_header(AUTHORIZATION, admin())
        .await
        .json();
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["name"], "orders");

    let limited: Value = app
        .server
        .get("/apis")
        .add_query_param("limit", 1)
        .add_header(AUTHORIZATION, admin())
        .await
        .json();
    assert_eq!(limited.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn delete_removes_api_and_reports_missing() {
    let app = app();
    let bundle = zip_bundle(&[("pets.yaml", &petstore_yaml(&[]))]);
    app.server
        .post("/apis")
        .add_header(AUTHORIZATION, admin())
        .bytes(bundle.into())
        .await
        .assert_status(StatusCode::CREATED);

    app.server
        .delete("/apis")
        .add_query_param("name", "pets")
        .add_query_param("version", "v1")
        .add_header(AUTHORIZATION, admin())
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let snapshot = app.deployer.cache().snapshot(&Label::default_label());
    assert_eq!(snapshot.version, 2);
    assert!(snapshot.clusters.is_empty());

    let response = app
        .server
        .delete("/apis")
        .add_query_param("name", "pets")
        .add_query_param("version", "v1")
        .add_header(AUTHORIZATION, admin())
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: ErrorBody = response.json();
    assert_eq!(body.code, "not_found");

    app.server
        .delete("/apis")
        .add_query_param("name", "pets")
        .add_header(AUTHORIZATION, admin())
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}
